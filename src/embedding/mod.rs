//! Text-to-vector embedding pipeline.
//!
//! The engine only depends on the [`EmbeddingProvider`] trait. An Ollama HTTP
//! implementation is provided and selected via [`create_provider`].

pub mod ollama;

use crate::error::{MemoryError, Result};

/// Trait for embedding text into vectors.
///
/// Implementations may block on I/O. Vector length is whatever the backing
/// model produces; the engine never normalizes it.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Why the similarity math cannot use `vector`, if it cannot.
pub fn embedding_defect(vector: &[f32]) -> Option<String> {
    if vector.is_empty() {
        return Some("an empty vector".into());
    }
    vector
        .iter()
        .position(|x| !x.is_finite())
        .map(|pos| format!("a non-finite value at dimension {pos}"))
}

/// Reject provider output the similarity math cannot use.
pub fn validate_embedding(vector: Vec<f32>) -> Result<Vec<f32>> {
    match embedding_defect(&vector) {
        Some(defect) => Err(MemoryError::Embedding(format!("provider returned {defect}"))),
        None => Ok(vector),
    }
}

/// Create an embedding provider from config.
///
/// Currently only `"ollama"` is supported.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "ollama" => {
            let provider = ollama::OllamaEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => Err(MemoryError::InvalidInput(format!(
            "unknown embedding provider: {other}. Supported: ollama"
        ))),
    }
}
