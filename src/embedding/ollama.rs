//! Ollama HTTP embedding provider.
//!
//! Posts `{model, input}` to `/api/embeddings` and falls back to `/api/embed`
//! for servers that only expose the newer endpoint. Both the single-vector
//! (`embedding`) and batched (`embeddings`) response shapes are accepted.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{validate_embedding, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use crate::error::{MemoryError, Result};

const ENDPOINTS: [&str; 2] = ["/api/embeddings", "/api/embed"];

pub struct OllamaEmbeddingProvider {
    client: Client,
    host: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
    // older servers read `prompt` instead of `input`
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Option<Vec<f32>>,
    embeddings: Option<Vec<Vec<f32>>>,
}

impl OllamaEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MemoryError::Embedding(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(host = %config.host, model = %config.model, "ollama embedding provider ready");

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn embed_via(&self, path: &str, text: &str) -> std::result::Result<Vec<f32>, String> {
        let url = format!("{}{}", self.host, path);
        let request = EmbedRequest {
            model: &self.model,
            input: text,
            prompt: text,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        let body: EmbedResponse = response.json().map_err(|e| e.to_string())?;
        parse_response(body)
    }
}

fn parse_response(body: EmbedResponse) -> std::result::Result<Vec<f32>, String> {
    match (body.embedding, body.embeddings) {
        (Some(vector), _) if !vector.is_empty() => Ok(vector),
        (_, Some(mut batch)) if !batch.is_empty() => Ok(batch.swap_remove(0)),
        _ => Err("unexpected embedding payload".into()),
    }
}

impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut errors = Vec::new();
        for path in ENDPOINTS {
            match self.embed_via(path, text) {
                Ok(vector) => {
                    tracing::debug!(endpoint = path, dims = vector.len(), "embedded text");
                    return validate_embedding(vector);
                }
                Err(e) => {
                    tracing::debug!(endpoint = path, error = %e, "embedding endpoint failed");
                    errors.push(format!("{path}: {e}"));
                }
            }
        }
        Err(MemoryError::Embedding(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> std::result::Result<Vec<f32>, String> {
        parse_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn parses_single_vector_shape() {
        assert_eq!(parse(r#"{"embedding": [0.1, 0.2]}"#).unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn parses_batched_shape() {
        assert_eq!(
            parse(r#"{"model": "m", "embeddings": [[0.3, 0.4], [0.5, 0.6]]}"#).unwrap(),
            vec![0.3, 0.4]
        );
    }

    #[test]
    fn empty_payload_is_an_error() {
        assert!(parse(r#"{"embedding": []}"#).is_err());
        assert!(parse(r#"{"embeddings": []}"#).is_err());
        assert!(parse(r#"{}"#).is_err());
    }

    #[test]
    fn unreachable_host_is_embedding_error() {
        let config = EmbeddingConfig {
            host: "http://127.0.0.1:1".into(),
            timeout_secs: 1,
            ..Default::default()
        };
        let provider = OllamaEmbeddingProvider::new(&config).unwrap();
        let err = provider.embed("hello").unwrap_err();
        assert!(matches!(err, MemoryError::Embedding(_)));
        assert!(err.to_string().contains("/api/embeddings"));
        assert!(err.to_string().contains("/api/embed"));
    }
}
