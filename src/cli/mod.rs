pub mod add;
pub mod doctor;
pub mod events;
pub mod list;
pub mod maintenance;
pub mod search;
pub mod stats;

use anyhow::{Context, Result};
use std::sync::Arc;

use mnemo::config::MnemoConfig;
use mnemo::db::migrations;
use mnemo::embedding::{self, EmbeddingProvider};
use mnemo::memory::{MemoryEngine, MemoryStore};

/// Open the configured database and wire it to the configured embedding provider.
///
/// The first run records the embedding model in `schema_meta`; later runs warn
/// when the configured model differs from the one the stored vectors came from.
pub fn open_engine(config: &MnemoConfig) -> Result<MemoryEngine> {
    let db_path = config.resolved_db_path();
    let store = MemoryStore::open(&db_path)?;

    store
        .with_connection(|conn| -> Result<()> {
            match migrations::get_embedding_model(conn)? {
                None => migrations::set_embedding_model(conn, &config.embedding.model)?,
                Some(stored) if stored != config.embedding.model => tracing::warn!(
                    stored = %stored,
                    configured = %config.embedding.model,
                    "embedding model mismatch; similarities across models are meaningless"
                ),
                Some(_) => {}
            }
            Ok(())
        })
        .context("failed to check embedding model")?;

    let provider: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);

    Ok(MemoryEngine::new(
        Arc::new(store),
        provider,
        config.retention.clone(),
    ))
}

/// Truncate content to `max_chars` characters, appending "..." if truncated.
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("héllo wörld", 2), "hé...");
    }
}
