//! Long-term semantic memory for personal assistants.
//!
//! mnemo keeps short textual memories per user, split into two partitions:
//! facts about the user and commitments the assistant has made about itself.
//! It retrieves the most relevant entries for a query vector and maintains
//! itself between turns:
//!
//! | Pass | Effect |
//! |------|--------|
//! | **Decay** | Importance drops linearly with days since last use |
//! | **Cap eviction** | Total and per-tag caps, least important evicted first |
//! | **Merge** | Near-duplicates collapse into the more important entry |
//!
//! Every eviction and merge is recorded in an append-only event log in the
//! same transaction as the delete.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (bundled) with vectors stored as little-endian f32 blobs
//! - **Embeddings**: any [`embedding::EmbeddingProvider`]; an Ollama HTTP client ships by default
//! - **Search**: exhaustive cosine similarity boosted by importance
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`embedding`]: the provider trait and the Ollama client
//! - [`error`]: the library error type
//! - [`memory`]: store, search, maintenance, event log, and the [`memory::MemoryEngine`] facade

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
