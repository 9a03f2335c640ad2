#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mnemo::config::RetentionConfig;
use mnemo::embedding::EmbeddingProvider;
use mnemo::error::{MemoryError, Result};
use mnemo::memory::types::{NewMemory, OwnerType};
use mnemo::memory::{MemoryEngine, MemoryStore};
use rusqlite::params;

pub const DIM: usize = 16;

/// A fresh in-memory store with schema and migrations applied.
pub fn test_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::open_in_memory().unwrap())
}

/// An engine over a fresh store, embedding every text as `test_embedding(0)`.
pub fn test_engine(config: RetentionConfig) -> MemoryEngine {
    MemoryEngine::new(test_store(), Arc::new(FixedEmbeddingProvider::new(test_embedding(0))), config)
}

/// Deterministic `DIM`-dim embedding with a spike at position `seed`.
/// Distinct seeds (mod `DIM`) are orthogonal.
pub fn test_embedding(seed: u8) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[seed as usize % DIM] = 1.0;
    v
}

/// A unit vector whose cosine with the spike at `seed` is exactly `cosine`.
pub fn embedding_with_cosine(seed: u8, cosine: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[seed as usize % DIM] = cosine;
    v[(seed as usize + 1) % DIM] = (1.0 - cosine * cosine).sqrt();
    v
}

/// Store a memory with an explicit vector, bypassing the provider. Returns its id.
pub fn insert(
    store: &MemoryStore,
    user_id: &str,
    owner_type: OwnerType,
    importance: f64,
    tags: &[&str],
    embedding: &[f32],
) -> i64 {
    let memory = NewMemory::new(user_id, owner_type, format!("memory for {user_id}"))
        .importance(importance)
        .tags(tags.iter().copied());
    store.insert(&memory, embedding).unwrap()
}

/// Move an entry's `created_at` and `last_used_at` back by `days`.
pub fn backdate(store: &MemoryStore, id: i64, days: i64) {
    let entry = store.get(id).unwrap();
    let then = (entry.last_used_at - chrono::Duration::days(days))
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    store.with_connection(|conn| {
        conn.execute(
            "UPDATE long_term_memories SET created_at = ?1, last_used_at = ?1 WHERE id = ?2",
            params![then, id],
        )
        .unwrap();
    });
}

pub fn ids(store: &MemoryStore, user_id: &str, owner_type: OwnerType) -> Vec<i64> {
    store
        .list_all(user_id, owner_type)
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect()
}

/// Returns the same vector for every input and counts calls.
pub struct FixedEmbeddingProvider {
    vector: Vec<f32>,
    pub calls: AtomicUsize,
}

impl FixedEmbeddingProvider {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            calls: AtomicUsize::new(0),
        }
    }
}

impl EmbeddingProvider for FixedEmbeddingProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector.clone())
    }
}

/// Always fails, like an unreachable embedding server.
pub struct FailingEmbeddingProvider;

impl EmbeddingProvider for FailingEmbeddingProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MemoryError::Embedding("connection refused".into()))
    }
}
