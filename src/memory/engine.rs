//! Caller-facing facade over the store, the embedding provider and the
//! retention settings.
//!
//! Writers on the same `(user_id, owner_type)` partition are serialized by a
//! per-partition guard; different partitions proceed independently. Search
//! takes no guard: every batch it could observe is a single transaction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use super::events::MemoryEvent;
use super::maintenance::{self, DecayReport, MergeReport, PruneReport};
use super::search::{self, ScoredMemory};
use super::stats::PartitionStats;
use super::store::MemoryStore;
use super::types::{clamp_importance, MemoryEntry, NewMemory, OwnerType};
use crate::config::RetentionConfig;
use crate::embedding::{validate_embedding, EmbeddingProvider};
use crate::error::{MemoryError, Result};

type PartitionKey = (String, OwnerType);

/// Combined outcome of [`MemoryEngine::run_maintenance`].
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub decay: DecayReport,
    pub prune: PruneReport,
    pub merge: MergeReport,
}

pub struct MemoryEngine {
    store: Arc<MemoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetentionConfig,
    locks: Mutex<HashMap<PartitionKey, Arc<Mutex<()>>>>,
}

impl MemoryEngine {
    pub fn new(
        store: Arc<MemoryStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.config
    }

    /// The guard for one partition, created on first use.
    ///
    /// Guards that no caller holds are dropped whenever a new partition is
    /// added, so the map only tracks partitions with work in flight.
    fn partition_lock(&self, user_id: &str, owner_type: OwnerType) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        let key = (user_id.to_string(), owner_type);
        if let Some(lock) = locks.get(&key) {
            return Arc::clone(lock);
        }
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(key).or_default())
    }

    fn guard(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
        lock.lock().unwrap_or_else(|p| p.into_inner())
    }

    // ── Writes ───────────────────────────────────────────────────────────

    /// Store a new memory, embedding its content unless a vector was supplied.
    ///
    /// A provider failure aborts before anything is written. A supplied vector
    /// is checked by [`NewMemory::validate`] and never reaches the provider.
    pub fn add_memory(&self, memory: NewMemory) -> Result<i64> {
        memory.validate()?;

        let embedding = match &memory.embedding {
            Some(vector) => vector.clone(),
            None => validate_embedding(self.embedder.embed(&memory.content)?)?,
        };

        let lock = self.partition_lock(&memory.user_id, memory.owner_type);
        let _guard = Self::guard(&lock);
        let id = self.store.insert(&memory, &embedding)?;

        tracing::info!(
            id,
            user_id = %memory.user_id,
            owner_type = %memory.owner_type,
            tags = memory.tags.len(),
            "stored memory"
        );
        Ok(id)
    }

    /// Raise (or, with a negative amount, lower) an entry's importance.
    ///
    /// Returns the new clamped value, or `None` if the entry is gone.
    pub fn boost_importance(&self, id: i64, amount: f64) -> Result<Option<f64>> {
        let Some(entry) = self.lookup(id)? else {
            return Ok(None);
        };

        let lock = self.partition_lock(&entry.user_id, entry.owner_type);
        let _guard = Self::guard(&lock);
        // re-read under the guard
        let Some(entry) = self.lookup(id)? else {
            return Ok(None);
        };
        let updated = clamp_importance(entry.importance + amount);
        if !self.store.update_importance(id, updated)? {
            return Ok(None);
        }
        tracing::debug!(id, from = entry.importance, to = updated, "boosted importance");
        Ok(Some(updated))
    }

    fn lookup(&self, id: i64) -> Result<Option<MemoryEntry>> {
        match self.store.get(id) {
            Ok(entry) => Ok(Some(entry)),
            Err(MemoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn search(
        &self,
        user_id: &str,
        owner_type: OwnerType,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredMemory>> {
        search::search(&self.store, user_id, owner_type, query, limit)
    }

    /// Embed `text` and search with it. Nothing is touched if embedding fails.
    pub fn search_text(
        &self,
        user_id: &str,
        owner_type: OwnerType,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ScoredMemory>> {
        let query = validate_embedding(self.embedder.embed(text)?)?;
        self.search(user_id, owner_type, &query, limit)
    }

    pub fn list_all(&self, user_id: &str, owner_type: OwnerType) -> Result<Vec<MemoryEntry>> {
        self.store.list_all(user_id, owner_type)
    }

    pub fn get(&self, id: i64) -> Result<MemoryEntry> {
        self.store.get(id)
    }

    pub fn list_events(
        &self,
        user_id: &str,
        owner_type: OwnerType,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryEvent>> {
        self.store.list_events(user_id, owner_type, limit)
    }

    pub fn partition_stats(&self, user_id: &str) -> Result<Vec<PartitionStats>> {
        self.store.partition_stats(user_id)
    }

    // ── Maintenance ──────────────────────────────────────────────────────

    pub fn decay_importance(&self, user_id: &str, owner_type: OwnerType) -> Result<DecayReport> {
        let lock = self.partition_lock(user_id, owner_type);
        let _guard = Self::guard(&lock);
        maintenance::decay_importance(&self.store, user_id, owner_type, self.config.decay_per_day)
    }

    /// Cap eviction covers both owner types, so both guards are held,
    /// always `user` before `assistant`.
    pub fn prune_caps(&self, user_id: &str) -> Result<PruneReport> {
        let user_lock = self.partition_lock(user_id, OwnerType::User);
        let assistant_lock = self.partition_lock(user_id, OwnerType::Assistant);
        let _user = Self::guard(&user_lock);
        let _assistant = Self::guard(&assistant_lock);
        maintenance::prune_caps(&self.store, user_id, &self.config)
    }

    pub fn merge_redundant(&self, user_id: &str, owner_type: OwnerType) -> Result<MergeReport> {
        let lock = self.partition_lock(user_id, owner_type);
        let _guard = Self::guard(&lock);
        maintenance::merge_redundant(
            &self.store,
            user_id,
            owner_type,
            self.config.similarity_merge_threshold,
        )
    }

    /// Decay, then prune, then merge.
    pub fn run_maintenance(&self, user_id: &str, owner_type: OwnerType) -> Result<MaintenanceReport> {
        let decay = self.decay_importance(user_id, owner_type)?;
        let prune = self.prune_caps(user_id)?;
        let merge = self.merge_redundant(user_id, owner_type)?;
        Ok(MaintenanceReport {
            decay,
            prune,
            merge,
        })
    }
}
