//! Persistence for memory entries.
//!
//! The free functions operate on a borrowed [`Connection`] and are the only
//! place SQL touching `long_term_memories` lives. [`MemoryStore`] is the
//! shareable handle the engine is built on: it owns the connection behind a
//! mutex and runs every batch inside a single transaction so that readers
//! never observe a half-applied update or delete.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::events::{self, MemoryEvent, NewEvent};
use super::stats::{self, PartitionStats};
use super::types::{
    clamp_importance, format_timestamp, now, parse_timestamp, MemoryEntry, Metadata, NewMemory,
    OwnerType, Tags,
};
use super::{bytes_to_embedding, embedding_to_bytes};
use crate::error::{MemoryError, Result};

const ENTRY_COLUMNS: &str = "id, user_id, owner_type, content, embedding, tags, importance, \
                             plasticity, created_at, last_used_at, metadata";

// ── Row mapping ──────────────────────────────────────────────────────────────

fn conversion_error(
    column: usize,
    kind: rusqlite::types::Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, kind, Box::new(err))
}

/// A row as read, before its JSON columns are decoded.
struct RawEntry {
    entry: MemoryEntry,
    tags: String,
    metadata: Option<String>,
}

impl RawEntry {
    /// Corrupt JSON surfaces as [`MemoryError::Serialization`].
    fn decode(self) -> Result<MemoryEntry> {
        let tags: Tags = serde_json::from_str(&self.tags)?;
        let metadata: Option<Metadata> = self
            .metadata
            .map(|m| serde_json::from_str(&m))
            .transpose()?;
        Ok(MemoryEntry {
            tags,
            metadata,
            ..self.entry
        })
    }
}

fn row_to_raw(row: &Row) -> rusqlite::Result<RawEntry> {
    use rusqlite::types::Type;

    let owner_type: String = row.get(2)?;
    let owner_type = owner_type.parse::<OwnerType>().map_err(|e| {
        conversion_error(2, Type::Text, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let embedding: Vec<u8> = row.get(4)?;
    let embedding = bytes_to_embedding(&embedding).map_err(|e| conversion_error(4, Type::Blob, e))?;

    let created_at: String = row.get(8)?;
    let last_used_at: String = row.get(9)?;

    Ok(RawEntry {
        entry: MemoryEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            owner_type,
            content: row.get(3)?,
            embedding,
            tags: Tags::default(),
            importance: row.get(6)?,
            plasticity: row.get(7)?,
            created_at: parse_timestamp(&created_at).map_err(|e| conversion_error(8, Type::Text, e))?,
            last_used_at: parse_timestamp(&last_used_at)
                .map_err(|e| conversion_error(9, Type::Text, e))?,
            metadata: None,
        },
        tags: row.get(5)?,
        metadata: row.get(10)?,
    })
}

// ── Statements ───────────────────────────────────────────────────────────────

/// Insert a new entry with `created_at = last_used_at = at`. Returns the new id.
pub fn insert_memory(
    conn: &Connection,
    memory: &NewMemory,
    embedding: &[f32],
    at: DateTime<Utc>,
) -> Result<i64> {
    let now = format_timestamp(at);
    let tags = serde_json::to_string(&memory.tags)?;
    let metadata = memory
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO long_term_memories \
         (user_id, owner_type, content, embedding, tags, importance, plasticity, created_at, last_used_at, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9)",
        params![
            memory.user_id,
            memory.owner_type.as_str(),
            memory.content,
            embedding_to_bytes(embedding),
            tags,
            memory.importance,
            memory.plasticity,
            now,
            metadata,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Direct lookup. The only read that reports a missing id as an error.
pub fn get_memory(conn: &Connection, id: i64) -> Result<MemoryEntry> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM long_term_memories WHERE id = ?1"),
        params![id],
        row_to_raw,
    )
    .optional()?
    .ok_or(MemoryError::NotFound(id))?
    .decode()
}

/// Every entry in a partition, in id order. No implicit limit.
pub fn list_partition(
    conn: &Connection,
    user_id: &str,
    owner_type: OwnerType,
) -> Result<Vec<MemoryEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM long_term_memories \
         WHERE user_id = ?1 AND owner_type = ?2 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map(params![user_id, owner_type.as_str()], row_to_raw)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(RawEntry::decode).collect()
}

/// Set `last_used_at` on every listed id. Missing ids are ignored.
pub fn touch_memories(conn: &mut Connection, ids: &[i64], at: DateTime<Utc>) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let now = format_timestamp(at);
    let tx = conn.transaction()?;
    let mut touched = 0;
    {
        let mut stmt = tx.prepare("UPDATE long_term_memories SET last_used_at = ?1 WHERE id = ?2")?;
        for id in ids {
            touched += stmt.execute(params![now, id])?;
        }
    }
    tx.commit()?;
    Ok(touched)
}

/// Single-field importance update, clamped into `[0, 1]`. Returns whether a row changed.
pub fn set_importance(conn: &Connection, id: i64, importance: f64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE long_term_memories SET importance = ?1 WHERE id = ?2",
        params![clamp_importance(importance), id],
    )?;
    Ok(updated > 0)
}

/// Write decayed importances and reset `last_used_at` for each, atomically.
///
/// Rows touched at or after `at` are skipped, so a concurrent retrieval is
/// never rolled back. Returns the number of rows written.
pub fn apply_decay(conn: &mut Connection, updates: &[(i64, f64)], at: DateTime<Utc>) -> Result<usize> {
    if updates.is_empty() {
        return Ok(0);
    }
    let now = format_timestamp(at);
    let tx = conn.transaction()?;
    let mut applied = 0;
    {
        let mut stmt = tx.prepare(
            "UPDATE long_term_memories SET importance = ?1, last_used_at = ?2 \
             WHERE id = ?3 AND last_used_at < ?2",
        )?;
        for (id, importance) in updates {
            applied += stmt.execute(params![clamp_importance(*importance), now, id])?;
        }
    }
    tx.commit()?;
    Ok(applied)
}

/// Delete the listed ids inside an open transaction. Already-deleted ids are skipped.
fn delete_in(tx: &Connection, ids: &[i64]) -> Result<usize> {
    let mut stmt = tx.prepare("DELETE FROM long_term_memories WHERE id = ?1")?;
    let mut deleted = 0;
    for id in ids {
        deleted += stmt.execute(params![id])?;
    }
    Ok(deleted)
}

/// Bulk delete; idempotent.
pub fn delete_memories(conn: &mut Connection, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let tx = conn.transaction()?;
    let deleted = delete_in(&tx, ids)?;
    tx.commit()?;
    Ok(deleted)
}

/// Append `log` to the event table, then delete `ids`, as one transaction.
///
/// The insert precedes the delete so the log always covers every deletion.
pub fn record_and_delete(
    conn: &mut Connection,
    log: &[NewEvent],
    ids: &[i64],
    at: DateTime<Utc>,
) -> Result<usize> {
    if log.is_empty() && ids.is_empty() {
        return Ok(0);
    }
    let tx = conn.transaction()?;
    for event in log {
        events::insert_event(&tx, event, at)?;
    }
    let deleted = delete_in(&tx, ids)?;
    tx.commit()?;
    Ok(deleted)
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Shared handle over a single SQLite connection.
///
/// Pass it around as `Arc<MemoryStore>`; each method holds the connection
/// only for the duration of one statement or one transaction.
pub struct MemoryStore {
    conn: Mutex<Connection>,
}

impl MemoryStore {
    /// Wrap an already-initialized connection (schema and migrations applied).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self::new(crate::db::open_database(path)?))
    }

    /// A private in-memory database, for tests and scratch use.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(crate::db::open_memory_database()?))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // a panic mid-statement leaves no open transaction behind; keep serving
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run a read-only closure against the underlying connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&self.lock())
    }

    pub fn insert(&self, memory: &NewMemory, embedding: &[f32]) -> Result<i64> {
        insert_memory(&self.lock(), memory, embedding, now())
    }

    pub fn get(&self, id: i64) -> Result<MemoryEntry> {
        get_memory(&self.lock(), id)
    }

    pub fn list_all(&self, user_id: &str, owner_type: OwnerType) -> Result<Vec<MemoryEntry>> {
        list_partition(&self.lock(), user_id, owner_type)
    }

    /// Touch `last_used_at` to now. No-op on empty input.
    pub fn update_last_used(&self, ids: &[i64]) -> Result<()> {
        self.touch(ids, now()).map(|_| ())
    }

    pub(crate) fn touch(&self, ids: &[i64], at: DateTime<Utc>) -> Result<usize> {
        let touched = touch_memories(&mut self.lock(), ids, at)?;
        tracing::debug!(requested = ids.len(), touched, "updated last_used_at");
        Ok(touched)
    }

    /// Returns `false` if the id no longer exists.
    pub fn update_importance(&self, id: i64, importance: f64) -> Result<bool> {
        set_importance(&self.lock(), id, importance)
    }

    pub fn apply_decay(&self, updates: &[(i64, f64)], at: DateTime<Utc>) -> Result<usize> {
        apply_decay(&mut self.lock(), updates, at)
    }

    pub fn delete_many(&self, ids: &[i64]) -> Result<usize> {
        let deleted = delete_memories(&mut self.lock(), ids)?;
        tracing::debug!(requested = ids.len(), deleted, "deleted memories");
        Ok(deleted)
    }

    pub fn record_and_delete(&self, log: &[NewEvent], ids: &[i64]) -> Result<usize> {
        record_and_delete(&mut self.lock(), log, ids, now())
    }

    pub fn list_events(
        &self,
        user_id: &str,
        owner_type: OwnerType,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryEvent>> {
        events::list_events(&self.lock(), user_id, owner_type, limit)
    }

    pub fn partition_stats(&self, user_id: &str) -> Result<Vec<PartitionStats>> {
        stats::partition_stats(&self.lock(), user_id)
    }
}
