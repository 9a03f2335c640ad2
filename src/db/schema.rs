//! SQL DDL for all mnemo tables.
//!
//! Defines `long_term_memories`, the append-only `memory_events` log, and
//! `schema_meta`. All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Memory entries, partitioned by (user_id, owner_type)
CREATE TABLE IF NOT EXISTS long_term_memories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    owner_type TEXT NOT NULL CHECK(owner_type IN ('user','assistant')),
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    importance REAL NOT NULL DEFAULT 0.5 CHECK(importance >= 0.0 AND importance <= 1.0),
    plasticity REAL NOT NULL DEFAULT 0.5 CHECK(plasticity >= 0.0 AND plasticity <= 1.0),
    created_at TEXT NOT NULL,
    last_used_at TEXT NOT NULL,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_ltm_partition ON long_term_memories(user_id, owner_type);

-- Append-only maintenance log
CREATE TABLE IF NOT EXISTS memory_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    owner_type TEXT NOT NULL CHECK(owner_type IN ('user','assistant')),
    memory_id INTEGER,
    event_type TEXT NOT NULL CHECK(event_type IN ('prune_total','prune_tag','merged')),
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_partition ON memory_events(user_id, owner_type, created_at);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
