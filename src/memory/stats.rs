use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;

use super::types::{parse_timestamp, OwnerType, Tags};
use crate::error::Result;

/// Summary of one `(user_id, owner_type)` partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionStats {
    pub owner_type: OwnerType,
    pub memories: u64,
    pub events: u64,
    /// Entries carrying each tag; an entry counts once per tag.
    pub by_tag: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_importance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<DateTime<Utc>>,
}

/// Stats for both of a user's partitions, `user` first.
pub fn partition_stats(conn: &Connection, user_id: &str) -> Result<Vec<PartitionStats>> {
    OwnerType::ALL
        .into_iter()
        .map(|owner_type| stats_for(conn, user_id, owner_type))
        .collect()
}

fn stats_for(conn: &Connection, user_id: &str, owner_type: OwnerType) -> Result<PartitionStats> {
    let (memories, mean_importance, oldest, newest): (i64, Option<f64>, Option<String>, Option<String>) =
        conn.query_row(
            "SELECT COUNT(*), AVG(importance), MIN(created_at), MAX(created_at) \
             FROM long_term_memories WHERE user_id = ?1 AND owner_type = ?2",
            params![user_id, owner_type.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

    let events: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memory_events WHERE user_id = ?1 AND owner_type = ?2",
        params![user_id, owner_type.as_str()],
        |row| row.get(0),
    )?;

    Ok(PartitionStats {
        owner_type,
        memories: memories as u64,
        events: events as u64,
        by_tag: count_by_tag(conn, user_id, owner_type)?,
        mean_importance,
        oldest: oldest.as_deref().and_then(timestamp_or_warn),
        newest: newest.as_deref().and_then(timestamp_or_warn),
    })
}

fn count_by_tag(
    conn: &Connection,
    user_id: &str,
    owner_type: OwnerType,
) -> Result<BTreeMap<String, u64>> {
    let mut stmt = conn.prepare(
        "SELECT tags FROM long_term_memories WHERE user_id = ?1 AND owner_type = ?2",
    )?;
    let rows = stmt
        .query_map(params![user_id, owner_type.as_str()], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut counts = BTreeMap::new();
    for raw in rows {
        let tags: Tags = match serde_json::from_str(&raw) {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparseable tags in stats");
                continue;
            }
        };
        for tag in tags {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

fn timestamp_or_warn(value: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(value)
        .map_err(|e| tracing::warn!(value, error = %e, "unparseable timestamp in stats"))
        .ok()
}
