//! Append-only maintenance log.
//!
//! Every eviction and merge writes a [`MemoryEvent`] before the rows it
//! describes are deleted. Events are never updated or removed.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::types::{format_timestamp, parse_timestamp, OwnerType};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PruneTotal,
    PruneTag,
    Merged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PruneTotal => "prune_total",
            Self::PruneTag => "prune_tag",
            Self::Merged => "merged",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event-specific detail, stored as JSON in the `payload` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// Entries dropped to bring a partition under its total cap.
    PruneTotal { dropped: Vec<i64> },
    /// Entries dropped to bring one tag under its cap.
    PruneTag { tag: String, dropped: Vec<i64> },
    /// A near-duplicate dropped in favour of the event's `memory_id`.
    Merged { dropped: i64, similarity: f32 },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::PruneTotal { .. } => EventType::PruneTotal,
            Self::PruneTag { .. } => EventType::PruneTag,
            Self::Merged { .. } => EventType::Merged,
        }
    }

    /// Ids this event announces as deleted.
    pub fn dropped_ids(&self) -> Vec<i64> {
        match self {
            Self::PruneTotal { dropped } | Self::PruneTag { dropped, .. } => dropped.clone(),
            Self::Merged { dropped, .. } => vec![*dropped],
        }
    }
}

/// An event about to be written.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub user_id: String,
    pub owner_type: OwnerType,
    /// The surviving entry, if the event has one.
    pub memory_id: Option<i64>,
    pub payload: EventPayload,
}

/// A stored event row.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEvent {
    pub id: i64,
    pub user_id: String,
    pub owner_type: OwnerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<i64>,
    pub event_type: EventType,
    pub payload: EventPayload,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn insert_event(conn: &Connection, event: &NewEvent, at: DateTime<Utc>) -> Result<i64> {
    let payload = serde_json::to_string(&event.payload)?;
    conn.execute(
        "INSERT INTO memory_events (user_id, owner_type, memory_id, event_type, payload, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.user_id,
            event.owner_type.as_str(),
            event.memory_id,
            event.payload.event_type().as_str(),
            payload,
            format_timestamp(at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The most recent `limit` events of a partition, oldest first.
/// `limit = None` returns all of them.
pub(crate) fn list_events(
    conn: &Connection,
    user_id: &str,
    owner_type: OwnerType,
    limit: Option<usize>,
) -> Result<Vec<MemoryEvent>> {
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let mut stmt = conn.prepare(
        "SELECT id, user_id, memory_id, payload, created_at FROM ( \
             SELECT id, user_id, memory_id, payload, created_at \
             FROM memory_events \
             WHERE user_id = ?1 AND owner_type = ?2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT ?3 \
         ) ORDER BY created_at, id",
    )?;

    let rows = stmt
        .query_map(params![user_id, owner_type.as_str(), limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut events = Vec::with_capacity(rows.len());
    for (id, user_id, memory_id, payload, created_at) in rows {
        let payload: EventPayload = serde_json::from_str(&payload)?;
        let created_at = parse_timestamp(&created_at).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;
        events.push(MemoryEvent {
            id,
            user_id,
            owner_type,
            memory_id,
            event_type: payload.event_type(),
            payload,
            created_at,
        });
    }
    Ok(events)
}
