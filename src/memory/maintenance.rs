//! Self-maintenance passes: importance decay, cap eviction and redundancy merge.
//!
//! Each pass is scoped to one user (and, except for cap eviction, one owner
//! type) and is idempotent: running it twice in a row changes nothing the
//! second time. Destructive passes log their decisions to `memory_events` in
//! the same transaction as the delete.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::events::{EventPayload, NewEvent};
use super::similarity::{scan_pairs, Discard};
use super::store::MemoryStore;
use super::types::{now, MemoryEntry, OwnerType};
use crate::config::RetentionConfig;
use crate::error::Result;

const SECONDS_PER_DAY: f64 = 86_400.0;

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DecayReport {
    pub examined: usize,
    pub decayed: usize,
}

/// One eviction batch: a total-cap or a tag-cap overflow for one owner type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PruneBatch {
    pub owner_type: OwnerType,
    /// `None` for the total cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub cap: usize,
    pub dropped: Vec<i64>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct PruneReport {
    pub batches: Vec<PruneBatch>,
}

impl PruneReport {
    pub fn dropped(&self) -> usize {
        self.batches.iter().map(|b| b.dropped.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MergeDecision {
    pub kept: i64,
    pub dropped: i64,
    pub similarity: f32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MergeReport {
    pub decisions: Vec<MergeDecision>,
}

// ── Decay ────────────────────────────────────────────────────────────────────

/// Importance after `elapsed_secs` of disuse at `rate` per day, floored at 0.
///
/// Negative elapsed time (clock skew) counts as zero.
pub fn decayed_importance(importance: f64, rate: f64, elapsed_secs: i64) -> f64 {
    let days = (elapsed_secs as f64 / SECONDS_PER_DAY).max(0.0);
    (importance - rate * days).max(0.0)
}

/// Linear decay of every entry in a partition, measured from its `last_used_at`.
///
/// Entries whose importance would not change are left alone, including their
/// `last_used_at`. Changed entries get `last_used_at = now`.
pub fn decay_importance(
    store: &MemoryStore,
    user_id: &str,
    owner_type: OwnerType,
    decay_per_day: f64,
) -> Result<DecayReport> {
    decay_importance_at(store, user_id, owner_type, decay_per_day, now())
}

/// [`decay_importance`] with an explicit clock.
pub fn decay_importance_at(
    store: &MemoryStore,
    user_id: &str,
    owner_type: OwnerType,
    decay_per_day: f64,
    at: DateTime<Utc>,
) -> Result<DecayReport> {
    let entries = store.list_all(user_id, owner_type)?;

    let updates: Vec<(i64, f64)> = entries
        .iter()
        .filter_map(|entry| {
            let elapsed = (at - entry.last_used_at).num_seconds();
            let updated = decayed_importance(entry.importance, decay_per_day, elapsed);
            (updated != entry.importance).then_some((entry.id, updated))
        })
        .collect();

    let decayed = store.apply_decay(&updates, at)?;
    let report = DecayReport {
        examined: entries.len(),
        decayed,
    };

    if decayed > 0 {
        tracing::info!(user_id, owner_type = %owner_type, examined = report.examined, decayed, "decayed importance");
    } else {
        tracing::debug!(user_id, owner_type = %owner_type, examined = report.examined, "decay: nothing to do");
    }
    Ok(report)
}

// ── Cap eviction ─────────────────────────────────────────────────────────────

/// Ids to evict so that at most `cap` of `candidates` remain.
///
/// Lowest importance goes first, then least recently used, then lowest id.
fn eviction_order(mut candidates: Vec<&MemoryEntry>, cap: usize) -> Vec<i64> {
    if candidates.len() <= cap {
        return Vec::new();
    }
    candidates.sort_by(|a, b| {
        a.importance
            .total_cmp(&b.importance)
            .then_with(|| a.last_used_at.cmp(&b.last_used_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    let excess = candidates.len() - cap;
    candidates[..excess].iter().map(|e| e.id).collect()
}

fn total_cap(config: &RetentionConfig, owner_type: OwnerType) -> usize {
    match owner_type {
        OwnerType::User => config.total_cap_user,
        OwnerType::Assistant => config.total_cap_assistant,
    }
}

/// Evict a partition's excess entries and log the batch before deleting it.
fn evict(
    store: &MemoryStore,
    user_id: &str,
    owner_type: OwnerType,
    tag: Option<&str>,
    cap: usize,
) -> Result<Option<PruneBatch>> {
    let entries = store.list_all(user_id, owner_type)?;
    let candidates: Vec<&MemoryEntry> = match tag {
        Some(tag) => entries.iter().filter(|e| e.has_tag(tag)).collect(),
        None => entries.iter().collect(),
    };
    let dropped = eviction_order(candidates, cap);
    if dropped.is_empty() {
        return Ok(None);
    }

    let payload = match tag {
        Some(tag) => EventPayload::PruneTag {
            tag: tag.to_string(),
            dropped: dropped.clone(),
        },
        None => EventPayload::PruneTotal {
            dropped: dropped.clone(),
        },
    };
    let event = NewEvent {
        user_id: user_id.to_string(),
        owner_type,
        memory_id: None,
        payload,
    };
    store.record_and_delete(&[event], &dropped)?;

    tracing::info!(
        user_id,
        owner_type = %owner_type,
        tag = tag.unwrap_or("*"),
        cap,
        dropped = dropped.len(),
        "evicted over-cap memories"
    );

    Ok(Some(PruneBatch {
        owner_type,
        tag: tag.map(str::to_string),
        cap,
        dropped,
    }))
}

/// Enforce total caps for both owner types, then every configured tag cap
/// for both owner types, in that order.
///
/// Callers must hold both of the user's partition locks.
pub fn prune_caps(store: &MemoryStore, user_id: &str, config: &RetentionConfig) -> Result<PruneReport> {
    let mut report = PruneReport::default();

    for owner_type in OwnerType::ALL {
        let cap = total_cap(config, owner_type);
        if let Some(batch) = evict(store, user_id, owner_type, None, cap)? {
            report.batches.push(batch);
        }
    }

    for (tag, &cap) in &config.tag_caps {
        for owner_type in OwnerType::ALL {
            if let Some(batch) = evict(store, user_id, owner_type, Some(tag), cap)? {
                report.batches.push(batch);
            }
        }
    }

    if report.batches.is_empty() {
        tracing::debug!(user_id, "prune: all partitions within caps");
    }
    Ok(report)
}

// ── Redundancy merge ─────────────────────────────────────────────────────────

/// Collapse near-duplicates within one partition.
///
/// Pairs are visited in id order. For each pair at or above `threshold` the
/// higher-importance entry survives (the earlier one on a tie). Each `merged`
/// event names the entry still standing after the whole scan. All events and
/// the batch delete commit together.
pub fn merge_redundant(
    store: &MemoryStore,
    user_id: &str,
    owner_type: OwnerType,
    threshold: f32,
) -> Result<MergeReport> {
    let entries = store.list_all(user_id, owner_type)?;

    let mut decisions = Vec::new();
    scan_pairs(&entries, threshold, |pair| {
        let (first, second) = (&entries[pair.first], &entries[pair.second]);
        let (kept, dropped, discard) = if first.importance >= second.importance {
            (first.id, second.id, Discard::Second)
        } else {
            (second.id, first.id, Discard::First)
        };
        decisions.push(MergeDecision {
            kept,
            dropped,
            similarity: pair.similarity,
        });
        discard
    });

    resolve_survivors(&mut decisions);

    if decisions.is_empty() {
        tracing::debug!(user_id, owner_type = %owner_type, examined = entries.len(), "merge: no redundant pairs");
        return Ok(MergeReport::default());
    }

    let log: Vec<NewEvent> = decisions
        .iter()
        .map(|d| NewEvent {
            user_id: user_id.to_string(),
            owner_type,
            memory_id: Some(d.kept),
            payload: EventPayload::Merged {
                dropped: d.dropped,
                similarity: d.similarity,
            },
        })
        .collect();
    let dropped: Vec<i64> = decisions.iter().map(|d| d.dropped).collect();
    store.record_and_delete(&log, &dropped)?;

    tracing::info!(
        user_id,
        owner_type = %owner_type,
        examined = entries.len(),
        merged = decisions.len(),
        "merged redundant memories"
    );
    Ok(MergeReport { decisions })
}

/// Point every decision at the entry that finally survives the scan.
///
/// An entry kept in one pair can be dropped by a later pair; its earlier
/// absorptions then belong to whoever dropped it.
fn resolve_survivors(decisions: &mut [MergeDecision]) {
    let absorbed_by: HashMap<i64, i64> = decisions.iter().map(|d| (d.dropped, d.kept)).collect();
    for decision in decisions.iter_mut() {
        while let Some(&next) = absorbed_by.get(&decision.kept) {
            decision.kept = next;
        }
    }
}
