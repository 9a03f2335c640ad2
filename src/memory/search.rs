//! Retrieval: rank a partition against a query vector.
//!
//! `score = cosine(query, entry) * (1 + importance)`. Importance is a linear
//! boost, so an orthogonal entry scores 0 whatever its importance. Returned
//! entries are marked used before the call returns.

use serde::Serialize;

use super::similarity::cosine_similarity;
use super::store::MemoryStore;
use super::types::{now, MemoryEntry, OwnerType};
use crate::error::Result;

/// A search hit and the score it was ranked by.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    #[serde(flatten)]
    pub entry: MemoryEntry,
    pub score: f64,
}

/// Score and order `entries` against `query`, keeping the top `limit`.
///
/// Entries without a defined similarity (zero magnitude on either side, or a
/// dimension mismatch) are left out. Ties fall back to ascending id.
pub fn rank(query: &[f32], entries: Vec<MemoryEntry>, limit: usize) -> Vec<ScoredMemory> {
    let mut scored: Vec<ScoredMemory> = entries
        .into_iter()
        .filter_map(|entry| {
            let similarity = cosine_similarity(query, &entry.embedding)?;
            let score = similarity as f64 * (1.0 + entry.importance);
            Some(ScoredMemory { entry, score })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
    scored.truncate(limit);
    scored
}

/// Top-`limit` entries of a partition for `query`, most relevant first.
///
/// Side effect: every returned entry has its `last_used_at` refreshed, and
/// the returned copies carry the refreshed timestamp.
pub fn search(
    store: &MemoryStore,
    user_id: &str,
    owner_type: OwnerType,
    query: &[f32],
    limit: usize,
) -> Result<Vec<ScoredMemory>> {
    let candidates = store.list_all(user_id, owner_type)?;
    if candidates.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    let candidate_count = candidates.len();

    let mut results = rank(query, candidates, limit);

    if !results.is_empty() {
        let now = now();
        let ids: Vec<i64> = results.iter().map(|r| r.entry.id).collect();
        store.touch(&ids, now)?;
        for result in &mut results {
            result.entry.last_used_at = now;
        }
    }

    tracing::debug!(
        user_id,
        owner_type = %owner_type,
        candidates = candidate_count,
        returned = results.len(),
        "memory search"
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::NewMemory;

    fn store_with(entries: &[(&str, f64, Vec<f32>)]) -> (MemoryStore, Vec<i64>) {
        let store = MemoryStore::open_in_memory().unwrap();
        let ids = entries
            .iter()
            .map(|(content, importance, embedding)| {
                let memory =
                    NewMemory::new("henry", OwnerType::User, *content).importance(*importance);
                store.insert(&memory, embedding).unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn importance_boosts_equal_similarity() {
        let (store, ids) = store_with(&[
            ("low", 0.1, vec![1.0, 0.0]),
            ("high", 0.9, vec![1.0, 0.0]),
        ]);
        let results = search(&store, "henry", OwnerType::User, &[1.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.id, ids[1]);
        assert!((results[0].score - 1.9).abs() < 1e-6);
        assert!((results[1].score - 1.1).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_entry_scores_zero_regardless_of_importance() {
        let (store, _) = store_with(&[("orthogonal", 1.0, vec![0.0, 1.0])]);
        let results = search(&store, "henry", OwnerType::User, &[1.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn zero_magnitude_embeddings_are_skipped() {
        let (store, ids) = store_with(&[
            ("zero", 0.9, vec![0.0, 0.0]),
            ("real", 0.1, vec![1.0, 0.0]),
        ]);
        let results = search(&store, "henry", OwnerType::User, &[1.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.id, ids[1]);
    }

    #[test]
    fn zero_query_returns_nothing_and_touches_nothing() {
        let (store, ids) = store_with(&[("a", 0.5, vec![1.0, 0.0])]);
        let before = store.get(ids[0]).unwrap().last_used_at;

        let results = search(&store, "henry", OwnerType::User, &[0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
        assert_eq!(store.get(ids[0]).unwrap().last_used_at, before);
    }

    #[test]
    fn ties_break_by_id() {
        let (store, ids) = store_with(&[
            ("first", 0.5, vec![1.0, 0.0]),
            ("second", 0.5, vec![1.0, 0.0]),
            ("third", 0.5, vec![1.0, 0.0]),
        ]);
        let results = search(&store, "henry", OwnerType::User, &[1.0, 0.0], 3).unwrap();
        let got: Vec<i64> = results.iter().map(|r| r.entry.id).collect();
        assert_eq!(got, ids);
    }

    #[test]
    fn limit_truncates_and_only_returned_are_touched() {
        let (store, ids) = store_with(&[
            ("best", 0.9, vec![1.0, 0.0]),
            ("worst", 0.1, vec![0.0, 1.0]),
        ]);
        let untouched_before = store.get(ids[1]).unwrap().last_used_at;

        let results = search(&store, "henry", OwnerType::User, &[1.0, 0.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.id, ids[0]);

        let stored = store.get(ids[0]).unwrap();
        assert_eq!(stored.last_used_at, results[0].entry.last_used_at);
        assert_eq!(store.get(ids[1]).unwrap().last_used_at, untouched_before);
    }

    #[test]
    fn empty_partition_and_zero_limit() {
        let (store, _) = store_with(&[("a", 0.5, vec![1.0, 0.0])]);
        assert!(search(&store, "nobody", OwnerType::User, &[1.0, 0.0], 5)
            .unwrap()
            .is_empty());
        assert!(search(&store, "henry", OwnerType::User, &[1.0, 0.0], 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rank_skips_dimension_mismatch() {
        let (store, _) = store_with(&[("short", 0.5, vec![1.0])]);
        let entries = store.list_all("henry", OwnerType::User).unwrap();
        assert!(rank(&[1.0, 0.0], entries, 5).is_empty());
    }
}
