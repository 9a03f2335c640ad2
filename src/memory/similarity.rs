//! Vector similarity.
//!
//! Every similarity computation in the engine goes through this module, so an
//! indexed nearest-neighbour structure can replace the exhaustive scans here
//! without touching retrieval or maintenance.

use super::types::MemoryEntry;

/// Cosine similarity computed in f32.
///
/// Returns `None` when either vector has zero magnitude or the lengths
/// differ; callers treat that as "no signal" and skip the entry.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// A pair of entries (by index into the scanned slice) and their similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarPair {
    pub first: usize,
    pub second: usize,
    pub similarity: f32,
}

/// Which member of a [`SimilarPair`] the visitor decided to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    First,
    Second,
}

/// Exhaustive pairwise scan in slice order over every pair at or above
/// `threshold`. The visitor picks which member to drop; a dropped entry takes
/// no part in any later comparison.
pub fn scan_pairs<F>(entries: &[MemoryEntry], threshold: f32, mut visit: F)
where
    F: FnMut(SimilarPair) -> Discard,
{
    let mut dropped = vec![false; entries.len()];
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            if dropped[i] {
                break;
            }
            if dropped[j] {
                continue;
            }
            let Some(similarity) = cosine_similarity(&entries[i].embedding, &entries[j].embedding)
            else {
                continue;
            };
            if similarity < threshold {
                continue;
            }
            let pair = SimilarPair {
                first: i,
                second: j,
                similarity,
            };
            match visit(pair) {
                Discard::First => dropped[i] = true,
                Discard::Second => dropped[j] = true,
            }
        }
    }
}
