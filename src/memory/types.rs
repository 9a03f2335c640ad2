//! Core memory type definitions.
//!
//! Defines [`OwnerType`] (the partition discriminator), [`MemoryEntry`] (a
//! stored record), [`NewMemory`] (the caller-facing insert request) and the
//! fixed-width timestamp encoding shared by the store and event log.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::embedding::embedding_defect;
use crate::error::{MemoryError, Result};

/// Who a memory is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    /// Facts about the user.
    User,
    /// Commitments the assistant has made about itself.
    Assistant,
}

impl OwnerType {
    pub const ALL: [OwnerType; 2] = [OwnerType::User, OwnerType::Assistant];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for OwnerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OwnerType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("unknown owner type: {s}")),
        }
    }
}

/// Category labels attached to an entry. Non-exclusive, unordered.
pub type Tags = BTreeSet<String>;

/// Opaque caller-supplied key/value data, immutable after creation.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A memory record, matching the `long_term_memories` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: i64,
    pub user_id: String,
    pub owner_type: OwnerType,
    pub content: String,
    pub embedding: Vec<f32>,
    pub tags: Tags,
    /// Relevance weight in `[0.0, 1.0]`; decays with disuse.
    pub importance: f64,
    /// Revisability weight in `[0.0, 1.0]`. Stored, never enforced.
    pub plasticity: f64,
    pub created_at: DateTime<Utc>,
    /// Refreshed whenever the entry is returned by a search or decayed.
    pub last_used_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl MemoryEntry {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// An insert request. The embedding is computed by the engine when absent.
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub user_id: String,
    pub owner_type: OwnerType,
    pub content: String,
    pub tags: Tags,
    pub importance: f64,
    pub plasticity: f64,
    pub metadata: Option<Metadata>,
    pub embedding: Option<Vec<f32>>,
}

impl NewMemory {
    pub fn new(
        user_id: impl Into<String>,
        owner_type: OwnerType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            owner_type,
            content: content.into(),
            tags: Tags::new(),
            importance: 0.5,
            plasticity: 0.5,
            metadata: None,
            embedding: None,
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    pub fn plasticity(mut self, plasticity: f64) -> Self {
        self.plasticity = plasticity;
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Supply a precomputed vector; the provider is then never called.
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Reject requests that would violate entry invariants.
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(MemoryError::InvalidInput("content must not be empty".into()));
        }
        if self.user_id.is_empty() {
            return Err(MemoryError::InvalidInput("user_id must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.importance) {
            return Err(MemoryError::InvalidInput(
                "importance must be between 0.0 and 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.plasticity) {
            return Err(MemoryError::InvalidInput(
                "plasticity must be between 0.0 and 1.0".into(),
            ));
        }
        if let Some(defect) = self.embedding.as_deref().and_then(embedding_defect) {
            return Err(MemoryError::InvalidInput(format!(
                "supplied embedding is unusable: {defect}"
            )));
        }
        Ok(())
    }
}

/// Clamp an importance value into `[0.0, 1.0]`. NaN collapses to 0.
pub fn clamp_importance(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Current time at the precision timestamps are stored with.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 (microseconds, `Z`) so stored timestamps sort as text.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_type_round_trips_through_str() {
        for owner in OwnerType::ALL {
            assert_eq!(owner.as_str().parse::<OwnerType>().unwrap(), owner);
        }
        assert!("system".parse::<OwnerType>().is_err());
    }

    #[test]
    fn new_memory_defaults() {
        let m = NewMemory::new("henry", OwnerType::User, "likes tea");
        assert_eq!(m.importance, 0.5);
        assert_eq!(m.plasticity, 0.5);
        assert!(m.tags.is_empty());
        assert!(m.embedding.is_none());
        assert!(m.validate().is_ok());
    }

    #[test]
    fn tags_are_a_set() {
        let m = NewMemory::new("henry", OwnerType::User, "x")
            .tags(["project", "preference", "project"]);
        assert_eq!(m.tags.len(), 2);
        assert!(m.tags.contains("project"));
    }

    #[test]
    fn validate_rejects_out_of_range_and_empty() {
        let base = NewMemory::new("henry", OwnerType::User, "likes tea");
        assert!(base.clone().importance(1.2).validate().is_err());
        assert!(base.clone().importance(-0.1).validate().is_err());
        assert!(base.clone().plasticity(2.0).validate().is_err());
        assert!(NewMemory::new("henry", OwnerType::User, "   ").validate().is_err());
        assert!(NewMemory::new("", OwnerType::User, "x").validate().is_err());
        assert!(base.clone().embedding(vec![]).validate().is_err());
        assert!(base.clone().embedding(vec![0.5, f32::INFINITY]).validate().is_err());
        assert!(base.embedding(vec![0.5, 0.5]).validate().is_ok());
    }

    #[test]
    fn clamp_importance_bounds() {
        assert_eq!(clamp_importance(1.7), 1.0);
        assert_eq!(clamp_importance(-0.3), 0.0);
        assert_eq!(clamp_importance(f64::NAN), 0.0);
        assert_eq!(clamp_importance(0.42), 0.42);
    }

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let a = chrono::DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = a + chrono::Duration::milliseconds(1);
        let (sa, sb) = (format_timestamp(a), format_timestamp(b));
        assert_eq!(sa.len(), sb.len());
        assert!(sa < sb);
        assert_eq!(parse_timestamp(&sa).unwrap(), a);
    }

    #[test]
    fn now_survives_storage_round_trip() {
        let at = now();
        assert_eq!(parse_timestamp(&format_timestamp(at)).unwrap(), at);
    }
}
