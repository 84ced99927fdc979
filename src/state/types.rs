//! Bookmark state types
//!
//! These types are serialized to JSON and persisted between runs:
//!
//! ```json
//! {
//!   "bookmarks": {
//!     "items": {
//!       "partitions": [
//!         {
//!           "context": {"company_id": "C1"},
//!           "replication_key": "lastModifiedDateTime",
//!           "replication_key_value": "2024-05-01T10:00:00Z"
//!         }
//!       ]
//!     }
//!   }
//! }
//! ```

use crate::stream::ExtractionContext;
use crate::types::JsonValue;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Complete bookmark state of the tap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmarks
    #[serde(default)]
    pub bookmarks: BTreeMap<String, StreamBookmarks>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Bookmark of one partition
    pub fn get(&self, stream: &str, partition: &ExtractionContext) -> Option<&JsonValue> {
        self.bookmarks
            .get(stream)?
            .find(partition)
            .map(|p| &p.replication_key_value)
    }

    /// Record the bookmark of one partition, replacing any previous value
    pub fn set(
        &mut self,
        stream: &str,
        partition: ExtractionContext,
        replication_key: impl Into<String>,
        value: JsonValue,
    ) {
        let bookmarks = self.bookmarks.entry(stream.to_string()).or_default();
        let replication_key = replication_key.into();

        match bookmarks.partitions.iter_mut().find(|p| p.context == partition) {
            Some(existing) => {
                existing.replication_key = replication_key;
                existing.replication_key_value = value;
            }
            None => bookmarks.partitions.push(PartitionBookmark {
                context: partition,
                replication_key,
                replication_key_value: value,
            }),
        }
    }

    /// Bookmarks of one stream
    pub fn stream(&self, stream: &str) -> Option<&StreamBookmarks> {
        self.bookmarks.get(stream)
    }

    /// Check if no bookmark has been recorded
    pub fn is_empty(&self) -> bool {
        self.bookmarks.values().all(|s| s.partitions.is_empty())
    }
}

/// Bookmarks of one stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamBookmarks {
    /// One entry per partition
    #[serde(default)]
    pub partitions: Vec<PartitionBookmark>,
}

impl StreamBookmarks {
    /// Find the entry of a partition
    pub fn find(&self, partition: &ExtractionContext) -> Option<&PartitionBookmark> {
        self.partitions.iter().find(|p| &p.context == partition)
    }
}

/// High-water mark of one partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionBookmark {
    /// Context fields identifying the partition
    #[serde(default)]
    pub context: ExtractionContext,
    /// Field the value was read from
    pub replication_key: String,
    /// Largest value observed
    pub replication_key_value: JsonValue,
}

// ============================================================================
// Replication Value Ordering
// ============================================================================

/// Order two replication values
///
/// RFC 3339 strings compare as instants, numbers numerically, everything
/// else by its textual form.
pub fn compare_replication_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::String(a), JsonValue::String(b)) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (JsonValue::Number(a), JsonValue::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => text(a).cmp(&text(b)),
    }
}

/// Check if `value` is strictly past `floor`
pub fn is_after(value: &JsonValue, floor: &JsonValue) -> bool {
    compare_replication_values(value, floor) == Ordering::Greater
}

fn text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
