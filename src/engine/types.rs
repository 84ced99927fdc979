//! Engine types
//!
//! Per-stream and per-run outcome counters.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Outcome of one stream across all of its partitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    /// Records emitted
    pub records: usize,
    /// Partitions whose pagination completed
    pub partitions_succeeded: usize,
    /// Partitions aborted by a fatal error
    pub partitions_failed: usize,
    /// Invocations skipped because their dedup key was already synced
    pub skipped_duplicates: usize,
    /// Records dropped for not being past the incremental floor
    pub skipped_stale: usize,
    /// Parent records whose children were dropped by a failed access probe
    pub inaccessible: usize,
    /// One message per failed partition
    pub errors: Vec<String>,
}

impl StreamReport {
    /// Check if no partition failed
    pub fn is_success(&self) -> bool {
        self.partitions_failed == 0
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Per-stream outcome, keyed by stream name
    pub streams: BTreeMap<String, StreamReport>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome of one stream
    pub fn stream(&self, name: &str) -> Option<&StreamReport> {
        self.streams.get(name)
    }

    /// Mutable outcome of one stream, created on first use
    pub fn stream_mut(&mut self, name: &str) -> &mut StreamReport {
        self.streams.entry(name.to_string()).or_default()
    }

    /// Records emitted across all streams
    pub fn records(&self) -> usize {
        self.streams.values().map(|s| s.records).sum()
    }

    /// Failed partitions across all streams
    pub fn partitions_failed(&self) -> usize {
        self.streams.values().map(|s| s.partitions_failed).sum()
    }

    /// Streams with at least one failed partition
    pub fn failed_streams(&self) -> Vec<&str> {
        self.streams
            .iter()
            .filter(|(_, s)| !s.is_success())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Check if every stream succeeded
    pub fn is_success(&self) -> bool {
        self.streams.values().all(StreamReport::is_success)
    }
}

/// State scoped to one run
#[derive(Debug, Default)]
pub(crate) struct RunState {
    /// Dedup tokens already synced, per child stream
    pub dedup: HashMap<String, HashSet<String>>,
    /// Report under construction
    pub report: SyncReport,
}

impl RunState {
    /// Claim a dedup token; false if it was already claimed
    pub fn claim(&mut self, stream: &str, token: String) -> bool {
        self.dedup
            .entry(stream.to_string())
            .or_default()
            .insert(token)
    }
}
