//! In-memory sink

use super::types::RecordSink;
use crate::error::Result;
use crate::state::State;
use crate::types::JsonObject;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Sink that keeps every record and checkpoint
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, JsonObject)>>,
    checkpoints: Mutex<Vec<State>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All records as `(stream, record)` in emission order
    pub async fn records(&self) -> Vec<(String, JsonObject)> {
        self.records.lock().await.clone()
    }

    /// Records of one stream in emission order
    pub async fn records_for(&self, stream: &str) -> Vec<JsonObject> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|(s, _)| s == stream)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Number of records received
    pub async fn record_count(&self) -> usize {
        self.records.lock().await.len()
    }

    /// All checkpoints in order
    pub async fn checkpoints(&self) -> Vec<State> {
        self.checkpoints.lock().await.clone()
    }

    /// Most recent checkpoint
    pub async fn last_checkpoint(&self) -> Option<State> {
        self.checkpoints.lock().await.last().cloned()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn emit(&self, stream: &str, record: &JsonObject) -> Result<()> {
        self.records
            .lock()
            .await
            .push((stream.to_string(), record.clone()));
        Ok(())
    }

    async fn checkpoint(&self, state: &State) -> Result<()> {
        self.checkpoints.lock().await.push(state.clone());
        Ok(())
    }
}
