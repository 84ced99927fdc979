//! Bookmark store
//!
//! In-process authoritative view of the bookmarks during a run, with
//! optional file persistence using atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use crate::stream::{ExtractionContext, StreamDescriptor};
use crate::types::JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Shared bookmark store
///
/// Clones share the same state. Writes are last-write-wins per
/// (stream, partition).
#[derive(Debug, Clone, Default)]
pub struct BookmarkStore {
    /// Where `save` writes; `None` keeps the store in memory
    path: Option<PathBuf>,
    state: Arc<RwLock<State>>,
}

impl BookmarkStore {
    /// Create an in-memory store
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Create an in-memory store seeded with a state
    pub fn with_state(state: State) -> Self {
        Self {
            path: None,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Parse a store from inline JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let state: State = serde_json::from_str(json)
            .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))?;
        Ok(Self::with_state(state))
    }

    /// Load a store from a file; a missing file starts empty
    ///
    /// Later saves go back to the same file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            if contents.trim().is_empty() {
                State::new()
            } else {
                serde_json::from_str(&contents)
                    .map_err(|e| Error::state(format!("Failed to parse state file: {e}")))?
            }
        } else {
            State::new()
        };

        Ok(Self {
            path: Some(path),
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Send later saves to `path`
    #[must_use]
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// File the store saves to
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Bookmark of `descriptor` for the partition `context` belongs to
    pub async fn get(
        &self,
        descriptor: &StreamDescriptor,
        context: &ExtractionContext,
    ) -> Option<JsonValue> {
        let partition = descriptor.partition_of(context);
        self.state
            .read()
            .await
            .get(&descriptor.name, &partition)
            .cloned()
    }

    /// Record the bookmark of `descriptor` for the partition `context` belongs to
    pub async fn set(
        &self,
        descriptor: &StreamDescriptor,
        context: &ExtractionContext,
        value: JsonValue,
    ) -> Result<()> {
        let key = descriptor.replication_key.as_deref().ok_or_else(|| {
            Error::state(format!(
                "stream '{}' has no replication key to bookmark",
                descriptor.name
            ))
        })?;
        let partition = descriptor.partition_of(context);
        debug!(
            stream = %descriptor.name,
            partition = %partition.key(),
            value = %value,
            "Bookmark advanced"
        );
        self.state
            .write()
            .await
            .set(&descriptor.name, partition, key, value);
        Ok(())
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Persist to the configured file, if any
    pub async fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to(path).await,
            None => Ok(()),
        }
    }

    /// Persist to `path` through a temporary file and a rename
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = {
            let state = self.state.read().await;
            serde_json::to_string_pretty(&*state)
                .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))?
        };

        let path = path.as_ref();
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        Ok(())
    }

    /// Export the state as JSON
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }
}
