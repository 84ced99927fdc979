//! Sink trait and wire messages

use crate::error::Result;
use crate::state::State;
use crate::types::JsonObject;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Destination of the record feed
///
/// Records arrive in walk order. A checkpoint carries the complete bookmark
/// state at that point; everything emitted before it is covered by it.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Accept one record of `stream`
    async fn emit(&self, stream: &str, record: &JsonObject) -> Result<()>;

    /// Accept a bookmark checkpoint
    async fn checkpoint(&self, state: &State) -> Result<()>;
}

/// One line of the JSON lines feed
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum SinkMessage<'a> {
    /// A record
    Record {
        /// Stream name
        stream: &'a str,
        /// Record with its context merged in
        record: &'a JsonObject,
        /// When the record was read
        time_extracted: DateTime<Utc>,
    },
    /// A bookmark checkpoint
    State {
        /// Complete bookmark state
        value: &'a State,
    },
}

impl<'a> SinkMessage<'a> {
    /// Create a record message stamped now
    pub fn record(stream: &'a str, record: &'a JsonObject) -> Self {
        Self::Record {
            stream,
            record,
            time_extracted: Utc::now(),
        }
    }

    /// Create a state message
    pub fn state(value: &'a State) -> Self {
        Self::State { value }
    }
}
