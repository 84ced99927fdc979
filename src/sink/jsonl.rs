//! JSON lines sink

use super::types::{RecordSink, SinkMessage};
use crate::error::Result;
use crate::state::State;
use crate::types::JsonObject;
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Writes one JSON message per line
///
/// Records are buffered by the writer; checkpoints flush it so that a
/// consumer never sees a `STATE` line before the records it covers.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl JsonLinesSink<tokio::io::Stdout> {
    /// Write to standard output
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    /// Write to any async writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn write_line(&self, message: &SinkMessage<'_>, flush: bool) -> Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        if flush {
            writer.flush().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RecordSink for JsonLinesSink<W> {
    async fn emit(&self, stream: &str, record: &JsonObject) -> Result<()> {
        self.write_line(&SinkMessage::record(stream, record), false)
            .await
    }

    async fn checkpoint(&self, state: &State) -> Result<()> {
        self.write_line(&SinkMessage::state(state), true).await
    }
}

impl<W> std::fmt::Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSink").finish_non_exhaustive()
    }
}
