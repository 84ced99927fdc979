//! Record sink module
//!
//! The boundary the engine writes records and bookmark checkpoints to.
//!
//! # Overview
//!
//! - `RecordSink` - async trait implemented by every destination
//! - `MemorySink` - collects everything in memory
//! - `JsonLinesSink` - Singer-style `RECORD` / `STATE` lines on any writer

mod jsonl;
mod memory;
mod types;

pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;
pub use types::{RecordSink, SinkMessage};
