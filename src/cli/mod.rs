//! CLI module
//!
//! Command-line interface for running the tap.
//!
//! # Commands
//!
//! - `sync` - Extract records from the selected streams
//! - `check` - Resolve credentials and list companies
//! - `streams` - Print the stream tree

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
