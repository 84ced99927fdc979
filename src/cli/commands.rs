//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Business Central tap CLI
#[derive(Parser, Debug)]
#[command(name = "tap-dynamics-bc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// State file (JSON) holding bookmarks from a previous run
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Catalog file (JSON or YAML) selecting streams
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Output format for `check` and `streams`
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract records, writing RECORD and STATE lines to stdout
    Sync {
        /// Streams to sync (comma-separated, empty = catalog selection)
        #[arg(long)]
        streams: Option<String>,

        /// Write bookmarks here instead of back to --state
        #[arg(long)]
        state_output: Option<PathBuf>,
    },

    /// Resolve credentials and list the companies they can see
    Check,

    /// Print the stream tree
    Streams,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
