//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::TapConfig;
use crate::engine::{build_paginator, SyncEngine};
use crate::error::{Error, Result};
use crate::sink::JsonLinesSink;
use crate::state::BookmarkStore;
use crate::stream::{Catalog, CatalogSelection, ExtractionContext, StreamDescriptor};
use crate::streams::business_central_catalog;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops a running sync when cancelled
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Sync {
                streams,
                state_output,
            } => {
                self.sync(streams.as_deref(), state_output.as_deref())
                    .await
            }
            Commands::Check => self.check().await,
            Commands::Streams => self.streams(),
        }
    }

    /// Load configuration; inline JSON takes precedence over the file
    fn load_config(&self) -> Result<TapConfig> {
        if let Some(json) = &self.cli.config_json {
            return TapConfig::from_json(json);
        }
        match &self.cli.config {
            Some(path) => TapConfig::load(path),
            None => Err(Error::config(
                "No configuration given (use --config or --config-json)",
            )),
        }
    }

    /// Built-in catalog narrowed by `--catalog`, then by `--streams`
    fn load_catalog(&self, streams: Option<&str>) -> Result<Catalog> {
        let mut catalog = business_central_catalog()?;

        if let Some(path) = &self.cli.catalog {
            catalog.apply_selection(&CatalogSelection::load(path)?)?;
        }

        if let Some(streams) = streams {
            let names: Vec<&str> = streams
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if !names.is_empty() {
                catalog.select_only(&names)?;
            }
        }

        Ok(catalog)
    }

    /// Load bookmarks from `--state`, saving to `output` when given
    async fn load_state(&self, output: Option<&Path>) -> Result<BookmarkStore> {
        let store = match &self.cli.state {
            Some(path) => BookmarkStore::load(path).await?,
            None => BookmarkStore::in_memory(),
        };
        Ok(match output {
            Some(path) => store.with_output(path),
            None => store,
        })
    }

    /// Sync the selected streams to stdout
    async fn sync(&self, streams: Option<&str>, state_output: Option<&Path>) -> Result<()> {
        let config = self.load_config()?;
        let catalog = self.load_catalog(streams)?;
        let bookmarks = self.load_state(state_output).await?;

        let engine = SyncEngine::from_config(
            &config,
            catalog,
            bookmarks,
            Arc::new(JsonLinesSink::stdout()),
            self.cancel.clone(),
        )?;
        let report = engine.run().await?;

        for (name, stream) in &report.streams {
            info!(
                stream = %name,
                records = stream.records,
                partitions = stream.partitions_succeeded,
                failed = stream.partitions_failed,
                duplicates = stream.skipped_duplicates,
                "Stream summary"
            );
            for error in &stream.errors {
                warn!(stream = %name, error = %error, "Partition error");
            }
        }

        if report.is_success() {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "{} partition(s) failed in: {}",
                report.partitions_failed(),
                report.failed_streams().join(", ")
            )))
        }
    }

    /// Check credentials by listing companies
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let paginator = build_paginator(&config, self.cancel.clone())?;
        let catalog = business_central_catalog()?;
        let companies = catalog
            .get("companies")
            .ok_or_else(|| Error::StreamNotFound {
                stream: "companies".to_string(),
            })?;

        let outcome = match paginator.first_request(companies, &ExtractionContext::new(), None) {
            Ok(request) => paginator.fetch_page(&request).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(page) => {
                let companies: Vec<Value> = page
                    .records
                    .iter()
                    .map(|r| json!({ "id": r.get("id"), "name": r.get("name") }))
                    .collect();
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": format!("Connection successful, {} companies visible", companies.len()),
                        "companies": companies
                    }
                }));
                Ok(())
            }
            Err(e) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": format!("Connection failed: {e}")
                    }
                }));
                Err(e)
            }
        }
    }

    /// Print the stream tree
    fn streams(&self) -> Result<()> {
        let catalog = self.load_catalog(None)?;

        match self.cli.format {
            OutputFormat::Json => {
                let streams: Vec<Value> = catalog
                    .streams()
                    .iter()
                    .map(|s| describe(&catalog, s))
                    .collect();
                self.output_message(&json!({ "type": "STREAMS", "streams": streams }));
            }
            OutputFormat::Pretty => print!("{}", render_tree(&catalog)),
        }

        Ok(())
    }

    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn describe(catalog: &Catalog, stream: &StreamDescriptor) -> Value {
    json!({
        "name": stream.name,
        "parent": stream.parent,
        "path": stream.path,
        "root": stream.root,
        "sync_mode": stream.sync_mode(),
        "replication_key": stream.replication_key,
        "primary_keys": stream.primary_keys,
        "selected": catalog.is_selected(&stream.name)
    })
}

/// Indented tree of the catalog, `*` marking selected streams
fn render_tree(catalog: &Catalog) -> String {
    let mut out = String::new();
    for root in catalog.roots() {
        write_node(catalog, root, 0, &mut out);
    }
    out
}

fn write_node(catalog: &Catalog, stream: &StreamDescriptor, depth: usize, out: &mut String) {
    let marker = if catalog.is_selected(&stream.name) {
        '*'
    } else {
        ' '
    };
    let mode = match &stream.replication_key {
        Some(key) => format!("incremental on {key}"),
        None => "full refresh".to_string(),
    };
    let _ = writeln!(out, "{}{marker} {} ({mode})", "  ".repeat(depth), stream.name);
    for child in catalog.children(&stream.name) {
        write_node(catalog, child, depth + 1, out);
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("command", &self.cli.command)
            .finish_non_exhaustive()
    }
}
