//! Execution engine module
//!
//! Walks the stream forest depth-first and drives every other component.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - the stream graph walker
//! - `SyncReport` / `StreamReport` - aggregate outcome per stream
//!
//! For every root stream the walker paginates its records, merges the
//! inbound context into each record, emits it, tracks the running bookmark,
//! and recurses into child streams with the context the record produces.
//! A fatal error fails only the partition it happened in; auth errors and
//! cancellation stop the whole run.

mod types;

pub use types::{StreamReport, SyncReport};

use crate::auth::{self, Authenticator};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::http::{Fetched, HttpClient, HttpClientConfig};
use crate::pagination::{ApiRoots, Paginator};
use crate::sink::RecordSink;
use crate::state::{is_after, BookmarkStore};
use crate::stream::{Catalog, ExtractionContext, StreamDescriptor};
use crate::template;
use crate::types::JsonValue;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use types::RunState;

/// Stream graph walker
pub struct SyncEngine {
    catalog: Catalog,
    paginator: Paginator,
    bookmarks: BookmarkStore,
    sink: Arc<dyn RecordSink>,
    start_date: Option<DateTime<Utc>>,
}

impl SyncEngine {
    /// Create an engine from its collaborators
    pub fn new(
        catalog: Catalog,
        paginator: Paginator,
        bookmarks: BookmarkStore,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            catalog,
            paginator,
            bookmarks,
            sink,
            start_date: None,
        }
    }

    /// Assemble auth, HTTP client and paginator from the tap configuration
    pub fn from_config(
        config: &TapConfig,
        catalog: Catalog,
        bookmarks: BookmarkStore,
        sink: Arc<dyn RecordSink>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let paginator = build_paginator(config, cancel)?;
        Ok(Self::new(catalog, paginator, bookmarks, sink).with_start_date(config.start_date))
    }

    /// Floor for incremental partitions without a bookmark
    #[must_use]
    pub fn with_start_date(mut self, start_date: Option<DateTime<Utc>>) -> Self {
        self.start_date = start_date;
        self
    }

    /// Bookmark store
    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    /// Stream catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn cancel(&self) -> &CancellationToken {
        self.paginator.client().cancellation()
    }

    /// Walk every root stream in declaration order
    ///
    /// Returns `Err` only when the run was aborted (auth failure,
    /// cancellation, or a broken sink or state file). Bookmarks persisted
    /// before the abort stay valid and a final checkpoint is still emitted.
    pub async fn run(&self) -> Result<SyncReport> {
        let start = Instant::now();
        let mut run = RunState::default();

        let roots: Vec<&StreamDescriptor> = self.catalog.roots().collect();
        info!(streams = self.catalog.len(), roots = roots.len(), "Starting sync");

        let mut outcome = Ok(());
        for root in roots {
            if !self.catalog.should_traverse(&root.name) {
                debug!(stream = %root.name, "Skipping unselected subtree");
                continue;
            }
            outcome = self
                .sync_stream(root, ExtractionContext::new(), &mut run)
                .await;
            if outcome.is_err() {
                break;
            }
        }

        self.bookmarks.save().await?;
        self.sink.checkpoint(&self.bookmarks.snapshot().await).await?;

        run.report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(()) => {
                info!(
                    records = run.report.records(),
                    failed_partitions = run.report.partitions_failed(),
                    duration_ms = run.report.duration_ms,
                    "Sync finished"
                );
                Ok(run.report)
            }
            Err(e) => {
                error!(error = %e, "Sync aborted");
                Err(e)
            }
        }
    }

    /// Sync one partition of a stream, then its children
    ///
    /// Only run-aborting errors are returned; anything else is recorded
    /// against the partition.
    fn sync_stream<'a>(
        &'a self,
        descriptor: &'a StreamDescriptor,
        context: ExtractionContext,
        run: &'a mut RunState,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if self.cancel().is_cancelled() {
                return Err(Error::Cancelled);
            }

            let name = descriptor.name.as_str();
            let selected = self.catalog.is_selected(name);
            let partition = descriptor.partition_of(&context).key();
            let floor = self.floor(descriptor, &context).await;
            let floor_text = floor.as_ref().map(value_text);

            info!(
                stream = name,
                partition = %partition,
                floor = floor_text.as_deref().unwrap_or("-"),
                selected,
                "Syncing partition"
            );

            let mut records = self
                .paginator
                .fetch_all(descriptor, &context, floor_text.as_deref());
            let mut observed_max: Option<JsonValue> = None;
            let mut emitted = 0usize;
            let mut failure = None;

            while let Some(item) = records.next().await {
                let raw = match item {
                    Ok(record) => record,
                    Err(e) if e.aborts_run() => return Err(e),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                };

                let replication_value = descriptor
                    .replication_key
                    .as_deref()
                    .and_then(|key| raw.get(key))
                    .filter(|v| !v.is_null())
                    .cloned();

                if let (Some(value), Some(floor)) = (&replication_value, &floor) {
                    if !is_after(value, floor) {
                        run.report.stream_mut(name).skipped_stale += 1;
                        continue;
                    }
                }

                let child_context = descriptor.child_context(&raw, &context);

                if selected {
                    let mut record = raw;
                    context.merge_into(&mut record);
                    self.sink.emit(name, &record).await?;
                    emitted += 1;
                }

                if let Some(value) = replication_value {
                    if observed_max.as_ref().map_or(true, |max| is_after(&value, max)) {
                        observed_max = Some(value);
                    }
                }

                if let Some(child_context) = child_context {
                    self.sync_children(descriptor, child_context, run).await?;
                }
            }

            let report = run.report.stream_mut(name);
            report.records += emitted;

            if let Some(e) = failure {
                warn!(stream = name, partition = %partition, error = %e, "Partition failed");
                report.partitions_failed += 1;
                report.errors.push(format!("[{partition}] {e}"));
                return Ok(());
            }

            report.partitions_succeeded += 1;
            debug!(stream = name, partition = %partition, records = emitted, "Partition complete");

            if selected {
                if let Some(max) = observed_max {
                    self.bookmarks.set(descriptor, &context, max).await?;
                    self.bookmarks.save().await?;
                    self.sink.checkpoint(&self.bookmarks.snapshot().await).await?;
                }
            }

            Ok(())
        }
        .boxed()
    }

    /// Sync every traversable child of `parent` under one child context
    async fn sync_children(
        &self,
        parent: &StreamDescriptor,
        context: ExtractionContext,
        run: &mut RunState,
    ) -> Result<()> {
        let children: Vec<&StreamDescriptor> = self
            .catalog
            .children(&parent.name)
            .filter(|child| self.catalog.should_traverse(&child.name))
            .collect();
        if children.is_empty() {
            return Ok(());
        }

        if let Some(probe) = &parent.access_probe {
            if !self.probe(parent, probe, &context).await? {
                run.report.stream_mut(&parent.name).inaccessible += 1;
                return Ok(());
            }
        }

        for child in children {
            if let Some(key) = &child.dedup_key {
                let Some(value) = context.get_string(key) else {
                    debug!(stream = %child.name, key = %key, "No dedup value in context, skipping");
                    continue;
                };
                let token = format!("{}#{value}", child.partition_of(&context).key());
                if !run.claim(&child.name, token) {
                    debug!(stream = %child.name, key = %key, value = %value, "Already synced, skipping");
                    run.report.stream_mut(&child.name).skipped_duplicates += 1;
                    continue;
                }
            }

            self.sync_stream(child, context.clone(), run).await?;
        }

        Ok(())
    }

    /// Check that a parent record's children are reachable
    async fn probe(
        &self,
        parent: &StreamDescriptor,
        probe: &str,
        context: &ExtractionContext,
    ) -> Result<bool> {
        let url = template::render(probe, context)
            .map(|path| self.paginator.roots().join(parent.root, &path));
        let outcome = match url {
            Ok(url) => self.paginator.client().fetch(&url, &[]).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(Fetched::Body(_)) => Ok(true),
            Ok(Fetched::NotFound) => {
                warn!(stream = %parent.name, context = %context.key(), "Inaccessible (not found), skipping children");
                Ok(false)
            }
            Err(e) if e.aborts_run() => Err(e),
            Err(e) => {
                warn!(stream = %parent.name, context = %context.key(), error = %e, "Inaccessible, skipping children");
                Ok(false)
            }
        }
    }

    /// Incremental floor: stored bookmark, else the start date
    async fn floor(
        &self,
        descriptor: &StreamDescriptor,
        context: &ExtractionContext,
    ) -> Option<JsonValue> {
        descriptor.replication_key.as_ref()?;
        match self.bookmarks.get(descriptor, context).await {
            Some(value) => Some(value),
            None => self
                .start_date
                .map(|d| JsonValue::String(d.to_rfc3339_opts(SecondsFormat::Secs, true))),
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("streams", &self.catalog.len())
            .field("start_date", &self.start_date)
            .finish_non_exhaustive()
    }
}

/// Resolve auth and build the shared HTTP client and paginator
pub fn build_paginator(config: &TapConfig, cancel: CancellationToken) -> Result<Paginator> {
    let strategy = auth::resolve(config)?;
    info!(auth = strategy.kind(), "Resolved auth strategy");

    let authenticator = Authenticator::new(strategy).with_timeout(config.request_timeout());
    let client = HttpClient::new(HttpClientConfig::from_tap_config(config))?
        .with_authenticator(Arc::new(authenticator))
        .with_cancellation(cancel);

    Ok(Paginator::new(Arc::new(client), ApiRoots::from_config(config)))
}

fn value_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
