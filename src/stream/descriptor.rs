//! Stream descriptor: the declared shape of one entity type

use super::context::ExtractionContext;
use crate::types::{JsonObject, SyncMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Derives the context handed to child streams from one record
///
/// Returning `None` drops the record's children without syncing them.
pub type ChildContextFn =
    Arc<dyn Fn(&JsonObject, &ExtractionContext) -> Option<ExtractionContext> + Send + Sync>;

/// Which API root a stream's path is resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiRoot {
    /// The standard REST API (`/api/v2.0`)
    #[default]
    Standard,
    /// The reports-finance beta API
    ReportsFinance,
    /// OData web services published by the tenant
    OData,
}

/// Immutable definition of one stream
#[derive(Clone)]
pub struct StreamDescriptor {
    /// Unique stream name
    pub name: String,
    /// Path template relative to the API root
    pub path: String,
    /// Fields forming the record's primary key
    pub primary_keys: Vec<String>,
    /// Field used for incremental filtering
    pub replication_key: Option<String>,
    /// Parent stream name
    pub parent: Option<String>,
    /// `$expand` hint passed through verbatim
    pub expand: Option<String>,
    /// Static `$filter` template rendered with the inbound context
    pub filter: Option<String>,
    /// Context field whose value a child stream is fetched at most once for
    pub dedup_key: Option<String>,
    /// Context fields that form the bookmark partition (all when `None`)
    pub partition_fields: Option<Vec<String>>,
    /// API root this stream lives under
    pub root: ApiRoot,
    /// Path fetched once per record to confirm its children are reachable
    pub access_probe: Option<String>,
    child_context: Option<ChildContextFn>,
}

impl StreamDescriptor {
    /// Create a descriptor with a name and a path template
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            primary_keys: vec!["id".to_string()],
            replication_key: None,
            parent: None,
            expand: None,
            filter: None,
            dedup_key: None,
            partition_fields: None,
            root: ApiRoot::Standard,
            access_probe: None,
            child_context: None,
        }
    }

    /// Set the primary key fields
    #[must_use]
    pub fn with_primary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the replication key, making the stream incremental
    #[must_use]
    pub fn with_replication_key(mut self, key: impl Into<String>) -> Self {
        self.replication_key = Some(key.into());
        self
    }

    /// Set the parent stream
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the `$expand` hint
    #[must_use]
    pub fn with_expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    /// Set a static `$filter` template
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Fetch this stream at most once per value of a context field
    #[must_use]
    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    /// Restrict the bookmark partition to the given context fields
    #[must_use]
    pub fn with_partition_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Resolve the path against a different API root
    #[must_use]
    pub fn with_root(mut self, root: ApiRoot) -> Self {
        self.root = root;
        self
    }

    /// Probe a path (rendered with each child context) before syncing children
    #[must_use]
    pub fn with_access_probe(mut self, path: impl Into<String>) -> Self {
        self.access_probe = Some(path.into());
        self
    }

    /// Set the function deriving child contexts from records
    #[must_use]
    pub fn with_child_context<F>(mut self, f: F) -> Self
    where
        F: Fn(&JsonObject, &ExtractionContext) -> Option<ExtractionContext>
            + Send
            + Sync
            + 'static,
    {
        self.child_context = Some(Arc::new(f));
        self
    }

    /// Sync mode implied by the replication key
    pub fn sync_mode(&self) -> SyncMode {
        if self.replication_key.is_some() {
            SyncMode::Incremental
        } else {
            SyncMode::FullRefresh
        }
    }

    /// Check if this stream has no parent
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Context for children of `record`
    ///
    /// Without an explicit function the inbound context is passed through.
    pub fn child_context(
        &self,
        record: &JsonObject,
        context: &ExtractionContext,
    ) -> Option<ExtractionContext> {
        match &self.child_context {
            Some(f) => f(record, context),
            None => Some(context.clone()),
        }
    }

    /// Bookmark partition of a context for this stream
    pub fn partition_of(&self, context: &ExtractionContext) -> ExtractionContext {
        context.partition(self.partition_fields.as_deref())
    }
}

impl fmt::Debug for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDescriptor")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("primary_keys", &self.primary_keys)
            .field("replication_key", &self.replication_key)
            .field("parent", &self.parent)
            .field("expand", &self.expand)
            .field("filter", &self.filter)
            .field("dedup_key", &self.dedup_key)
            .field("root", &self.root)
            .field("has_child_context", &self.child_context.is_some())
            .finish_non_exhaustive()
    }
}
