//! Extraction context threaded from parent records to child streams

use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable key/value mapping built from one parent record
///
/// A fresh context is produced for every (child stream, parent record)
/// pair. It supplies the placeholders of the child's path and filter
/// templates, is merged into every record the child emits, and determines
/// the bookmark partition of the child.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionContext {
    values: BTreeMap<String, JsonValue>,
}

impl ExtractionContext {
    /// Create an empty context (used for root streams)
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this context with one more entry
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Copy a field of `record` into the context under `key`
    ///
    /// Returns `None` when the record lacks the field, which callers use to
    /// drop the record's children.
    #[must_use]
    pub fn with_field(self, key: impl Into<String>, record: &JsonObject, field: &str) -> Option<Self> {
        let value = record.get(field).filter(|v| !v.is_null())?.clone();
        Some(self.with(key, value))
    }

    /// Keep only the named entries
    #[must_use]
    pub fn retain(&self, keys: &[&str]) -> Self {
        Self {
            values: self
                .values
                .iter()
                .filter(|(k, _)| keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    /// Get a value rendered as a string (strings verbatim, scalars formatted)
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.values.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the context has no entries
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sub-context holding only the fields that identify a bookmark partition
    ///
    /// `fields` of `None` means every entry takes part.
    pub fn partition(&self, fields: Option<&[String]>) -> Self {
        match fields {
            None => self.clone(),
            Some(fields) => {
                let keys: Vec<&str> = fields.iter().map(String::as_str).collect();
                self.retain(&keys)
            }
        }
    }

    /// Stable textual key of this context, e.g. `company_id=C1`
    ///
    /// Empty for the root context.
    pub fn key(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| match v {
                JsonValue::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Merge every entry into `record`, overwriting same-named fields
    pub fn merge_into(&self, record: &mut JsonObject) {
        for (k, v) in &self.values {
            record.insert(k.clone(), v.clone());
        }
    }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for ExtractionContext {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
