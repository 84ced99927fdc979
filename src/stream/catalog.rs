//! Ordered stream catalog with per-stream selection

use super::descriptor::StreamDescriptor;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Ordered forest of stream descriptors
///
/// Construction rejects duplicate names, unknown parents and parent cycles,
/// so every walk over the catalog terminates.
#[derive(Debug, Clone)]
pub struct Catalog {
    streams: Vec<StreamDescriptor>,
    index: HashMap<String, usize>,
    selected: HashSet<String>,
}

impl Catalog {
    /// Build a catalog with every stream selected
    pub fn new(streams: Vec<StreamDescriptor>) -> Result<Self> {
        let mut index = HashMap::with_capacity(streams.len());
        for (i, stream) in streams.iter().enumerate() {
            if index.insert(stream.name.clone(), i).is_some() {
                return Err(Error::catalog(format!(
                    "duplicate stream name '{}'",
                    stream.name
                )));
            }
        }

        for stream in &streams {
            if let Some(parent) = &stream.parent {
                if !index.contains_key(parent) {
                    return Err(Error::catalog(format!(
                        "stream '{}' references unknown parent '{parent}'",
                        stream.name
                    )));
                }
            }
        }

        // Single-parent links: a chain longer than the catalog is a cycle.
        for stream in &streams {
            let mut current = stream.parent.as_deref();
            let mut hops = 0;
            while let Some(name) = current {
                hops += 1;
                if name == stream.name || hops > streams.len() {
                    return Err(Error::catalog(format!(
                        "stream '{}' is part of a parent cycle",
                        stream.name
                    )));
                }
                current = streams[index[name]].parent.as_deref();
            }
        }

        let selected = streams.iter().map(|s| s.name.clone()).collect();
        Ok(Self {
            streams,
            index,
            selected,
        })
    }

    /// All descriptors in declaration order
    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    /// Look up a descriptor by name
    pub fn get(&self, name: &str) -> Option<&StreamDescriptor> {
        self.index.get(name).map(|&i| &self.streams[i])
    }

    /// Streams without a parent, in declaration order
    pub fn roots(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.iter().filter(|s| s.is_root())
    }

    /// Direct children of a stream, in declaration order
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a StreamDescriptor> {
        self.streams
            .iter()
            .filter(move |s| s.parent.as_deref() == Some(name))
    }

    /// Check if a stream is selected
    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.contains(name)
    }

    /// Select or deselect one stream
    pub fn set_selected(&mut self, name: &str, selected: bool) -> Result<()> {
        if !self.index.contains_key(name) {
            return Err(Error::StreamNotFound {
                stream: name.to_string(),
            });
        }
        if selected {
            self.selected.insert(name.to_string());
        } else {
            self.selected.remove(name);
        }
        Ok(())
    }

    /// Select exactly the named streams
    pub fn select_only<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        for name in names {
            if !self.index.contains_key(name.as_ref()) {
                return Err(Error::StreamNotFound {
                    stream: name.as_ref().to_string(),
                });
            }
        }
        self.selected = names.iter().map(|n| n.as_ref().to_string()).collect();
        Ok(())
    }

    /// Apply a selection document
    pub fn apply_selection(&mut self, selection: &CatalogSelection) -> Result<()> {
        for entry in &selection.streams {
            self.set_selected(&entry.stream, entry.selected)?;
        }
        Ok(())
    }

    /// Check if any descendant of a stream is selected
    pub fn has_selected_descendants(&self, name: &str) -> bool {
        self.children(name)
            .any(|child| self.is_selected(&child.name) || self.has_selected_descendants(&child.name))
    }

    /// Whether a stream must be read at all
    ///
    /// Unselected streams are still read when a descendant needs the
    /// contexts they produce; their records are not emitted.
    pub fn should_traverse(&self, name: &str) -> bool {
        self.is_selected(name) || self.has_selected_descendants(name)
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Selection document loaded from YAML or JSON
///
/// ```yaml
/// streams:
///   - stream: items
///     selected: true
///   - stream: vendor_ledger_entries
///     selected: false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSelection {
    /// Selection entries
    #[serde(default)]
    pub streams: Vec<SelectionEntry>,
}

/// One stream's selection flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionEntry {
    /// Stream name
    pub stream: String,
    /// Whether the stream's records are emitted
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl CatalogSelection {
    /// Load a selection file; `.yaml`/`.yml` are parsed as YAML, anything else as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, is_yaml(path))
    }

    /// Parse a selection document
    pub fn parse(contents: &str, yaml: bool) -> Result<Self> {
        if yaml {
            Ok(serde_yaml::from_str(contents)?)
        } else {
            Ok(serde_json::from_str(contents)?)
        }
    }
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}
