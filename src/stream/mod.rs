//! Stream module
//!
//! Declarative description of the entity streams the tap extracts.
//!
//! # Overview
//!
//! - `StreamDescriptor` - name, path template, keys and child-context rule
//!   of one entity type
//! - `ExtractionContext` - values a parent record hands to its children
//! - `Catalog` - ordered forest of descriptors plus selection flags

mod catalog;
mod context;
mod descriptor;

pub(crate) use catalog::is_yaml;
pub use catalog::{Catalog, CatalogSelection, SelectionEntry};
pub use context::ExtractionContext;
pub use descriptor::{ApiRoot, ChildContextFn, StreamDescriptor};
