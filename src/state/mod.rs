//! State management module
//!
//! Tracks, per stream and partition, the largest replication-key value
//! observed so that the next run only asks for newer records.
//!
//! # Overview
//!
//! - `State` - serializable bookmark document
//! - `BookmarkStore` - shared in-run view with atomic file persistence
//! - `compare_replication_values` - ordering of bookmark values

mod store;
mod types;

pub use store::BookmarkStore;
pub use types::{
    compare_replication_values, is_after, PartitionBookmark, State, StreamBookmarks,
};
