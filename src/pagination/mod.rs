//! Pagination module
//!
//! Turns one (stream, context, floor) triple into a lazy, finite sequence of
//! raw records.
//!
//! # Overview
//!
//! - `Paginator` - builds the first request from the descriptor, then follows
//!   continuation tokens until the payload stops returning one
//! - `PageRequest` - URL plus query of one page
//! - `PageResult` - records of one page plus the optional continuation
//! - `ApiRoots` - resolved API roots a descriptor's path is joined to
//!
//! Pages are fetched only when the consumer polls past the previous page's
//! records, and the returned stream cannot be restarted.

mod paginator;
mod types;

pub use paginator::{extract_page, format_filter_instant, Paginator};
pub use types::{ApiRoots, NextPage, PageLocators, PageRequest, PageResult};
