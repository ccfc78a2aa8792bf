//! Pagination module
//!
//! Supports: Cursor (`page[after]`), Next Page links (offset and time
//! export), Cursor Export (`start_time` then `cursor`)
//!
//! # Overview
//!
//! A `Paginator` decides the next request from the page just received;
//! `paginate` drives it against the HTTP client as a lazy page stream and
//! `extract_records` pulls the records out of each page.

mod driver;
mod strategies;
mod types;

pub use driver::{extract_records, paginate, PageStream};
pub use strategies::{CursorPaginator, ExportPaginator, NextPagePaginator};
pub use types::{NextPage, PaginationState, Paginator};

#[cfg(test)]
mod tests;
