//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::error::Result;
use crate::types::QueryParams;
use serde_json::Value;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available
    Continue {
        /// Complete query string for the next request
        query_params: QueryParams,
        /// New URL to request instead of the original one
        url: Option<String>,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Continue on the original URL with these parameters
    pub fn with_params(params: QueryParams) -> Self {
        Self::Continue {
            query_params: params,
            url: None,
        }
    }

    /// Continue on a server-provided URL, used verbatim
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::Continue {
            query_params: Vec::new(),
            url: Some(url.into()),
        }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }
}

/// Tracks pagination progress during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Pages received so far
    pub pages: u64,
    /// Cursor taken from the most recent page
    pub cursor: Option<String>,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Record that a page was received
    pub fn add_page(&mut self) {
        self.pages += 1;
    }

    /// Set cursor
    pub fn set_cursor(&mut self, cursor: impl Into<String>) {
        self.cursor = Some(cursor.into());
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync + std::fmt::Debug {
    /// Query parameters for the first request
    fn initial_params(&self) -> QueryParams;

    /// Decide the next request from the page just received
    ///
    /// Only the page in hand is consulted, never an earlier one.
    fn process_response(&self, body: &Value, state: &mut PaginationState) -> Result<NextPage>;
}

/// Append `(key, value)` to a parameter list
pub(crate) fn push_param(params: &mut QueryParams, key: &str, value: impl ToString) {
    params.push((key.to_string(), value.to_string()));
}
