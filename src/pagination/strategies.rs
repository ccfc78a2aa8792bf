//! Pagination strategy implementations
//!
//! Each strategy handles one of the API's pagination conventions.

use super::types::{push_param, NextPage, PaginationState, Paginator};
use crate::error::{Error, Result};
use crate::types::QueryParams;
use serde_json::Value;

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor-based pagination
///
/// Requests `page[size]=N`; while `meta.has_more` is true the next request
/// repeats the original parameters plus `page[after]=<meta.after_cursor>`.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Records per page
    pub page_size: u32,
    /// Stream-specific parameters sent on every request
    pub params: QueryParams,
}

impl CursorPaginator {
    /// Create a new cursor paginator
    pub fn new(page_size: u32, params: QueryParams) -> Self {
        Self { page_size, params }
    }
}

impl Paginator for CursorPaginator {
    fn initial_params(&self) -> QueryParams {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        push_param(&mut params, "page[size]", self.page_size);
        params.extend(self.params.iter().cloned());
        params
    }

    fn process_response(&self, body: &Value, state: &mut PaginationState) -> Result<NextPage> {
        let meta = body.get("meta");
        let has_more = meta
            .and_then(|m| m.get("has_more"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !has_more {
            state.mark_done();
            return Ok(NextPage::Done);
        }

        let cursor = meta
            .and_then(|m| m.get("after_cursor"))
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::protocol("meta.has_more is true but meta.after_cursor is missing"))?;

        state.set_cursor(cursor);
        let mut params = self.initial_params();
        push_param(&mut params, "page[after]", cursor);
        Ok(NextPage::with_params(params))
    }
}

// ============================================================================
// Next Page (offset / time export) Pagination
// ============================================================================

/// Next-link pagination
///
/// Requests `per_page=N` first, then follows the server's `next_page` URL
/// verbatim until it is absent. Time-based exports also stop on
/// `end_of_stream: true`, since they keep returning a `next_page`.
#[derive(Debug, Clone)]
pub struct NextPagePaginator {
    /// Records per page
    pub page_size: u32,
    /// Stream-specific parameters for the first request
    pub params: QueryParams,
    /// Stop when the page reports `end_of_stream: true`
    pub honor_end_of_stream: bool,
}

impl NextPagePaginator {
    /// Offset pagination
    pub fn new(page_size: u32, params: QueryParams) -> Self {
        Self {
            page_size,
            params,
            honor_end_of_stream: false,
        }
    }

    /// Time-based export pagination
    pub fn time_export(page_size: u32, params: QueryParams) -> Self {
        Self {
            page_size,
            params,
            honor_end_of_stream: true,
        }
    }
}

impl Paginator for NextPagePaginator {
    fn initial_params(&self) -> QueryParams {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        push_param(&mut params, "per_page", self.page_size);
        params.extend(self.params.iter().cloned());
        params
    }

    fn process_response(&self, body: &Value, state: &mut PaginationState) -> Result<NextPage> {
        if self.honor_end_of_stream && end_of_stream(body) {
            state.mark_done();
            return Ok(NextPage::Done);
        }

        match body
            .get("next_page")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
        {
            Some(url) => Ok(NextPage::with_url(url)),
            None => {
                state.mark_done();
                Ok(NextPage::Done)
            }
        }
    }
}

// ============================================================================
// Cursor Export Pagination
// ============================================================================

/// Incremental export with cursors
///
/// The first request carries `start_time`; every later one carries only
/// `cursor=<after_cursor>`. Both carry `include` when side-loading.
#[derive(Debug, Clone)]
pub struct ExportPaginator {
    /// Export start, epoch seconds
    pub start_time: i64,
    /// Side-loaded resource, e.g. `metric_sets`
    pub side_load: Option<String>,
}

impl ExportPaginator {
    /// Create a new export paginator
    pub fn new(start_time: i64, side_load: Option<String>) -> Self {
        Self {
            start_time,
            side_load,
        }
    }

    fn with_include(&self, mut params: QueryParams) -> QueryParams {
        if let Some(side_load) = &self.side_load {
            push_param(&mut params, "include", side_load);
        }
        params
    }
}

impl Paginator for ExportPaginator {
    fn initial_params(&self) -> QueryParams {
        let mut params = Vec::new();
        push_param(&mut params, "start_time", self.start_time);
        self.with_include(params)
    }

    fn process_response(&self, body: &Value, state: &mut PaginationState) -> Result<NextPage> {
        if end_of_stream(body) {
            state.mark_done();
            return Ok(NextPage::Done);
        }

        let cursor = body
            .get("after_cursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::protocol("export page has no after_cursor before end_of_stream"))?;

        state.set_cursor(cursor);
        let mut params = Vec::new();
        push_param(&mut params, "cursor", cursor);
        Ok(NextPage::with_params(self.with_include(params)))
    }
}

fn end_of_stream(body: &Value) -> bool {
    body.get("end_of_stream").and_then(Value::as_bool) == Some(true)
}
