//! Page streams
//!
//! Turns a paginator and an HTTP client into a lazy stream of pages.

use super::types::{NextPage, PaginationState, Paginator};
use crate::error::Result;
use crate::http::HttpClient;
use futures::stream::BoxStream;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Lazy stream of raw response bodies
pub type PageStream = BoxStream<'static, Result<Value>>;

/// Stream every page of `url`
///
/// Each page costs exactly one transport call, made only when the consumer
/// polls for it. A page is always yielded before any error the paginator
/// raises about it, and the stream ends after the first error.
pub fn paginate(
    client: HttpClient,
    url: impl Into<String>,
    paginator: Arc<dyn Paginator>,
) -> PageStream {
    let url = url.into();

    let stream = async_stream::stream! {
        let mut state = PaginationState::new();
        let mut request_url = url.clone();
        let mut params = paginator.initial_params();

        loop {
            let page = match client.get_json(&request_url, &params).await {
                Ok(page) => page,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            state.add_page();

            let next = paginator.process_response(&page, &mut state);
            yield Ok(page);

            match next {
                Ok(NextPage::Continue { query_params, url: next_url }) => {
                    request_url = next_url.unwrap_or_else(|| url.clone());
                    params = query_params;
                }
                Ok(NextPage::Done) => break,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        debug!(url = %url, pages = state.pages, "Pagination complete");
    };

    Box::pin(stream)
}

/// Records found under a dot path of a page
///
/// An array is returned element by element, a single object becomes one
/// record, and anything else (including a missing path) yields nothing.
pub fn extract_records(page: &Value, item_key: &str) -> Vec<Value> {
    let mut current = page;
    for part in item_key.split('.').filter(|p| !p.is_empty()) {
        match current.get(part) {
            Some(value) => current = value,
            None => return Vec::new(),
        }
    }

    match current {
        Value::Array(items) => items.clone(),
        Value::Object(_) => vec![current.clone()],
        _ => Vec::new(),
    }
}
