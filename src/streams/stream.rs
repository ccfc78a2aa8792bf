//! Stream instances
//!
//! A `Stream` pairs a static descriptor with the selection made in the
//! catalog and the sub-streams that hang off it.

use super::context::{EventStream, StreamEvent, SyncContext};
use super::descriptor::{AccessCheck, CustomSync, ParamsHook, StreamDescriptor, SyncStrategy};
use super::registry;
use super::strategies;
use crate::error::{Error, Result};
use crate::fanout;
use crate::pagination::{
    extract_records, paginate, CursorPaginator, ExportPaginator, NextPagePaginator, Paginator,
};
use crate::template::{self, TemplateContext};
use crate::types::{PaginationType, QueryParams};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Lazy sequence of records from one endpoint
pub(crate) type RecordStream = BoxStream<'static, Result<Value>>;

/// A stream ready to sync
#[derive(Debug, Clone)]
pub struct Stream {
    descriptor: &'static StreamDescriptor,
    selected: bool,
    children: Vec<Stream>,
}

impl Stream {
    /// Create a stream without children
    pub fn new(descriptor: &'static StreamDescriptor, selected: bool) -> Self {
        Self {
            descriptor,
            selected,
            children: Vec::new(),
        }
    }

    /// Attach sub-streams
    #[must_use]
    pub fn with_children(mut self, children: Vec<Stream>) -> Self {
        self.children = children;
        self
    }

    /// Build a registered stream and its registered children
    ///
    /// `is_selected` decides selection by stream name.
    pub fn from_registry(name: &str, is_selected: impl Fn(&str) -> bool) -> Result<Self> {
        let descriptor = registry::get(name).ok_or_else(|| Error::stream_not_found(name))?;
        let children = registry::children_of(name)
            .map(|child| Stream::new(child, is_selected(child.name)))
            .collect();
        Ok(Stream::new(descriptor, is_selected(name)).with_children(children))
    }

    /// Stream name
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Static definition
    pub fn descriptor(&self) -> &'static StreamDescriptor {
        self.descriptor
    }

    /// Check if the catalog selected this stream
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Sub-streams
    pub fn children(&self) -> &[Stream] {
        &self.children
    }

    /// Sub-stream by name
    pub fn child(&self, name: &str) -> Option<&Stream> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Check if the named sub-stream exists and is selected
    pub fn is_child_selected(&self, name: &str) -> bool {
        self.child(name).is_some_and(Stream::is_selected)
    }

    /// A stream runs when it or any of its children is selected
    pub fn should_sync(&self) -> bool {
        self.selected || self.children.iter().any(Stream::is_selected)
    }

    // ========================================================================
    // Bookmarks
    // ========================================================================

    /// Effective bookmark, never earlier than the configured start date
    pub async fn get_bookmark(&self, ctx: &SyncContext) -> DateTime<Utc> {
        let floor = ctx.config.start_date;
        match self.descriptor.bookmark_key() {
            Some(key) => ctx.state.bookmark(self.name(), key, floor).await,
            None => floor,
        }
    }

    /// Move the bookmark forward; FULL_TABLE streams never write one
    pub async fn update_bookmark(&self, ctx: &SyncContext, candidate: DateTime<Utc>) -> bool {
        match self.descriptor.bookmark_key() {
            Some(key) => {
                ctx.state
                    .advance_bookmark(self.name(), key, candidate, ctx.config.start_date)
                    .await
            }
            None => false,
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Endpoint path, with the parent's `id` filled into the placeholder
    pub fn endpoint_for(&self, parent: Option<&Value>) -> Result<String> {
        let mut vars = TemplateContext::new();
        if let (Some(key), Some(parent)) = (self.descriptor.parent_key, parent) {
            vars.set(key, parent.get("id").cloned().unwrap_or(Value::Null));
        }
        template::render(self.descriptor.endpoint, &vars)
    }

    /// Stream-specific query parameters for a sync starting at `bookmark`
    ///
    /// Time-export endpoints always take `start_time`.
    pub fn request_params(&self, bookmark: DateTime<Utc>) -> QueryParams {
        let mut params = QueryParams::new();
        if self.descriptor.params == ParamsHook::StartTime
            || self.descriptor.pagination == PaginationType::TimeExport
        {
            params.push(("start_time".to_string(), bookmark.timestamp().to_string()));
        }
        params
    }

    /// Paginator for a sync starting at `bookmark`
    pub fn paginator(&self, ctx: &SyncContext, bookmark: DateTime<Utc>) -> Arc<dyn Paginator> {
        let page_size = ctx.config.page_size;
        let params = self.request_params(bookmark);
        match self.descriptor.pagination {
            PaginationType::Cursor => Arc::new(CursorPaginator::new(page_size, params)),
            PaginationType::Offset => Arc::new(NextPagePaginator::new(page_size, params)),
            PaginationType::TimeExport => Arc::new(NextPagePaginator::time_export(page_size, params)),
            PaginationType::CursorExport => Arc::new(ExportPaginator::new(
                ctx.config.export_start(bookmark).timestamp(),
                self.descriptor.side_load.map(str::to_string),
            )),
        }
    }

    /// Every record of this stream's endpoint, after the record hook
    ///
    /// Sub-streams need the `parent` record to build their endpoint.
    pub(crate) fn records(
        &self,
        ctx: &SyncContext,
        parent: Option<&Value>,
        bookmark: DateTime<Utc>,
    ) -> RecordStream {
        let descriptor = self.descriptor;
        let url = self.endpoint_for(parent);
        let paginator = self.paginator(ctx, bookmark);
        let client = ctx.client.clone();
        let parent = parent.cloned();

        let stream = async_stream::stream! {
            let url = match url {
                Ok(url) => url,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut pages = paginate(client, url, paginator);
            while let Some(page) = pages.next().await {
                match page {
                    Ok(page) => {
                        for record in extract_records(&page, descriptor.item_key) {
                            yield Ok(descriptor.modify_record(record, parent.as_ref()));
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        };

        Box::pin(stream)
    }

    // ========================================================================
    // Sync
    // ========================================================================

    /// Sync this stream and its selected children
    ///
    /// Nothing is requested until the returned stream is polled.
    pub fn sync(&self, ctx: &SyncContext) -> EventStream {
        let stream = self.clone();
        let ctx = ctx.clone();
        match self.descriptor.strategy {
            SyncStrategy::Paginated => strategies::sync_paginated(stream, ctx),
            SyncStrategy::CursorExport => strategies::sync_cursor_export(stream, ctx),
            SyncStrategy::Custom(CustomSync::Tickets) => fanout::sync_tickets(stream, ctx),
            SyncStrategy::Custom(CustomSync::TicketMetricEvents) => {
                strategies::sync_ticket_metric_events(stream, ctx)
            }
            SyncStrategy::Custom(CustomSync::TicketSideLoad) => {
                let error = Error::config(format!(
                    "stream '{}' is only synced through its parent '{}'",
                    self.name(),
                    self.descriptor.parent.unwrap_or_default()
                ));
                futures::stream::once(async move { Err::<StreamEvent, _>(error) }).boxed()
            }
        }
    }

    /// Probe the endpoint with a one-record request
    ///
    /// Errors propagate unchanged; callers look at `Error::class()` to tell
    /// missing permissions apart from other failures.
    pub async fn check_access(&self, ctx: &SyncContext) -> Result<()> {
        let descriptor = self.descriptor;
        if descriptor.access_check == AccessCheck::Skip {
            debug!(stream = self.name(), "Skipping access check");
            return Ok(());
        }

        let mut vars = TemplateContext::new();
        if let Some(key) = descriptor.parent_key {
            vars.set(key, 1);
        }
        let endpoint = template::render(descriptor.endpoint, &vars)?;

        let mut params = QueryParams::new();
        if matches!(
            descriptor.pagination,
            PaginationType::CursorExport | PaginationType::TimeExport
        ) || descriptor.params == ParamsHook::StartTime
        {
            params.push((
                "start_time".to_string(),
                ctx.config.start_date.timestamp().to_string(),
            ));
        }
        params.push(("per_page".to_string(), "1".to_string()));

        match ctx.client.get_json(&endpoint, &params).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() && descriptor.access_check == AccessCheck::IgnoreNotFound => {
                debug!(stream = self.name(), "Endpoint returned 404, treating as accessible");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
