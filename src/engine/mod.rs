//! Execution engine module
//!
//! Runs the selected streams of a catalog and writes Singer messages.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Syncs top-level streams one after another, in catalog order
//! - `sync_stream` - Syncs one stream family and writes its records and state
//! - `SyncReport` - Per-stream counts and failures of a run

mod types;

pub use types::{StreamFailure, SyncReport};

use crate::catalog::{
    definitions_by_key, merge_custom_fields, readable_definitions, Catalog, CatalogEntry,
    USER_FIELDS,
};
use crate::error::Result;
use crate::output::{Message, MessageSink};
use crate::schema::Transformer;
use crate::state::State;
use crate::streams::{registry, Stream, StreamEvent, SyncContext};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{error, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine<S> {
    /// Client, config and live state
    ctx: SyncContext,
    /// Message destination
    sink: S,
}

impl<S: MessageSink> SyncEngine<S> {
    /// Create a new sync engine
    pub fn new(ctx: SyncContext, sink: S) -> Self {
        Self { ctx, sink }
    }

    /// Get the sync context
    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Get the sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Take the sink back
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Sync every selected top-level stream of `catalog`
    ///
    /// A failing stream is logged and counted and the run moves on to the
    /// next one. Only errors writing to the sink abort the run.
    pub async fn run(&mut self, catalog: &Catalog) -> Result<SyncReport> {
        let start = Instant::now();
        let mut report = SyncReport::new();
        info!("Starting sync");

        for entry in &catalog.streams {
            let name = entry.tap_stream_id.as_str();
            let Some(descriptor) = registry::get(name) else {
                warn!(stream = name, "Unknown stream in catalog, skipping");
                continue;
            };
            if descriptor.is_child() {
                continue;
            }

            let stream = Stream::from_registry(name, |n| catalog.is_selected(n))?;
            if !stream.should_sync() {
                info!("{name}: Skipping - not selected");
                continue;
            }

            write_state(&self.ctx, &mut self.sink).await?;
            write_schemas(catalog, &stream, &mut self.sink)?;

            self.ctx.state.set_currently_syncing(Some(name)).await;
            info!("{name}: Starting sync");
            match sync_stream(&self.ctx, catalog, &stream, &mut self.sink).await {
                Ok(count) => {
                    info!("{name}: Completed sync ({count} rows)");
                    report.add_stream(name, count);
                }
                Err(e) => {
                    error!(stream = name, status = ?e.status(), "{name}: Sync failed: {e}");
                    report.add_failure(StreamFailure::new(name, &e));
                }
            }
            self.ctx.state.set_currently_syncing(None).await;
        }

        write_state(&self.ctx, &mut self.sink).await?;
        self.sink.flush()?;

        report.set_duration(start.elapsed().as_millis() as u64);
        info!(
            streams = report.streams_synced(),
            failed = report.failed_streams,
            records = report.total_records(),
            "Finished sync"
        );
        Ok(report)
    }
}

/// Sync one stream and its selected children
///
/// Seeds a missing bookmark with the start date, transforms every record
/// with its catalog entry, writes STATE at every checkpoint and at the end,
/// and returns the number of records of the primary stream. User records
/// get the account's user field definitions merged into `user_fields`. When the sync
/// fails, the family's bookmarks go back to the last STATE written.
pub async fn sync_stream(
    ctx: &SyncContext,
    catalog: &Catalog,
    stream: &Stream,
    sink: &mut dyn MessageSink,
) -> Result<usize> {
    if stream.is_selected() {
        if let Some(key) = stream.descriptor().bookmark_key() {
            ctx.state
                .seed_bookmark(stream.name(), key, ctx.config.start_date)
                .await;
        }
    }

    let mut checkpoint = ctx.state.snapshot().await;
    let result = write_records(ctx, catalog, stream, sink, &mut checkpoint).await;

    if result.is_err() {
        let family: Vec<&str> = std::iter::once(stream.name())
            .chain(stream.children().iter().map(Stream::name))
            .collect();
        ctx.state.restore_bookmarks(&family, &checkpoint).await;
    }
    result
}

async fn write_records(
    ctx: &SyncContext,
    catalog: &Catalog,
    stream: &Stream,
    sink: &mut dyn MessageSink,
    checkpoint: &mut State,
) -> Result<usize> {
    let mut transformers: BTreeMap<&'static str, Transformer> = BTreeMap::new();
    let mut counter = 0;
    let user_fields = if stream.name() == "users" && stream.is_selected() {
        readable_definitions(ctx, stream.name(), USER_FIELDS)
            .await?
            .map(definitions_by_key)
            .unwrap_or_default()
    } else {
        BTreeMap::new()
    };
    let mut events = stream.sync(ctx);

    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::Record {
                stream: id,
                record,
            } => {
                if id == stream.name() {
                    counter += 1;
                }
                let transformer = transformers.entry(id).or_insert_with(|| {
                    catalog
                        .get(id)
                        .map_or_else(|| Transformer::passthrough(id), CatalogEntry::transformer)
                });
                let mut record = transformer.transform(record)?;
                if id == "users" {
                    merge_custom_fields(&mut record, USER_FIELDS, &user_fields);
                }
                sink.write(&Message::record(id, record))?;
            }
            StreamEvent::Checkpoint => {
                write_state(ctx, sink).await?;
                *checkpoint = ctx.state.snapshot().await;
            }
        }
    }

    write_state(ctx, sink).await?;
    Ok(counter)
}

/// SCHEMA messages for a stream and its children that are selected
fn write_schemas(catalog: &Catalog, stream: &Stream, sink: &mut dyn MessageSink) -> Result<()> {
    let family = std::iter::once(stream).chain(stream.children().iter());
    for member in family.filter(|s| s.is_selected()) {
        if let Some(entry) = catalog.get(member.name()) {
            sink.write(&Message::schema(
                member.name(),
                entry.schema.clone(),
                entry.key_properties(),
                member.descriptor().replication_key,
            ))?;
        }
    }
    Ok(())
}

async fn write_state(ctx: &SyncContext, sink: &mut dyn MessageSink) -> Result<()> {
    sink.write(&Message::state(ctx.state.to_value().await?))
}
