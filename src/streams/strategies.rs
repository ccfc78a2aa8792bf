//! Sync strategies
//!
//! The generic algorithms shared by most streams: paginated endpoints
//! filtered client-side by bookmark, and incremental exports bounded by
//! `start_time` on the server. Ticket metric events get their own small
//! variant here; tickets live in `fanout`.

use super::context::{EventStream, StreamEvent, SubStreamCounts, SyncContext};
use super::descriptor::{MissingKeyPolicy, StreamDescriptor};
use super::stream::Stream;
use crate::error::{Error, Result};
use crate::state::parse_timestamp;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info};

// ============================================================================
// Replication filter
// ============================================================================

/// Client-side replication key filter for one stream
///
/// Records at or after the floor pass (`>=`), except records equal to a
/// bookmark an earlier run already emitted. The largest replication value
/// seen among passing records is tracked so the bookmark can be advanced
/// once the scan is complete.
#[derive(Debug, Clone)]
pub(crate) struct ReplicationFilter {
    stream: &'static str,
    key: Option<&'static str>,
    floor: Option<DateTime<Utc>>,
    emitted: Option<DateTime<Utc>>,
    max_seen: Option<DateTime<Utc>>,
    policy: MissingKeyPolicy,
}

impl ReplicationFilter {
    /// Filter records of `descriptor` against `floor`
    ///
    /// Without a floor every keyed record passes and only the maximum is
    /// tracked. FULL_TABLE streams pass everything.
    pub(crate) fn new(descriptor: &StreamDescriptor, floor: Option<DateTime<Utc>>) -> Self {
        Self {
            stream: descriptor.name,
            key: descriptor.bookmark_key(),
            floor,
            emitted: None,
            max_seen: None,
            policy: descriptor.missing_key_policy,
        }
    }

    /// Filter against a stored bookmark
    ///
    /// The floor stays inclusive, but when the bookmark is later than the
    /// start date its own value was emitted by the run that stored it and
    /// is dropped.
    pub(crate) fn from_bookmark(
        descriptor: &StreamDescriptor,
        bookmark: DateTime<Utc>,
        ctx: &SyncContext,
    ) -> Self {
        let mut filter = Self::new(descriptor, Some(bookmark));
        filter.emitted = replay_boundary(ctx, bookmark);
        filter
    }

    /// Drop only records equal to an already emitted bookmark
    pub(crate) fn skipping_emitted(
        descriptor: &StreamDescriptor,
        emitted: Option<DateTime<Utc>>,
    ) -> Self {
        let mut filter = Self::new(descriptor, None);
        filter.emitted = emitted;
        filter
    }

    /// Decide whether `record` is emitted
    pub(crate) fn admit(&mut self, record: &Value) -> Result<bool> {
        let Some(key) = self.key else {
            return Ok(true);
        };

        let Some(value) = record.get(key).filter(|v| !v.is_null()) else {
            return match self.policy {
                MissingKeyPolicy::Fail => Err(Error::MissingReplicationKey {
                    stream: self.stream.to_string(),
                    key: key.to_string(),
                }),
                MissingKeyPolicy::EmitIfKeyed => {
                    let keyed = record.get("id").is_some_and(|id| !id.is_null());
                    if keyed {
                        info!(stream = self.stream, id = %record["id"], "Record has no {key}, syncing it anyway");
                    } else {
                        info!(stream = self.stream, "Record has neither id nor {key}, skipping");
                    }
                    Ok(keyed)
                }
            };
        };

        let value = parse_timestamp(value).ok_or_else(|| {
            Error::decode(format!(
                "Replication key '{key}' of stream '{}' is not a timestamp: {value}",
                self.stream
            ))
        })?;

        if self.floor.is_some_and(|floor| value < floor) || self.emitted == Some(value) {
            return Ok(false);
        }

        self.max_seen = Some(self.max_seen.map_or(value, |max| max.max(value)));
        Ok(true)
    }

    /// Largest replication value among admitted records
    pub(crate) fn max_seen(&self) -> Option<DateTime<Utc>> {
        self.max_seen
    }
}

/// Bookmark value a previous run already emitted, if any
///
/// A bookmark equal to the start date is only a seed.
pub(crate) fn replay_boundary(ctx: &SyncContext, bookmark: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (bookmark > ctx.config.start_date).then_some(bookmark)
}

/// Same as `replay_boundary`, for exports bounded by `start_time`
///
/// A lookback re-reads earlier records on purpose, so nothing is dropped.
pub(crate) fn export_replay_boundary(
    ctx: &SyncContext,
    bookmark: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if ctx.config.lookback_minutes > 0 {
        return None;
    }
    replay_boundary(ctx, bookmark)
}

// ============================================================================
// Paginated and cursor-export streams
// ============================================================================

/// Where a stream's lower bound is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    /// Filter client-side against the bookmark, advance at the end
    ClientSide,
    /// The export `start_time` already bounds the records; advance per record
    ServerSide,
}

/// Paginated endpoint filtered client-side by bookmark
///
/// Pages are not trusted to arrive in replication key order, so the
/// bookmark only moves once every page has been read.
pub(crate) fn sync_paginated(stream: Stream, ctx: SyncContext) -> EventStream {
    sync_with_children(stream, ctx, Bound::ClientSide)
}

/// Incremental export bounded by `start_time`
pub(crate) fn sync_cursor_export(stream: Stream, ctx: SyncContext) -> EventStream {
    sync_with_children(stream, ctx, Bound::ServerSide)
}

fn sync_with_children(stream: Stream, ctx: SyncContext, bound: Bound) -> EventStream {
    let events = async_stream::stream! {
        let descriptor = stream.descriptor();
        let bookmark = stream.get_bookmark(&ctx).await;
        let mut filter = match bound {
            Bound::ClientSide => ReplicationFilter::from_bookmark(descriptor, bookmark, &ctx),
            Bound::ServerSide => ReplicationFilter::skipping_emitted(
                descriptor,
                export_replay_boundary(&ctx, bookmark),
            ),
        };

        // Child floors are fixed for the whole parent scan.
        let mut children = Vec::new();
        for child in stream.children().iter().filter(|c| c.is_selected()) {
            let child_floor = child.get_bookmark(&ctx).await;
            let child_filter = ReplicationFilter::from_bookmark(child.descriptor(), child_floor, &ctx);
            children.push((child.clone(), child_floor, child_filter));
        }
        let mut counts = SubStreamCounts::for_streams(children.iter().map(|(c, _, _)| c.name()));

        debug!(stream = descriptor.name, bookmark = %bookmark, "Starting scan");

        let mut records = stream.records(&ctx, None, bookmark);
        while let Some(record) = records.next().await {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let admitted = match filter.admit(&record) {
                Ok(admitted) => admitted,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            if admitted && stream.is_selected() {
                if bound == Bound::ServerSide {
                    if let Some(max) = filter.max_seen() {
                        stream.update_bookmark(&ctx, max).await;
                    }
                }
                yield Ok(StreamEvent::record(descriptor.name, record.clone()));
            }

            for (child, child_floor, child_filter) in &mut children {
                let mut child_records = child.records(&ctx, Some(&record), *child_floor);
                while let Some(child_record) = child_records.next().await {
                    let child_record = match child_record {
                        Ok(r) => r,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };
                    match child_filter.admit(&child_record) {
                        Ok(true) => {
                            counts.increment(child.name());
                            yield Ok(StreamEvent::record(child.name(), child_record));
                        }
                        Ok(false) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        }

        if stream.is_selected() {
            if let Some(max) = filter.max_seen() {
                stream.update_bookmark(&ctx, max).await;
            }
        }
        for (child, _, child_filter) in &children {
            if let Some(max) = child_filter.max_seen() {
                child.update_bookmark(&ctx, max).await;
            }
        }
        counts.emit();
    };

    Box::pin(events)
}

// ============================================================================
// Ticket metric events
// ============================================================================

/// Time export re-read from one second before the bookmark
///
/// Events at or after that point are emitted; the bookmark only advances
/// on values strictly later than the stored one.
pub(crate) fn sync_ticket_metric_events(stream: Stream, ctx: SyncContext) -> EventStream {
    let events = async_stream::stream! {
        let descriptor = stream.descriptor();
        let Some(key) = descriptor.bookmark_key() else {
            yield Err(Error::config(format!("stream '{}' has no replication key", descriptor.name)));
            return;
        };
        let bookmark = stream.get_bookmark(&ctx).await;
        let start = bookmark - ChronoDuration::seconds(1);

        let mut records = stream.records(&ctx, None, start);
        while let Some(record) = records.next().await {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let Some(time) = record.get(key).and_then(parse_timestamp) else {
                yield Err(Error::MissingReplicationKey {
                    stream: descriptor.name.to_string(),
                    key: key.to_string(),
                });
                return;
            };

            if time > bookmark {
                stream.update_bookmark(&ctx, time).await;
            }
            if time >= start && stream.is_selected() {
                yield Ok(StreamEvent::record(descriptor.name, record));
            }
        }
    };

    Box::pin(events)
}
