//! Tickets controller
//!
//! Reads the ticket export and, per ticket, the side-loaded metrics, the
//! side conversations and (in bounded waves) the audits and comments.

use super::audits::{fetch_wave, ActivitySelection};
use super::governor::QuotaWindow;
use crate::error::Error;
use crate::state::parse_timestamp;
use crate::streams::{
    export_replay_boundary, registry, EventStream, ReplicationFilter, Stream, StreamEvent,
    SubStreamCounts, SyncContext,
};
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info};

/// Audits sub-stream
pub const TICKET_AUDITS: &str = "ticket_audits";
/// Comments derived from audits
pub const TICKET_COMMENTS: &str = "ticket_comments";
/// Side-loaded `metric_set`s
pub const TICKET_METRICS: &str = "ticket_metrics";
/// Paginated per-ticket sub-stream
pub const SIDE_CONVERSATIONS: &str = "side_conversations";

/// Sync tickets and their sub-streams
///
/// The tickets bookmark is the cursor for the whole family, so it advances
/// to each ticket's `generated_timestamp` whether or not `tickets` itself is
/// selected. A `Checkpoint` follows every audits wave.
pub fn sync_tickets(stream: Stream, ctx: SyncContext) -> EventStream {
    let events = async_stream::stream! {
        let descriptor = stream.descriptor();
        let Some(key) = descriptor.bookmark_key() else {
            yield Err(Error::config(format!("stream '{}' has no replication key", descriptor.name)));
            return;
        };

        let selection = ActivitySelection {
            audits: stream.is_child_selected(TICKET_AUDITS),
            comments: stream.is_child_selected(TICKET_COMMENTS),
        };
        let metrics_selected = stream.is_child_selected(TICKET_METRICS);
        let audits_source = stream
            .child(TICKET_AUDITS)
            .cloned()
            .or_else(|| registry::get(TICKET_AUDITS).map(|d| Stream::new(d, false)));

        let mut side_conversations = None;
        if let Some(child) = stream.child(SIDE_CONVERSATIONS).filter(|c| c.is_selected()) {
            let floor = child.get_bookmark(&ctx).await;
            let filter = ReplicationFilter::from_bookmark(child.descriptor(), floor, &ctx);
            side_conversations = Some((child.clone(), floor, filter));
        }

        let mut counts = SubStreamCounts::for_streams(
            stream
                .children()
                .iter()
                .filter(|c| c.is_selected())
                .map(Stream::name),
        );

        if selection.audits {
            info!("Syncing ticket_audits per ticket...");
        }
        if side_conversations.is_some() {
            info!("Syncing side_conversations per ticket...");
        }

        let limit = ctx.fan_out.concurrency_limit.max(1);
        let mut window = QuotaWindow::new(ctx.fan_out.requests_per_minute, ctx.client.sleeper());
        let mut batch: Vec<Value> = Vec::with_capacity(limit);

        let bookmark = stream.get_bookmark(&ctx).await;
        let emitted = export_replay_boundary(&ctx, bookmark);
        let mut tickets = stream.records(&ctx, None, bookmark);

        while let Some(ticket) = tickets.next().await {
            let mut ticket = match ticket {
                Ok(ticket) => ticket,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let Some(generated) = ticket.get(key).and_then(parse_timestamp) else {
                yield Err(Error::MissingReplicationKey {
                    stream: descriptor.name.to_string(),
                    key: key.to_string(),
                });
                return;
            };
            if emitted == Some(generated) {
                debug!(ticket_id = %ticket["id"], "Ticket already synced at the bookmark, skipping");
                continue;
            }
            stream.update_bookmark(&ctx, generated).await;

            // Duplicate of custom_fields
            if let Value::Object(fields) = &mut ticket {
                fields.remove("fields");
            }

            let deleted = ticket.get("status").and_then(Value::as_str) == Some("deleted");
            if stream.is_selected() {
                yield Ok(StreamEvent::record(descriptor.name, ticket.clone()));
            }
            if deleted {
                debug!(ticket_id = %ticket["id"], "Skipping sub-resources of deleted ticket");
                continue;
            }

            if metrics_selected {
                if let Some(metric_set) = ticket.get("metric_set").filter(|m| !m.is_null()) {
                    counts.increment(TICKET_METRICS);
                    yield Ok(StreamEvent::record(TICKET_METRICS, metric_set.clone()));
                }
            }

            if let Some((child, floor, filter)) = side_conversations.as_mut() {
                let mut records = child.records(&ctx, Some(&ticket), *floor);
                while let Some(record) = records.next().await {
                    let record = match record {
                        Ok(record) => record,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };
                    match filter.admit(&record) {
                        Ok(true) => {
                            counts.increment(child.name());
                            yield Ok(StreamEvent::record(child.name(), record));
                        }
                        Ok(false) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            if let Some(id) = ticket.get("id").filter(|id| !id.is_null()) {
                batch.push(id.clone());
            }

            if batch.len() >= limit {
                let ticket_ids = std::mem::take(&mut batch);
                let wave_size = ticket_ids.len();
                let activities = match audits_source.as_ref() {
                    Some(audits) => fetch_wave(&ctx, audits, ticket_ids, selection).await,
                    None => Ok(Vec::new()),
                };
                let activities = match activities {
                    Ok(activities) => activities,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                for activity in activities {
                    counts.add(TICKET_AUDITS, activity.audits.len());
                    counts.add(TICKET_COMMENTS, activity.comments.len());
                    for audit in activity.audits {
                        yield Ok(StreamEvent::record(TICKET_AUDITS, audit));
                    }
                    for comment in activity.comments {
                        yield Ok(StreamEvent::record(TICKET_COMMENTS, comment));
                    }
                }
                yield Ok(StreamEvent::Checkpoint);
                window.record(wave_size).await;
            }
        }

        if !batch.is_empty() {
            let activities = match audits_source.as_ref() {
                Some(audits) => fetch_wave(&ctx, audits, std::mem::take(&mut batch), selection).await,
                None => Ok(Vec::new()),
            };
            let activities = match activities {
                Ok(activities) => activities,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            for activity in activities {
                counts.add(TICKET_AUDITS, activity.audits.len());
                counts.add(TICKET_COMMENTS, activity.comments.len());
                for audit in activity.audits {
                    yield Ok(StreamEvent::record(TICKET_AUDITS, audit));
                }
                for comment in activity.comments {
                    yield Ok(StreamEvent::record(TICKET_COMMENTS, comment));
                }
            }
            yield Ok(StreamEvent::Checkpoint);
        }

        if let Some((child, _, filter)) = side_conversations.as_ref() {
            if let Some(max) = filter.max_seen() {
                child.update_bookmark(&ctx, max).await;
            }
        }
        counts.emit();
    };

    Box::pin(events)
}
