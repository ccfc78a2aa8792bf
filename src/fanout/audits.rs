//! Per-ticket audits and comments
//!
//! One ticket's audits are read page by page; every `Comment` event inside
//! an audit also becomes a comment record.

use crate::error::{Error, ErrorClass, Result};
use crate::streams::{Stream, SyncContext};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tracing::warn;

/// Audits and derived comments of one ticket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketActivity {
    pub audits: Vec<Value>,
    pub comments: Vec<Value>,
}

impl TicketActivity {
    /// Check if nothing was produced
    pub fn is_empty(&self) -> bool {
        self.audits.is_empty() && self.comments.is_empty()
    }
}

/// What a wave should keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitySelection {
    pub audits: bool,
    pub comments: bool,
}

impl ActivitySelection {
    /// Check if a wave has anything to fetch
    pub fn any(self) -> bool {
        self.audits || self.comments
    }
}

/// Fetch every audit page of one ticket
///
/// A 404 for the ticket becomes `Error::SubResourceNotFound`.
pub async fn fetch_ticket_activity(
    ctx: &SyncContext,
    audits: &Stream,
    ticket_id: &Value,
    selection: ActivitySelection,
) -> Result<TicketActivity> {
    let parent = json!({ "id": ticket_id });
    let mut records = audits.records(ctx, Some(&parent), ctx.config.start_date);
    let mut activity = TicketActivity::default();

    while let Some(audit) = records.next().await {
        let audit = audit.map_err(|e| {
            if e.is_not_found() {
                Error::SubResourceNotFound {
                    parent: format!("ticket {ticket_id}"),
                    message: e.to_string(),
                }
            } else {
                e
            }
        })?;

        if selection.comments {
            activity
                .comments
                .extend(comments_from_audit(&audit, ticket_id));
        }
        if selection.audits {
            activity.audits.push(audit);
        }
    }

    Ok(activity)
}

/// Comment records carried by one audit
///
/// Each `Comment` event gets the audit's `created_at`, `via` and
/// `metadata` plus the ticket id.
pub fn comments_from_audit(audit: &Value, ticket_id: &Value) -> Vec<Value> {
    let Some(events) = audit.get("events").and_then(Value::as_array) else {
        return Vec::new();
    };

    events
        .iter()
        .filter(|event| event.get("type").and_then(Value::as_str) == Some("Comment"))
        .filter_map(|event| {
            let mut comment = event.as_object()?.clone();
            for field in ["created_at", "via", "metadata"] {
                comment.insert(
                    field.to_string(),
                    audit.get(field).cloned().unwrap_or(Value::Null),
                );
            }
            comment.insert("ticket_id".to_string(), ticket_id.clone());
            Some(Value::Object(comment))
        })
        .collect()
}

/// Fetch one wave of tickets with at most `ticket_ids.len()` requests in flight
///
/// Results keep the order of `ticket_ids`. A ticket whose audits are gone
/// contributes an empty activity; any other failure fails the wave. The wave
/// uses its own HTTP session and makes no calls when nothing is selected.
pub async fn fetch_wave(
    ctx: &SyncContext,
    audits: &Stream,
    ticket_ids: Vec<Value>,
    selection: ActivitySelection,
) -> Result<Vec<TicketActivity>> {
    if !selection.any() || ticket_ids.is_empty() {
        return Ok(Vec::new());
    }

    let wave_ctx = SyncContext {
        client: ctx.client.new_session()?,
        ..ctx.clone()
    };
    let in_flight = ticket_ids.len();

    let results: Vec<Result<TicketActivity>> = stream::iter(ticket_ids)
        .map(|ticket_id| {
            let wave_ctx = &wave_ctx;
            async move {
                match fetch_ticket_activity(wave_ctx, audits, &ticket_id, selection).await {
                    Err(e) if e.class() == ErrorClass::SubResourceNotFound => {
                        warn!(ticket_id = %ticket_id, "Audits not found, skipping ticket: {e}");
                        Ok(TicketActivity::default())
                    }
                    other => other,
                }
            }
        })
        .buffered(in_flight)
        .collect()
        .await;

    results.into_iter().collect()
}
