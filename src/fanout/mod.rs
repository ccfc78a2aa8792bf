//! Parent-child fan-out
//!
//! Tickets drive three dependent resources: audits and comments fetched
//! per ticket, and metrics side-loaded on the ticket itself.
//!
//! # Overview
//!
//! - Ticket ids are batched into waves of `concurrency_limit`
//! - Each wave opens one HTTP session and keeps at most one request per
//!   ticket in flight (`buffered`), then is fully awaited
//! - A checkpoint follows every wave
//! - `QuotaWindow` keeps the audits endpoint under its per-minute quota

mod audits;
mod governor;
mod tickets;

pub use audits::{
    comments_from_audit, fetch_ticket_activity, fetch_wave, ActivitySelection, TicketActivity,
};
pub use governor::QuotaWindow;
pub use tickets::{sync_tickets, SIDE_CONVERSATIONS, TICKET_AUDITS, TICKET_COMMENTS, TICKET_METRICS};

use crate::config::{TapConfig, DEFAULT_AUDITS_REQUESTS_PER_MINUTE, DEFAULT_CONCURRENCY_LIMIT};

/// Limits for the tickets fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutConfig {
    /// Tickets per wave, also the in-flight request bound
    pub concurrency_limit: usize,
    /// Audits requests allowed per minute
    pub requests_per_minute: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            requests_per_minute: DEFAULT_AUDITS_REQUESTS_PER_MINUTE,
        }
    }
}

impl FanOutConfig {
    /// Create fan-out limits
    pub fn new(concurrency_limit: usize, requests_per_minute: usize) -> Self {
        Self {
            concurrency_limit,
            requests_per_minute,
        }
    }

    /// Limits configured for the tap
    pub fn from_config(config: &TapConfig) -> Self {
        Self::new(config.concurrency_limit, config.audits_requests_per_minute)
    }
}

#[cfg(test)]
mod tests;
