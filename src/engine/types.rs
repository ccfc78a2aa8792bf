//! Engine types
//!
//! Outcome of a sync run.

use crate::error::Error;
use std::collections::BTreeMap;

/// A stream that failed during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    /// Stream name
    pub stream: String,
    /// HTTP status of the failure, if it came from the API
    pub status: Option<u16>,
    /// Error message
    pub message: String,
}

impl StreamFailure {
    /// Describe a stream's failure
    pub fn new(stream: impl Into<String>, error: &Error) -> Self {
        Self {
            stream: stream.into(),
            status: error.status(),
            message: error.to_string(),
        }
    }
}

/// Statistics from a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records emitted per completed stream, counting the primary stream only
    pub records: BTreeMap<String, usize>,
    /// Streams that failed, in run order
    pub failures: Vec<StreamFailure>,
    /// Number of failed streams
    pub failed_streams: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed stream
    pub fn add_stream(&mut self, stream: impl Into<String>, records: usize) {
        self.records.insert(stream.into(), records);
    }

    /// Record a failed stream
    pub fn add_failure(&mut self, failure: StreamFailure) {
        self.failures.push(failure);
        self.failed_streams += 1;
    }

    /// Number of streams that completed
    pub fn streams_synced(&self) -> usize {
        self.records.len()
    }

    /// Total records across completed streams
    pub fn total_records(&self) -> usize {
        self.records.values().sum()
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }

    /// Process exit code: the number of failed streams
    pub fn exit_code(&self) -> i32 {
        i32::try_from(self.failed_streams).unwrap_or(i32::MAX)
    }
}
