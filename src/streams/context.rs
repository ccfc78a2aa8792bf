//! Sync context and stream events

use crate::config::TapConfig;
use crate::error::Result;
use crate::fanout::FanOutConfig;
use crate::http::HttpClient;
use crate::state::StateManager;
use futures::stream::BoxStream;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Everything a stream needs while it syncs
///
/// Cloning is cheap; clones share the HTTP connection pool and the state.
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// Transport for every request
    pub client: HttpClient,
    /// Validated tap config
    pub config: Arc<TapConfig>,
    /// Live state, mutated only by the stream being synced
    pub state: StateManager,
    /// Limits for the tickets fan-out
    pub fan_out: FanOutConfig,
}

impl SyncContext {
    /// Build a context from a config and state
    pub fn new(client: HttpClient, config: TapConfig, state: StateManager) -> Self {
        let fan_out = FanOutConfig::from_config(&config);
        Self {
            client,
            config: Arc::new(config),
            state,
            fan_out,
        }
    }

    /// Replace the fan-out limits
    #[must_use]
    pub fn with_fan_out(mut self, fan_out: FanOutConfig) -> Self {
        self.fan_out = fan_out;
        self
    }
}

/// One item produced by a stream sync
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A record for `stream`, which may be a sub-stream of the one syncing
    Record {
        stream: &'static str,
        record: Value,
    },
    /// The state is consistent and should be emitted now
    Checkpoint,
}

impl StreamEvent {
    /// Create a record event
    pub fn record(stream: &'static str, record: Value) -> Self {
        Self::Record { stream, record }
    }

    /// Stream name for record events
    pub fn stream(&self) -> Option<&'static str> {
        match self {
            Self::Record { stream, .. } => Some(stream),
            Self::Checkpoint => None,
        }
    }

    /// Check if this is a checkpoint
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, Self::Checkpoint)
    }
}

/// Lazy sequence of events; dropping it stops all further requests
pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// Record counts for the sub-streams of one parent sync
///
/// Owned by the parent's sync and reported once it finishes.
#[derive(Debug, Clone, Default)]
pub struct SubStreamCounts {
    counts: BTreeMap<&'static str, usize>,
}

impl SubStreamCounts {
    /// Start counting the given streams from zero
    pub fn for_streams(streams: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            counts: streams.into_iter().map(|s| (s, 0)).collect(),
        }
    }

    /// Count one record
    pub fn increment(&mut self, stream: &'static str) {
        *self.counts.entry(stream).or_insert(0) += 1;
    }

    /// Count several records
    pub fn add(&mut self, stream: &'static str, count: usize) {
        if count > 0 {
            *self.counts.entry(stream).or_insert(0) += count;
        }
    }

    /// Records counted for `stream`
    pub fn get(&self, stream: &str) -> usize {
        self.counts.get(stream).copied().unwrap_or(0)
    }

    /// Log every count as a metric and reset them
    pub fn emit(&mut self) {
        for (stream, count) in &mut self.counts {
            info!(target: "metrics", stream = *stream, count = *count, "record_count");
            *count = 0;
        }
    }
}
