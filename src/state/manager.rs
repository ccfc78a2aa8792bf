//! State manager implementation
//!
//! Shares one live `State` between the sync driver and the stream being
//! synced. Bookmarks only ever move forward through this type.

use super::bookmark::{format_timestamp, parse_timestamp};
use super::types::State;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// State manager for loading and updating state
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct StateManager {
    state: Arc<RwLock<State>>,
}

impl StateManager {
    /// Wrap an existing state
    pub fn new(state: State) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Create an empty state manager
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load state from a file; a missing file means empty state
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::in_memory());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
        Self::from_json(&contents)
    }

    /// Load state from an inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::in_memory());
        }
        let state: State = serde_json::from_str(json)
            .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))?;
        Ok(Self::new(state))
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Current state as a JSON value
    pub async fn to_value(&self) -> Result<Value> {
        let state = self.state.read().await;
        serde_json::to_value(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Raw bookmark value
    pub async fn raw_bookmark(&self, stream: &str, key: &str) -> Option<Value> {
        self.state.read().await.get_bookmark(stream, key).cloned()
    }

    /// Effective bookmark: the stored value, never earlier than `floor`
    ///
    /// An unparsable stored value is treated as absent.
    pub async fn bookmark(&self, stream: &str, key: &str, floor: DateTime<Utc>) -> DateTime<Utc> {
        self.raw_bookmark(stream, key)
            .await
            .as_ref()
            .and_then(parse_timestamp)
            .map_or(floor, |stored| stored.max(floor))
    }

    /// Move a bookmark forward
    ///
    /// Writes only when `candidate` is strictly later than the effective
    /// bookmark, so repeated or older values are no-ops. Returns whether the
    /// state changed.
    pub async fn advance_bookmark(
        &self,
        stream: &str,
        key: &str,
        candidate: DateTime<Utc>,
        floor: DateTime<Utc>,
    ) -> bool {
        let mut state = self.state.write().await;
        let current = state
            .get_bookmark(stream, key)
            .and_then(parse_timestamp)
            .map_or(floor, |stored| stored.max(floor));

        if candidate > current {
            debug!(stream, key, bookmark = %format_timestamp(candidate), "Advancing bookmark");
            state.set_bookmark(stream, key, Value::String(format_timestamp(candidate)));
            true
        } else {
            false
        }
    }

    /// Write `value` as the bookmark when the stream has none yet
    pub async fn seed_bookmark(&self, stream: &str, key: &str, value: DateTime<Utc>) {
        let mut state = self.state.write().await;
        if state.get_bookmark(stream, key).is_none() {
            state.set_bookmark(stream, key, Value::String(format_timestamp(value)));
        }
    }

    /// Put the bookmarks of `streams` back to what `checkpoint` holds
    ///
    /// Streams without bookmarks in `checkpoint` lose theirs.
    pub async fn restore_bookmarks(&self, streams: &[&str], checkpoint: &State) {
        let mut state = self.state.write().await;
        for stream in streams {
            match checkpoint.bookmarks.get(*stream) {
                Some(bookmarks) => {
                    state
                        .bookmarks
                        .insert((*stream).to_string(), bookmarks.clone());
                }
                None => {
                    state.bookmarks.remove(*stream);
                }
            }
        }
    }

    /// Set or clear the stream in progress
    pub async fn set_currently_syncing(&self, stream: Option<&str>) {
        self.state.write().await.set_currently_syncing(stream);
    }

    /// Stream in progress, if any
    pub async fn currently_syncing(&self) -> Option<String> {
        self.state.read().await.currently_syncing.clone()
    }
}
