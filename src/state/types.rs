//! State document types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Bookmarks for one stream, keyed by replication key
pub type StreamBookmarks = BTreeMap<String, Value>;

/// Complete sync state
///
/// Unknown top-level keys survive a load/save round trip untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmarks
    #[serde(default)]
    pub bookmarks: BTreeMap<String, StreamBookmarks>,

    /// Stream in progress when the state was written
    #[serde(default)]
    pub currently_syncing: Option<String>,

    /// Top-level keys this tap does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl State {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bookmark value for a stream
    pub fn get_bookmark(&self, stream: &str, key: &str) -> Option<&Value> {
        self.bookmarks.get(stream)?.get(key)
    }

    /// Set a bookmark value unconditionally
    pub fn set_bookmark(&mut self, stream: &str, key: &str, value: Value) {
        self.bookmarks
            .entry(stream.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Set or clear the stream in progress
    pub fn set_currently_syncing(&mut self, stream: Option<&str>) {
        self.currently_syncing = stream.map(ToString::to_string);
    }
}
