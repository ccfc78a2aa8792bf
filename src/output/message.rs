//! Singer messages

use crate::state::format_timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message written to stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Schema of a stream, written before its first record
    Schema {
        /// Stream name
        stream: String,
        /// JSON schema for the stream's records
        schema: Value,
        /// Primary key fields
        key_properties: Vec<String>,
        /// Replication key, for incremental streams
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bookmark_properties: Option<Vec<String>>,
    },
    /// One record
    Record {
        /// Stream name
        stream: String,
        /// The record
        record: Value,
        /// Extraction time, RFC 3339
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_extracted: Option<String>,
    },
    /// Complete tap state
    State {
        /// State document
        value: Value,
    },
}

impl Message {
    /// Create a schema message
    pub fn schema(
        stream: impl Into<String>,
        schema: Value,
        key_properties: Vec<String>,
        replication_key: Option<&str>,
    ) -> Self {
        Self::Schema {
            stream: stream.into(),
            schema,
            key_properties,
            bookmark_properties: replication_key.map(|k| vec![k.to_string()]),
        }
    }

    /// Create a record message stamped with the current time
    pub fn record(stream: impl Into<String>, record: Value) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
            time_extracted: Some(format_timestamp(Utc::now())),
        }
    }

    /// Create a state message
    pub fn state(value: Value) -> Self {
        Self::State { value }
    }

    /// Stream the message belongs to; `None` for state
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Schema { stream, .. } | Self::Record { stream, .. } => Some(stream),
            Self::State { .. } => None,
        }
    }

    /// Check if this is a schema message
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }
}
