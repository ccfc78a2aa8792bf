//! Common types used throughout solidafy-helpdesk
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// Ordered query parameters for a single request
pub type QueryParams = Vec<(String, String)>;

// ============================================================================
// Replication Method
// ============================================================================

/// How a stream is replicated between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMethod {
    /// Bookmark-driven delta sync
    Incremental,
    /// Re-fetch everything every time
    #[default]
    FullTable,
}

impl ReplicationMethod {
    /// Name as written into catalog metadata
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incremental => "INCREMENTAL",
            Self::FullTable => "FULL_TABLE",
        }
    }
}

impl std::fmt::Display for ReplicationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Pagination Type
// ============================================================================

/// Pagination convention used by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationType {
    /// `page[size]` / `meta.after_cursor` / `meta.has_more`
    Cursor,
    /// `per_page` then server-provided `next_page` URLs
    Offset,
    /// `next_page` URLs that also stop on `end_of_stream`
    TimeExport,
    /// `start_time` then `cursor` until `end_of_stream`
    CursorExport,
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replication_method_serde() {
        let method: ReplicationMethod = serde_json::from_str("\"INCREMENTAL\"").unwrap();
        assert_eq!(method, ReplicationMethod::Incremental);

        let json = serde_json::to_string(&ReplicationMethod::FullTable).unwrap();
        assert_eq!(json, "\"FULL_TABLE\"");
        assert_eq!(ReplicationMethod::FullTable.to_string(), "FULL_TABLE");
    }

    #[test]
    fn test_replication_method_default() {
        assert_eq!(ReplicationMethod::default(), ReplicationMethod::FullTable);
    }

    #[test]
    fn test_pagination_type_serde() {
        let json = serde_json::to_string(&PaginationType::CursorExport).unwrap();
        assert_eq!(json, "\"cursor_export\"");
    }

    #[test]
    fn test_option_string_none_if_empty() {
        assert_eq!(
            Some("test".to_string()).none_if_empty(),
            Some("test".to_string())
        );
        assert_eq!(Some(String::new()).none_if_empty(), None);
        assert_eq!(None::<String>.none_if_empty(), None);
        assert_eq!("".to_string().none_if_empty(), None);
    }
}
