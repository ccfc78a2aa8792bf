//! State management module
//!
//! Handles bookmark tracking for resumable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - the `{"bookmarks": .., "currently_syncing": ..}` document
//! - `StateManager` - shared, lock-protected access to the live state
//! - timestamp helpers for reading and writing bookmark values
//!
//! State is read from an input document and handed back to the caller as
//! STATE messages; nothing here writes files.

mod bookmark;
mod manager;
mod types;

pub use bookmark::{format_timestamp, parse_timestamp};
pub use manager::StateManager;
pub use types::State;
