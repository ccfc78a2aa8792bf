// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Solidafy Helpdesk
//!
//! An extraction tap for a helpdesk REST API, speaking the Singer protocol.
//!
//! ## Features
//!
//! - **Discovery**: Probes every endpoint and emits a catalog with schemas and metadata
//! - **Incremental Sync**: Bookmarks per stream, persisted as Singer STATE
//! - **Pagination**: Cursor, offset, link and incremental export styles
//! - **Parent/Child Streams**: Children are fetched per parent record
//! - **Ticket Fan-Out**: Audits, metrics and comments fetched concurrently under a quota
//! - **Resilient HTTP**: Retries with backoff, `Retry-After` and rate limiting
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidafy_helpdesk::config::TapConfig;
//! use solidafy_helpdesk::engine::SyncEngine;
//! use solidafy_helpdesk::http::HttpClient;
//! use solidafy_helpdesk::output::JsonLinesSink;
//! use solidafy_helpdesk::state::StateManager;
//! use solidafy_helpdesk::streams::SyncContext;
//! use solidafy_helpdesk::{catalog, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = TapConfig::from_file("config.json")?;
//!     let client = HttpClient::with_config(config.http_config())?;
//!     let ctx = SyncContext::new(client, config, StateManager::in_memory());
//!
//!     let mut catalog = catalog::discover(&ctx).await?;
//!     catalog.select(&["users", "tickets"]);
//!
//!     let mut engine = SyncEngine::new(ctx, JsonLinesSink::stdout());
//!     let report = engine.run(&catalog).await?;
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Tap CLI                               │
//! │  check → probes    discover → Catalog    sync → Singer messages │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   Auth   │   HTTP    │   Paginate    │  Streams  │   Output    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Bearer   │ GET       │ Cursor        │ Registry  │ SCHEMA      │
//! │ API Token│ Retry     │ Offset        │ Children  │ RECORD      │
//! │          │ Rate Limit│ Link          │ Fan-Out   │ STATE       │
//! │          │ Backoff   │ Export        │ Bookmarks │             │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)] // TODO: Document error variant fields

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the tap
pub mod error;

/// Common types and type aliases
pub mod types;

/// Authentication implementations
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Pagination strategies
pub mod pagination;

/// State management and checkpointing
pub mod state;

/// JSON schemas and record transformation
pub mod schema;

/// Template interpolation
pub mod template;

/// Tap configuration
pub mod config;

/// Stream registry and per-stream sync
pub mod streams;

/// Concurrent ticket fan-out
pub mod fanout;

/// Catalog, metadata and discovery
pub mod catalog;

/// Singer message output
pub mod output;

/// Main execution engine
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogEntry};
pub use config::TapConfig;
pub use engine::{SyncEngine, SyncReport};
pub use output::Message;
pub use state::StateManager;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
