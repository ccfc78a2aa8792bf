//! Streams module
//!
//! Every helpdesk resource is a `StreamDescriptor` in the registry; a
//! `Stream` is one descriptor plus the catalog's selection and its
//! sub-streams.
//!
//! # Overview
//!
//! - `registry` - the static list of descriptors, in catalog order
//! - `Stream::sync` - lazy event stream using the descriptor's strategy
//! - `Stream::check_access` - one-record probe used by discovery
//! - `SyncContext` - client, config, state and fan-out limits
//!
//! # Example
//!
//! ```rust,ignore
//! use solidafy_helpdesk::streams::{Stream, SyncContext};
//!
//! let stream = Stream::from_registry("triggers", |name| name != "trigger_revisions")?;
//! let mut events = stream.sync(&ctx);
//! while let Some(event) = events.next().await {
//!     // handle StreamEvent::Record / StreamEvent::Checkpoint
//! }
//! ```

mod context;
mod descriptor;
pub mod registry;
mod stream;
mod strategies;

pub use context::{EventStream, StreamEvent, SubStreamCounts, SyncContext};
pub use descriptor::{
    AccessCheck, CustomSync, MissingKeyPolicy, ParamsHook, RecordHook, StreamDescriptor,
    SyncStrategy,
};
pub use stream::Stream;

pub(crate) use strategies::{export_replay_boundary, ReplicationFilter};
