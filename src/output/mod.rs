//! Output module
//!
//! Singer messages and the sinks they are written to.
//!
//! # Overview
//!
//! - `Message` - SCHEMA, RECORD and STATE messages, serialized with a
//!   `type` tag
//! - `JsonLinesSink` - one message per line, normally on stdout
//! - `MemorySink` - collects messages for inspection

mod message;
mod sink;

pub use message::Message;
pub use sink::{JsonLinesSink, MemorySink, MessageSink};
