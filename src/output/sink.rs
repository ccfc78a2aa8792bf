//! Message sinks

use super::message::Message;
use crate::error::Result;
use serde_json::Value;
use std::io::{self, Write};

/// Destination for Singer messages
pub trait MessageSink: Send {
    /// Write one message
    fn write(&mut self, message: &Message) -> Result<()>;

    /// Flush buffered output
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One JSON document per line
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl JsonLinesSink<io::Stdout> {
    /// Sink writing to stdout
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> MessageSink for JsonLinesSink<W> {
    fn write(&mut self, message: &Message) -> Result<()> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every message in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Vec<Message>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message, in write order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Records written for `stream`
    pub fn records(&self, stream: &str) -> Vec<&Value> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Record {
                    stream: s, record, ..
                } if s == stream => Some(record),
                _ => None,
            })
            .collect()
    }

    /// State values, in write order
    pub fn states(&self) -> Vec<&Value> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::State { value } => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Last state written
    pub fn last_state(&self) -> Option<&Value> {
        self.states().pop()
    }
}

impl MessageSink for MemorySink {
    fn write(&mut self, message: &Message) -> Result<()> {
        self.messages.push(message.clone());
        Ok(())
    }
}
