//! CLI module
//!
//! Command-line interface for running the tap.
//!
//! # Commands
//!
//! - `check` - Probe every stream with the configured credentials
//! - `discover` - Print the catalog
//! - `sync` - Sync the streams selected in a catalog

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;

#[cfg(test)]
mod tests;
