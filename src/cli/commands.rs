//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Helpdesk extraction tap
#[derive(Parser, Debug)]
#[command(name = "solidafy-helpdesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// State file (JSON)
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON
    #[arg(long, global = true)]
    pub state_json: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe every stream's endpoint with the configured credentials
    Check,

    /// Print the catalog of available streams
    Discover,

    /// Sync the streams selected in a catalog
    Sync {
        /// Catalog file (JSON)
        #[arg(long)]
        catalog: PathBuf,
    },
}
