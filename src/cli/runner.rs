//! CLI runner - executes commands

use crate::catalog::{self, Catalog};
use crate::cli::commands::{Cli, Commands};
use crate::config::TapConfig;
use crate::engine::SyncEngine;
use crate::error::{Error, Result, ResultExt};
use crate::http::HttpClient;
use crate::output::JsonLinesSink;
use crate::state::StateManager;
use crate::streams::{registry, Stream, SyncContext};
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command, writing to stdout
    ///
    /// Returns the process exit code.
    pub async fn run(&self) -> Result<i32> {
        self.run_to(io::stdout()).await
    }

    /// Run the CLI command, writing to `out`
    pub async fn run_to<W: Write + Send>(&self, out: W) -> Result<i32> {
        match &self.cli.command {
            Commands::Check => self.check(out).await,
            Commands::Discover => self.discover(out).await,
            Commands::Sync { catalog } => self.sync(catalog, out).await,
        }
    }

    /// Load configuration
    fn load_config(&self) -> Result<TapConfig> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Config file not specified (use -C flag)"))?;
        TapConfig::from_file(path)
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
                .with_context(|| format!("Failed to load state from {}", path.display()))
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Build the sync context from config and state
    fn context(&self) -> Result<SyncContext> {
        let config = self.load_config()?;
        let state = self.load_state()?;
        let client = HttpClient::with_config(config.http_config())?;
        Ok(SyncContext::new(client, config, state))
    }

    /// Probe every top-level stream, one line per stream
    ///
    /// The exit code is the number of streams that could not be read.
    async fn check<W: Write>(&self, mut out: W) -> Result<i32> {
        let ctx = self.context()?;
        let mut failed = 0;

        for descriptor in registry::top_level() {
            let stream = Stream::new(descriptor, false);
            match stream.check_access(&ctx).await {
                Ok(()) => writeln!(out, "{}: OK", descriptor.name)?,
                Err(e) => {
                    failed += 1;
                    writeln!(out, "{}: FAILED ({e})", descriptor.name)?;
                }
            }
        }

        out.flush()?;
        info!(failed, "Check complete");
        Ok(failed)
    }

    /// Print the discovered catalog
    async fn discover<W: Write>(&self, mut out: W) -> Result<i32> {
        let ctx = self.context()?;
        let catalog = catalog::discover(&ctx).await?;
        writeln!(out, "{}", catalog.to_json_pretty()?)?;
        out.flush()?;
        Ok(0)
    }

    /// Sync the selected streams
    async fn sync<W: Write + Send>(&self, catalog: &Path, out: W) -> Result<i32> {
        let ctx = self.context()?;
        let catalog = Catalog::from_file(catalog)
            .with_context(|| format!("Failed to load catalog from {}", catalog.display()))?;

        let mut engine = SyncEngine::new(ctx, JsonLinesSink::new(out));
        let report = engine.run(&catalog).await?;
        Ok(report.exit_code())
    }
}
