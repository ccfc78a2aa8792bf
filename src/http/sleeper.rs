//! Pluggable sleeping
//!
//! Retry backoff, `Retry-After` waits and the audits quota window all
//! sleep through this trait so their timing can be observed in tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Something that can suspend the current task for a duration
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that records every requested duration and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All durations requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|sleeps| sleeps.clone())
            .unwrap_or_default()
    }

    /// Number of sleeps requested so far
    pub fn count(&self) -> usize {
        self.sleeps.lock().map(|sleeps| sleeps.len()).unwrap_or(0)
    }

    /// Sum of all requested durations
    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        tokio::task::yield_now().await;
    }
}
