//! Audits quota window
//!
//! The audits endpoint has its own per-minute quota. The tickets fan-out
//! counts the requests of every full wave and, once the ceiling is reached,
//! waits out the rest of the minute before starting the next one.

use crate::http::Sleeper;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Length of one quota window
const WINDOW: Duration = Duration::from_secs(60);

/// Extra wait added after the window closes
const BUFFER: Duration = Duration::from_secs(2);

/// Per-minute request counter for the audits endpoint
#[derive(Debug)]
pub struct QuotaWindow {
    limit: usize,
    counter: usize,
    started: Instant,
    sleeper: Arc<dyn Sleeper>,
}

impl QuotaWindow {
    /// Start a window allowing `limit` requests per minute
    pub fn new(limit: usize, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            limit: limit.max(1),
            counter: 0,
            started: Instant::now(),
            sleeper,
        }
    }

    /// Requests counted in the current window
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Count `requests` and sleep if the window is exhausted
    ///
    /// The wait is `max(0, 60 - elapsed + 2)` seconds, after which the
    /// counter and the window start are reset. Returns the wait, if any.
    pub async fn record(&mut self, requests: usize) -> Option<Duration> {
        self.counter += requests;
        if self.counter < self.limit {
            return None;
        }

        let wait = (WINDOW + BUFFER).saturating_sub(self.started.elapsed());
        info!(
            requests = self.counter,
            limit = self.limit,
            "Audits quota reached, sleeping {:?}",
            wait
        );
        self.sleeper.sleep(wait).await;

        self.counter = 0;
        self.started = Instant::now();
        Some(wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RecordingSleeper;

    #[tokio::test]
    async fn test_window_sleeps_once_limit_reached() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let mut window = QuotaWindow::new(4, sleeper.clone());

        assert_eq!(window.record(2).await, None);
        assert_eq!(window.counter(), 2);

        let wait = window.record(2).await.unwrap();
        assert!(wait > Duration::from_secs(60));
        assert!(wait <= Duration::from_secs(62));
        assert_eq!(window.counter(), 0);
        assert_eq!(sleeper.sleeps(), vec![wait]);
    }

    #[tokio::test]
    async fn test_window_resets_after_sleep() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let mut window = QuotaWindow::new(3, sleeper.clone());

        assert!(window.record(3).await.is_some());
        assert_eq!(window.record(2).await, None);
        assert!(window.record(1).await.is_some());
        assert_eq!(sleeper.count(), 2);
    }

    #[tokio::test]
    async fn test_zero_limit_treated_as_one() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let mut window = QuotaWindow::new(0, sleeper.clone());
        assert!(window.record(1).await.is_some());
    }
}
