//! Fixed-delay scheduler for the reconciliation loop
//!
//! The first tick fires immediately. Every later tick sleeps the full
//! interval, measured from when the previous cycle finished rather than
//! when it started, so a slow cycle pushes the whole schedule back instead
//! of causing back-to-back runs.

use std::time::Duration;
use tracing::info;

/// Produces the instants at which a cycle should start
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    started: bool,
}

impl Ticker {
    /// Create a ticker with the given delay between cycles
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            started: false,
        }
    }

    /// Wait until the next cycle should start
    pub async fn tick(&mut self) {
        if !self.started {
            self.started = true;
            return;
        }

        info!("Sleeping for {} seconds...", self.interval.as_secs());
        tokio::time::sleep(self.interval).await;
    }
}
