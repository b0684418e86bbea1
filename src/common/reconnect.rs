//! Fixed-interval reconnection backoff.

use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder};

/// Default delay between connection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay between a failure and the next attempt.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ReconnectConfig {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Build an unlimited iterator of reconnection delays.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .without_max_times()
            .build()
    }
}
