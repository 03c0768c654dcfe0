//! Outbound throttle plugin.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::plugins::Plugin;

/// Enforces a minimum spacing between outgoing lines.
///
/// A line passes the outgoing filter only when more than `interval` has
/// elapsed since the last accepted line; each accepted line restamps the
/// clock. Rejected lines are dropped outright, since a pipeline veto
/// drops the whole send.
///
/// Uses [`tokio::time::Instant`] so paused-time tests can drive it.
pub struct ThrottlePlugin {
    interval: Duration,
    last_sent: Mutex<Option<Instant>>,
}

impl ThrottlePlugin {
    /// Throttle with the given minimum spacing.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: Mutex::new(None),
        }
    }
}

impl Default for ThrottlePlugin {
    /// The 5-second spacing Twitch allows ordinary users.
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Plugin for ThrottlePlugin {
    fn name(&self) -> &str {
        "throttle_out"
    }

    fn filter_outgoing(&self, _line: &str) -> bool {
        let now = Instant::now();
        let mut last_sent = self.last_sent.lock().unwrap();
        let pass = last_sent.map_or(true, |last| now - last > self.interval);
        if pass {
            *last_sent = Some(now);
        }
        pass
    }
}
