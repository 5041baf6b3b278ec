//! Reconnect policy for replayed connection intents.
//!
//! The streaming deliverer retries a dropped stream with a fixed backoff and
//! a hard attempt cap. Unlike API retry schemes there is no exponential
//! growth and no jitter: the contract is a flat delay, the same subscription
//! intent each attempt, and a hard stop after the cap.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum connect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default fixed backoff between attempts, in milliseconds.
pub const DEFAULT_BACKOFF_MS: u64 = 3000;

/// Fixed-backoff reconnect parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Maximum connect attempts, counting the first (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Flat delay between attempts in ms (default: 3000).
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_MS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff as a [`Duration`].
    #[must_use]
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Whether another attempt is allowed after `failures` consecutive
    /// failures.
    #[must_use]
    pub fn allows_attempt(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
