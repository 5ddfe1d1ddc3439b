//! Reconnection policy.
//!
//! The default is a flat delay with a ceiling: after `max_attempts` failed
//! retries the session gives up until the next `connect()`. Exponential
//! backoff is opt-in and keeps the same ceiling.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay between retries.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(5_000);

/// Default retry ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Backoff selector as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Flat,
    Exponential,
}

/// Delay growth between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay for every retry.
    Flat,
    /// Double the delay per retry, capped at `max`.
    Exponential { max: Duration },
}

/// When and how often a lost session retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Base delay before a retry.
    pub interval: Duration,
    /// Retries allowed before giving up.
    pub max_attempts: u32,
    /// Delay growth.
    pub backoff: Backoff,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::flat(DEFAULT_RETRY_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl ReconnectPolicy {
    /// Flat delay policy.
    #[must_use]
    pub fn flat(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff: Backoff::Flat,
        }
    }

    /// Exponential backoff policy.
    #[must_use]
    pub fn exponential(interval: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff: Backoff::Exponential { max },
        }
    }

    /// Whether another retry is allowed after `attempts` retries.
    #[must_use]
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Flat => self.interval,
            Backoff::Exponential { max } => {
                let factor = 1u32
                    .checked_shl(attempt.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                self.interval.saturating_mul(factor).min(max)
            }
        }
    }
}
