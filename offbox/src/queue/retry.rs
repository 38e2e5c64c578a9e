//! Replay backoff: decides when a failed deferred write is retried.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounded linear backoff between replay attempts of a deferred write.
///
/// After `n` failed attempts an item waits `min(n * step, max)` since its
/// last attempt before a drain pass touches it again. A zero `step` turns
/// backoff off, leaving only the one-attempt-per-pass limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayBackoff {
    /// Delay added per failed attempt (e.g. "30s").
    #[serde(with = "humantime_serde")]
    pub step: Duration,
    /// Upper bound of the delay (e.g. "10m").
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl Default for ReplayBackoff {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(30),
            max: Duration::from_secs(600),
        }
    }
}

impl ReplayBackoff {
    /// No waiting between passes.
    pub fn none() -> Self {
        Self {
            step: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Delay required after `attempts` failed attempts.
    pub fn delay(&self, attempts: u32) -> Duration {
        self.step.saturating_mul(attempts).min(self.max)
    }

    /// Whether an item may be attempted at `now`.
    pub fn is_due(
        &self,
        attempts: u32,
        last_attempt_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(last) = last_attempt_at else {
            return true;
        };
        let delay = chrono::Duration::from_std(self.delay(attempts)).unwrap_or(chrono::Duration::MAX);
        last.checked_add_signed(delay).is_some_and(|due| due <= now)
    }
}
