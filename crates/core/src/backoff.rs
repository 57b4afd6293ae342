//! Reconnect delay policy.
//!
//! Delays grow geometrically from `initial_delay` by `multiplier` up to
//! `max_delay`, with optional random jitter:
//!
//! ```text
//! attempt:   1      2      3      4     5 ...
//! delay:   250ms  500ms   1s     2s    4s, 5s, 5s, ...
//! ```

use std::time::Duration;

/// How the fetch loop paces reconnect attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay (before jitter).
    pub max_delay: Duration,
    /// Growth factor between consecutive delays. Values below 1.0 are
    /// treated as 1.0.
    pub multiplier: f64,
    /// Fraction of each delay, in `[0, 1]`, randomly added or removed.
    pub jitter: f64,
    /// Consecutive failed attempts after which the loop gives up.
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.1,
            max_retries: None,
        }
    }
}

/// Backoff state for one run of the fetch loop.
#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Failed attempts since the last [`reset`](Self::reset).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget previous failures (called after a frame is decoded).
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Record a failure and return how long to wait before retrying, or
    /// `None` if the retry budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_retries {
            if self.attempts >= max {
                return None;
            }
        }

        let exponent = self.attempts.min(63) as i32;
        self.attempts += 1;

        let base = self.policy.initial_delay.as_secs_f64()
            * self.policy.multiplier.max(1.0).powi(exponent);
        let capped = base.min(self.policy.max_delay.as_secs_f64());

        let jitter = self.policy.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            let unit = rand::random::<f64>() * 2.0 - 1.0;
            1.0 + unit * jitter
        } else {
            1.0
        };

        Some(Duration::from_secs_f64((capped * factor).max(0.0)))
    }
}
