//! Bounded, capped exponential backoff for automatic reconnection.

use std::time::Duration;

use rand::Rng;

use crate::RealtimeConfig;

/// Yields the delay before each automatic reconnect attempt.
///
/// Attempt `n` (1-based) waits `reconnect_delay * 2^(n-1)`, capped at
/// `reconnect_delay_max`, with up to `± randomization_factor` jitter so a
/// fleet of clients dropped by the same server restart doesn't reconnect
/// in lockstep. After `reconnect_attempts` delays, [`next_delay`] returns
/// `None` and the caller gives up.
///
/// [`next_delay`]: Backoff::next_delay
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    randomization_factor: f64,
    max_attempts: u32,
    attempts: u32,
}

impl Backoff {
    /// Creates a fresh backoff from the reconnection settings in `config`.
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            base: config.reconnect_delay,
            max: config.reconnect_delay_max,
            randomization_factor: config.randomization_factor,
            max_attempts: config.reconnect_attempts,
            attempts: 0,
        }
    }

    /// Returns the delay before the next attempt, or `None` once the
    /// attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;

        let multiplier = 1u32.checked_shl(self.attempts - 1).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(multiplier).min(self.max);

        Some(self.jitter(delay).min(self.max))
    }

    /// Number of attempts handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `true` once every attempt has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.randomization_factor <= 0.0 {
            return delay;
        }
        let spread = rand::rng()
            .random_range(-self.randomization_factor..=self.randomization_factor);
        Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + spread).max(0.0))
            .unwrap_or(self.max)
    }
}
