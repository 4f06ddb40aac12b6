//! Realtime connection configuration.

use std::time::Duration;

use tracing::warn;

/// Configuration for the [`ConnectionManager`](crate::ConnectionManager).
///
/// The reconnection defaults mirror what the backend's event client uses:
/// start at one second, double each attempt, never wait more than five
/// seconds, give up after five attempts.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Endpoint URL for the realtime link, e.g. `ws://localhost:5000/ws`.
    pub endpoint: String,

    /// Whether transport-level drops are retried automatically.
    pub reconnection: bool,

    /// Maximum automatic reconnect attempts before giving up.
    pub reconnect_attempts: u32,

    /// Delay before the first reconnect attempt.
    pub reconnect_delay: Duration,

    /// Upper bound on any single reconnect delay.
    pub reconnect_delay_max: Duration,

    /// Jitter applied to each delay, as a fraction (0.0–1.0) of the delay.
    pub randomization_factor: f64,

    /// Re-send `authenticate` and `join-user-room` on a link restored by
    /// automatic reconnection. When `false` the new link stays anonymous
    /// until the next explicit initialization.
    pub reauthenticate_on_reconnect: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:5000/ws".to_string(),
            reconnection: true,
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(1_000),
            reconnect_delay_max: Duration::from_millis(5_000),
            randomization_factor: 0.5,
            reauthenticate_on_reconnect: true,
        }
    }
}

impl RealtimeConfig {
    /// Creates a config for `endpoint` with default reconnection settings.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically when a connection manager is built. Rules:
    /// - `randomization_factor` clamped to `0.0..=1.0`.
    /// - `reconnect_delay_max` raised to at least `reconnect_delay`.
    pub fn validated(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            warn!(
                factor = self.randomization_factor,
                "randomization_factor outside 0.0..=1.0, clamping"
            );
            self.randomization_factor = if self.randomization_factor.is_nan() {
                0.0
            } else {
                self.randomization_factor.clamp(0.0, 1.0)
            };
        }
        if self.reconnect_delay_max < self.reconnect_delay {
            warn!(
                delay = ?self.reconnect_delay,
                max = ?self.reconnect_delay_max,
                "reconnect_delay_max below reconnect_delay, raising"
            );
            self.reconnect_delay_max = self.reconnect_delay;
        }
        self
    }
}
