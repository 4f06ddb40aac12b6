//! Lifecycle events and the observers that receive them.
//!
//! The connection manager reports link lifecycle through a fixed set of
//! observers registered when it is built. There is no dynamic
//! subscription: the set is decided once and never changes.

use std::fmt;

use tether_protocol::DisconnectReason;
use tether_transport::LinkId;

/// Something that happened to the realtime link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A link opened.
    Connect {
        /// The new link.
        link: LinkId,
    },

    /// The open link went away.
    Disconnect {
        /// Why it went away.
        reason: DisconnectReason,
    },

    /// Opening a link failed.
    ConnectError {
        /// Human-readable cause, for diagnostics only.
        message: String,
    },

    /// An automatic reconnect attempt is starting.
    ReconnectAttempt {
        /// 1-based attempt number.
        attempt: u32,
    },

    /// Automatic reconnection succeeded.
    Reconnect {
        /// How many attempts it took.
        attempts: u32,
    },

    /// Automatic reconnection gave up. Only an explicit call re-opens the
    /// link from here.
    ReconnectFailed,
}

impl ConnectionEvent {
    /// The conventional event name, e.g. `"connect_error"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::ConnectError { .. } => "connect_error",
            Self::ReconnectAttempt { .. } => "reconnect_attempt",
            Self::Reconnect { .. } => "reconnect",
            Self::ReconnectFailed => "reconnect_failed",
        }
    }
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives every [`ConnectionEvent`].
///
/// Called synchronously from inside the connection manager, sometimes
/// while it holds its internal lock. Implementations must be quick and
/// must not call back into the manager.
///
/// Any `Fn(&ConnectionEvent)` closure is an observer.
pub trait ConnectionObserver: Send + Sync + 'static {
    /// Handles one event.
    fn on_event(&self, event: &ConnectionEvent);
}

impl<F> ConnectionObserver for F
where
    F: Fn(&ConnectionEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &ConnectionEvent) {
        self(event)
    }
}

/// Writes every event to `tracing`. Always installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl ConnectionObserver for LoggingObserver {
    fn on_event(&self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Connect { link } => {
                tracing::info!(%link, "realtime link connected");
            }
            ConnectionEvent::Disconnect { reason } => {
                tracing::info!(%reason, "realtime link disconnected");
            }
            ConnectionEvent::ConnectError { message } => {
                tracing::warn!(error = %message, "realtime connection error");
            }
            ConnectionEvent::ReconnectAttempt { attempt } => {
                tracing::info!(attempt, "attempting to reconnect");
            }
            ConnectionEvent::Reconnect { attempts } => {
                tracing::info!(attempts, "reconnected");
            }
            ConnectionEvent::ReconnectFailed => {
                tracing::error!("reconnection failed after all attempts");
            }
        }
    }
}
