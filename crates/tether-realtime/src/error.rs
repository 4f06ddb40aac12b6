//! Error types for the realtime layer.

use tether_protocol::{ProtocolError, UserId};
use tether_transport::TransportError;

/// Errors returned by [`ConnectionManager`](crate::ConnectionManager)
/// operations.
///
/// These never describe the user's authentication state. A realtime
/// failure is isolated to the link; the session layer only logs it.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// Opening or using the link failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An outgoing event could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The link is already bound to a different user. Call
    /// [`teardown`](crate::ConnectionManager::teardown) first.
    #[error("link is initialized for {active}, refusing to initialize for {requested}")]
    UserMismatch {
        /// The user the link is currently bound to.
        active: UserId,
        /// The user the caller asked for.
        requested: UserId,
    },

    /// There is no open link to emit on.
    #[error("realtime link is not connected")]
    NotConnected,
}
