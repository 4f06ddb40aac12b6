//! Unified error type for Tether.

use tether_protocol::ProtocolError;
use tether_realtime::RealtimeError;
use tether_session::{ApiError, SessionError};
use tether_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tether` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// The configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built or a request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An authentication check or credential operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A realtime connection operation failed.
    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
