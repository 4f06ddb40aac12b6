//! Error types for the protocol layer.
//!
//! Each crate in Tether defines its own error enum. When you see a
//! `ProtocolError`, the problem is in turning frames into bytes or back,
//! not in the link itself.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a frame without an `event` field,
    /// or a payload of the wrong shape.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
