//! Core protocol types for Tether's realtime channel.
//!
//! This module defines every type that travels over the realtime link,
//! plus the vocabulary the client uses to describe why a link went away.
//!
//! Frames are small JSON objects with an event name and an optional
//! payload, which is what the backend's event server speaks:
//!
//! ```text
//! {"event":"authenticate","data":"u1"}
//! {"event":"join-user-room","data":"u1"}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The backend's identifier for a user.
///
/// This is a "newtype wrapper" around `String`. The backend hands out
/// opaque string IDs (database object IDs), so the client never parses
/// them; it only compares them and echoes them back.
///
/// It doubles as the idempotency key for realtime initialization: asking
/// to initialize for the same `UserId` twice is a no-op.
///
/// `#[serde(transparent)]` serializes `UserId("u1")` as just `"u1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// ClientEvent: what the client emits
// ---------------------------------------------------------------------------

/// Events the client emits on the realtime channel.
///
/// `#[serde(tag = "event", content = "data")]` is serde's "adjacently
/// tagged" representation: the variant name goes in `event`, the payload
/// in `data`. `rename_all = "kebab-case"` turns `JoinUserRoom` into
/// `"join-user-room"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Binds this link to a user on the server.
    Authenticate(UserId),

    /// Subscribes this link to the user's private room, where the server
    /// pushes per-user notifications.
    JoinUserRoom(UserId),
}

impl ClientEvent {
    /// The pair of setup events sent once a link is bound to `user_id`.
    ///
    /// Order matters: the server only honours a room join from an
    /// authenticated link.
    pub fn setup_for(user_id: &UserId) -> [ClientEvent; 2] {
        [
            ClientEvent::Authenticate(user_id.clone()),
            ClientEvent::JoinUserRoom(user_id.clone()),
        ]
    }

    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => "authenticate",
            Self::JoinUserRoom(_) => "join-user-room",
        }
    }
}

// ---------------------------------------------------------------------------
// EventFrame: what the server pushes
// ---------------------------------------------------------------------------

/// An event pushed by the server.
///
/// The client core doesn't interpret these; it forwards them to whoever
/// subscribed. `data` is `null` when the server sent no payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    /// The event name, e.g. `"notification"`.
    pub event: String,

    /// The event payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// DisconnectReason
// ---------------------------------------------------------------------------

/// Why a realtime link went away.
///
/// The wire strings match the reasons the backend's event server reports,
/// so logs read the same on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The server closed the link on purpose. Transports don't retry
    /// these on their own, so the connection manager makes one explicit
    /// reconnect attempt.
    ServerDisconnect,

    /// The client closed the link (teardown or logout).
    ClientDisconnect,

    /// The underlying connection ended without a close handshake.
    TransportClose,

    /// Reading from the link failed.
    TransportError,
}

impl DisconnectReason {
    /// The wire string for this reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerDisconnect => "io server disconnect",
            Self::ClientDisconnect => "io client disconnect",
            Self::TransportClose => "transport close",
            Self::TransportError => "transport error",
        }
    }

    /// Parses a wire string back into a reason.
    pub fn from_wire(reason: &str) -> Option<Self> {
        match reason {
            "io server disconnect" => Some(Self::ServerDisconnect),
            "io client disconnect" => Some(Self::ClientDisconnect),
            "transport close" => Some(Self::TransportClose),
            "transport error" => Some(Self::TransportError),
            _ => None,
        }
    }

    /// `true` if the standard reconnection policy applies.
    ///
    /// Client-initiated closes are never retried, and server-initiated
    /// closes get their own single retry instead of the policy.
    pub fn uses_reconnect_policy(self) -> bool {
        matches!(self, Self::TransportClose | Self::TransportError)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
