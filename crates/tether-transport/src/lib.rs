//! Client transport abstraction layer for Tether.
//!
//! Provides the [`Connector`] and [`Link`] traits that abstract over the
//! realtime channel a client opens to its backend. The connection manager
//! above this crate only ever sees these two traits, so the same
//! reconnection logic drives a real WebSocket or an in-process loopback.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//!
//! The in-memory transport ([`MemoryConnector`]) is always available.

#![allow(async_fn_in_trait)]

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnector, MemoryPeer, MemoryServer};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WebSocketLink};

use std::fmt;

/// Opaque identifier for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

impl LinkId {
    /// Creates a new `LinkId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// Opens new outgoing links to a remote endpoint.
pub trait Connector: Send + Sync + 'static {
    /// The link type produced by this connector.
    type Link: Link;

    /// Opens a link to `url`.
    ///
    /// Resolves once the link is usable (the equivalent of the `connect`
    /// event); any failure maps to a `connect_error`.
    fn connect(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Self::Link, TransportError>> + Send;
}

/// A single open link that can send and receive bytes.
pub trait Link: Send + Sync + 'static {
    /// Sends data to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the remote side closed the link cleanly.
    fn recv(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the link from this side.
    fn close(&self) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this link.
    fn id(&self) -> LinkId;
}
