//! Realtime connection management for Tether.
//!
//! This crate keeps exactly one realtime link per process and binds it to
//! the signed-in user. It sits between the wire protocol and the session
//! layer:
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Realtime (this crate) → Session
//! ```
//!
//! The main type is [`ConnectionManager`]. It is generic over a
//! [`Connector`](tether_transport::Connector), so tests drive it with the
//! in-memory transport and production uses WebSockets.
//!
//! # Guarantees
//!
//! - At most one link is open or opening at any time.
//! - `authenticate` and `join-user-room` are sent once per user per link,
//!   however many times initialization is requested.
//! - Transport drops are retried at most `reconnect_attempts` times with
//!   capped exponential [`Backoff`]. A server-initiated close gets one
//!   immediate retry instead.
//! - A link restored by reconnection is re-bound to the same user.
//!
//! # Example
//!
//! ```rust,no_run
//! use tether_realtime::{ConnectionManager, RealtimeConfig};
//! use tether_transport::WebSocketConnector;
//!
//! # async fn run() -> Result<(), tether_realtime::RealtimeError> {
//! let manager = ConnectionManager::new(
//!     WebSocketConnector::default(),
//!     RealtimeConfig::with_endpoint("ws://localhost:5000/ws"),
//! );
//!
//! manager.initialize_for_user(&"64f0c2".into()).await?;
//! // ... later, on logout:
//! manager.teardown().await;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod config;
mod error;
mod event;
mod manager;

pub use backoff::Backoff;
pub use config::RealtimeConfig;
pub use error::RealtimeError;
pub use event::{ConnectionEvent, ConnectionObserver, LoggingObserver};
pub use manager::{
    ConnectionHandle, ConnectionManager, ConnectionManagerBuilder, Initialized,
    LinkStatus,
};
