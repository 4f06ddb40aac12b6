//! # Tether
//!
//! Client-side session and realtime connection synchronization.
//!
//! Tether decides whether the client is signed in, keeps exactly one
//! realtime link to the backend bound to that user, and tears both down
//! cleanly on logout. The layers underneath are usable on their own:
//!
//! | Crate | Role |
//! |-------|------|
//! | `tether-transport` | `Connector`/`Link`, WebSocket and in-memory |
//! | `tether-protocol` | `UserId`, realtime events, codec |
//! | `tether-realtime` | `ConnectionManager`: one link, idempotent per-user setup, backoff |
//! | `tether-session` | `SessionManager`: credential, auth API, `Session` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), TetherError> {
//!     tether::telemetry::init();
//!
//!     let client = TetherClient::from_config(ClientConfig::from_env()?)?;
//!     match client.start().await {
//!         Startup::SignedIn(profile) => println!("signed in as {}", profile.id),
//!         Startup::SignedOut => println!("signed out"),
//!         Startup::Unverified => println!("backend unreachable"),
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
pub mod telemetry;

pub use client::{Startup, TetherClient};
pub use config::{BuildMode, ClientConfig, ConfigError, DEFAULT_DEV_BACKEND_URL, HttpConfig};
pub use error::TetherError;

pub use tether_protocol as protocol;
pub use tether_realtime as realtime;
pub use tether_session as session;
pub use tether_transport as transport;

/// The types most applications need.
pub mod prelude {
    pub use crate::{ClientConfig, Startup, TetherClient, TetherError};
    pub use tether_protocol::UserId;
    pub use tether_realtime::{ConnectionManager, LinkStatus, RealtimeConfig};
    pub use tether_session::{Credential, Profile, Session, SessionManager};
}
