//! Authentication state and session lifecycle for Tether.
//!
//! This crate decides whether the client is signed in and keeps the
//! realtime link in step with that answer:
//!
//! 1. **Credential**: the stored bearer token ([`Credential`],
//!    [`CredentialStore`])
//! 2. **Backend**: the `is-auth`, `profile` and `logout` endpoints
//!    ([`AuthApi`], [`HttpAuthApi`])
//! 3. **Session**: what the application observes ([`Session`]), owned by
//!    the [`SessionManager`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Application (above)   ← reads Session, calls check/fetch/logout
//!     ↕
//! Session (this crate)  ← credential + backend → Session, binds the link
//!     ↕
//! Realtime (below)      ← one link, bound once per user
//! ```
//!
//! The application only ever sees `{authenticated, user, loading}`. HTTP
//! and transport errors are turned into state changes and log lines at
//! this boundary.

#![allow(async_fn_in_trait)]

mod api;
mod credential;
mod error;
mod manager;
mod profile;
mod state;

pub use api::{AuthApi, AuthResponse, HttpAuthApi};
pub use credential::{
    CREDENTIAL_KEY, Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use error::{ApiError, SessionError};
pub use manager::SessionManager;
pub use profile::Profile;
pub use state::Session;
