//! Realtime wire protocol for Tether.
//!
//! This crate defines what travels over the realtime link:
//!
//! - **Types** ([`UserId`], [`ClientEvent`], [`EventFrame`],
//!   [`DisconnectReason`]): identities, outgoing events, incoming frames,
//!   and the vocabulary for why a link closed.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding.
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Realtime (connection manager)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{ClientEvent, DisconnectReason, EventFrame, UserId};
