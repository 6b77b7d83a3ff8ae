//! Wire protocol for Nightfall.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Identifiers** ([`PlayerId`], [`RoomId`], [`Seat`]) shared by every layer.
//! - **Message kinds** ([`ClientMessage`], [`ServerMessage`]): every
//!   message is a `name` tag plus an optional `data` payload.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer doesn't know about connections, rooms, or rules.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Room actor → Engine
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Phase, PlayerId, PlayerSummary, Recipient, RoomId, Seat,
    ServerMessage,
};
