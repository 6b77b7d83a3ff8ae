//! Unified error type for the Nightfall server.

use nightfall_protocol::ProtocolError;
use nightfall_room::RoomError;
use nightfall_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum NightfallError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unexpected message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, full, name taken, unavailable).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Invalid server configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
