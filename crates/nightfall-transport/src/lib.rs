//! Sockets for Nightfall.
//!
//! Rooms never hold a socket. They push messages into per-player channels,
//! and the server drains those channels onto whatever [`Connection`] the
//! player arrived on. This crate owns that last hop: a [`Transport`] that
//! accepts clients and a [`Connection`] that moves whole JSON frames.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod config;
mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use config::TransportConfig;
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Identifies one accepted client for as long as the process runs.
///
/// Ids are never reused, so the server can use them as player ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<ConnectionId> for u64 {
    fn from(id: ConnectionId) -> Self {
        id.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something clients connect to.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client and completes its handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// One client.
///
/// `send` and `recv` take `&self` and must be usable concurrently: the
/// server parks a reader in `recv` while a writer task pushes room output
/// through `send`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame. `Ok(None)` once the client closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts the closing handshake.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    /// The client's socket address.
    fn peer_addr(&self) -> SocketAddr;
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn test_connection_id_converts_to_raw_value() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
        assert_eq!(u64::from(id), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_ids_order_by_accept_order() {
        let ids: BTreeSet<_> = [3, 1, 2].into_iter().map(ConnectionId::new).collect();
        let raw: Vec<u64> = ids.into_iter().map(u64::from).collect();
        assert_eq!(raw, [1, 2, 3]);
    }
}
