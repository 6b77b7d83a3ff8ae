//! `NightfallServer` builder and accept loop.
//!
//! This is the entry point for running a Nightfall server. It ties
//! together all the layers: transport → protocol → room → engine.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use nightfall_engine::GameConfig;
use nightfall_protocol::JsonCodec;
use nightfall_room::{RoomConfig, RoomManager};
use nightfall_transport::{Transport, TransportConfig, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{NightfallError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) codec: JsonCodec,
    pub(crate) join_timeout: Duration,
}

/// Builder for configuring and starting a Nightfall server.
///
/// # Example
///
/// ```rust,no_run
/// use nightfall::prelude::*;
///
/// # async fn run() -> Result<(), NightfallError> {
/// let server = NightfallServer::builder()
///     .bind("0.0.0.0:8080")
///     .game_config(GameConfig::default())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NightfallServerBuilder {
    config: ServerConfig,
}

impl NightfallServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_owned();
        self
    }

    /// Sets the rules every new room runs with.
    pub fn game_config(mut self, game: GameConfig) -> Self {
        self.config.game = game;
        self
    }

    /// Sets the room actor settings.
    pub fn room_config(mut self, room: RoomConfig) -> Self {
        self.config.room = room;
        self
    }

    /// Sets the socket limits (frame size, handshake timeout).
    pub fn transport_config(mut self, transport: TransportConfig) -> Self {
        self.config.transport = transport;
        self
    }

    /// Sets how long a connection may take to send `join-room`.
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.join_timeout = timeout;
        self
    }

    /// Binds the listener.
    pub async fn build(self) -> Result<NightfallServer, NightfallError> {
        let config = self.config;
        let transport = WebSocketTransport::bind_with(&config.bind_addr, config.transport).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomManager::new(config.game, config.room)),
            codec: JsonCodec,
            join_timeout: config.join_timeout,
        });

        Ok(NightfallServer { transport, state })
    }
}

impl Default for NightfallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ServerConfig> for NightfallServerBuilder {
    fn from(config: ServerConfig) -> Self {
        Self { config }
    }
}

/// A bound Nightfall server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct NightfallServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl NightfallServer {
    /// Creates a new builder.
    pub fn builder() -> NightfallServerBuilder {
        NightfallServerBuilder::new()
    }

    /// Binds a server from a complete config.
    pub async fn from_config(config: ServerConfig) -> Result<Self, NightfallError> {
        NightfallServerBuilder::from(config).build().await
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), NightfallError> {
        match self.local_addr() {
            Ok(addr) => tracing::info!(%addr, "Nightfall server running"),
            Err(_) => tracing::info!("Nightfall server running"),
        }

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) if e.is_listener_error() => {
                    tracing::error!(error = %e, "accept failed");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "client failed to connect");
                }
            }
        }
    }
}
