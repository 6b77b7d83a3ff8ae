//! # Nightfall
//!
//! A server for a real-time, room-based social deduction game. Players
//! join a room, receive secret roles, and alternate between day votes and
//! night actions until one side wins.
//!
//! This crate ties the layers together:
//!
//! ```text
//! WebSocket (nightfall-transport)
//!   → JSON frames (nightfall-protocol)
//!     → room actor (nightfall-room)
//!       → rules engine (nightfall-engine)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nightfall::prelude::*;
//!
//! # async fn run() -> Result<(), NightfallError> {
//! let config = ServerConfig::from_env()?;
//! let server = NightfallServer::from_config(config).await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::NightfallError;
pub use server::{NightfallServer, NightfallServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{ConfigError, NightfallError, NightfallServer, NightfallServerBuilder, ServerConfig};
    pub use nightfall_engine::{GameConfig, RoleKind};
    pub use nightfall_protocol::{ClientMessage, Phase, PlayerId, RoomId, Seat, ServerMessage};
    pub use nightfall_room::RoomConfig;
    pub use nightfall_transport::TransportConfig;
}
