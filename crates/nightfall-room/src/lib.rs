//! Room runtime for Nightfall.
//!
//! Each room runs as an isolated Tokio task (actor model) that exclusively
//! owns one [`nightfall_engine::Room`]. Every mutation of a game happens on
//! that task, one command at a time, and the phase timer is awaited in the
//! same `select!` as the command channel.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates rooms, tracks which player is where, routes input
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`ChannelDispatcher`]: delivers engine output to per-player channels
//! - [`RoomConfig`]: actor settings (channel size, timer jitter)

mod config;
mod dispatch;
mod error;
mod manager;
mod room;

pub use config::RoomConfig;
pub use dispatch::{ChannelDispatcher, PlayerSender};
pub use error::RoomError;
pub use manager::RoomManager;
pub use nightfall_engine::RoomState;
pub use room::{RoomHandle, RoomInfo};
