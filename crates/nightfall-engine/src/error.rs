//! Error types for the engine.
//!
//! Only joining and structural misuse produce errors. Invalid game input
//! (bad targets, wrong phase, dead actors) is never an error: it is
//! answered with a direct message to the player and otherwise ignored.

use nightfall_protocol::{Phase, PlayerId};

/// Errors returned by [`Room`](crate::Room) lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The game already started; new players cannot join.
    #[error("game already in progress")]
    GameInProgress,

    /// The room reached `max_players`.
    #[error("room is full ({0} players)")]
    RoomFull(usize),

    /// Another player already uses this display name.
    #[error("name {0:?} is already taken")]
    NameTaken(String),

    /// The display name is empty or too long.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The connection already has a player in this room.
    #[error("player {0} already joined")]
    AlreadyJoined(PlayerId),

    /// No player with this id is in the room.
    #[error("player {0} is not in this room")]
    UnknownPlayer(PlayerId),

    /// Not enough players to start.
    #[error("need {need} players to start, have {have}")]
    NotEnoughPlayers { have: usize, need: usize },
}

/// Returned by [`GameStateManager`](crate::GameStateManager) when asked
/// for a transition the phase machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },

    #[error("phase machine is not locked")]
    NotLocked,
}
