//! The Nightfall rules engine.
//!
//! Everything here is synchronous and transport-agnostic. A [`Room`] is one
//! game: it takes client input ([`ClientMessage`](nightfall_protocol::ClientMessage))
//! and timer expiries, and pushes output through a [`Dispatcher`].
//!
//! ```text
//! Room
//!  ├── players: Vec<Player>        (seat = index, role per player)
//!  ├── factions: Vec<Faction>      (shared chat + nightly kill vote)
//!  ├── GameStateManager            (phase, day counter, PhaseTimer)
//!  ├── WinConditionManager         (ordered win predicates)
//!  ├── EventBus                    (in-process pub/sub)
//!  └── Arc<dyn Dispatcher>         (outbound messages)
//! ```
//!
//! Night actions are recorded as intent during the Night and resolved in
//! one pass when the Night ends; see [`night`].

mod config;
mod dispatch;
mod error;
mod event_bus;
mod faction;
pub mod night;
mod player;
mod role;
mod room;
mod state;
mod win;

pub use config::{GameConfig, RoomState};
pub use dispatch::{Dispatcher, MemoryDispatcher};
pub use error::{EngineError, PhaseError};
pub use event_bus::{EventBus, EventKind, GameEvent, SubscriptionId};
pub use faction::Faction;
pub use night::{NightBoard, NightReport, NightResolution, NightSlot};
pub use player::Player;
pub use role::{
    Ability, ActionRejected, Role, RoleGroup, RoleKind, TargetView, VisitChange, VisitPermissions,
};
pub use room::{MAX_CHAT_LEN, MAX_NAME_LEN, Room};
pub use state::{GameStateManager, PhaseDurations, PhaseSnapshot};
pub use win::{
    JesterVotedOut, MafiaWins, MaxDays, NobodyLeft, SerialKillerWins, TownWins, WinCondition,
    WinConditionManager, WinContext, Winner, WinningSide,
};
