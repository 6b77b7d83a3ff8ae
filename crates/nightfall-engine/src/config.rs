//! Game configuration and the room lifecycle state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::role::RoleKind;

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Tunable rules for one game.
///
/// Every field has a default, so a config file (or the server's environment
/// layer) only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// The game starts as soon as this many players have joined.
    pub min_players: usize,

    /// Joins beyond this are rejected.
    pub max_players: usize,

    /// Roles handed out at game start, in priority order. With fewer
    /// players than roles the list is truncated; with more it is padded
    /// with Villagers. The chosen roles are shuffled before assignment.
    pub role_list: Vec<RoleKind>,

    pub day_duration: Duration,
    pub night_duration: Duration,
    pub between_duration: Duration,

    /// The game ends in a stalemate when this day is reached.
    pub end_day: u32,

    /// Defence granted by a protector to a target with zero defence.
    pub protect_defence: u32,

    /// Damage dealt by one attack.
    pub attack_damage: u32,

    /// Probability that a non-Town target shrugs off a roleblock.
    pub roleblock_resist_chance: f64,

    /// Probability that one investigation sample is the true role.
    pub investigation_accuracy: f64,

    /// Samples drawn per investigation.
    pub investigation_rolls: u32,

    /// Fixed seed for the room's random source. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_players: 15,
            role_list: vec![
                RoleKind::Mafioso,
                RoleKind::Doctor,
                RoleKind::Investigator,
                RoleKind::Villager,
                RoleKind::Escort,
                RoleKind::Bodyguard,
                RoleKind::Consort,
                RoleKind::Jester,
                RoleKind::SerialKiller,
                RoleKind::Survivor,
            ],
            day_duration: Duration::from_secs(90),
            night_duration: Duration::from_secs(45),
            between_duration: Duration::from_secs(10),
            end_day: 10,
            protect_defence: 1,
            attack_damage: 1,
            roleblock_resist_chance: 0.5,
            investigation_accuracy: 0.5,
            investigation_rolls: 3,
            seed: None,
        }
    }
}

impl GameConfig {
    /// Clamp values into their valid ranges.
    ///
    /// Probabilities are clamped to `0.0..=1.0` (NaN becomes the default),
    /// `max_players` is raised to at least `min_players`, and at least one
    /// investigation sample is always drawn.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        self.min_players = self.min_players.max(1);
        self.max_players = self.max_players.max(self.min_players);
        self.roleblock_resist_chance =
            clamp_probability(self.roleblock_resist_chance, defaults.roleblock_resist_chance);
        self.investigation_accuracy =
            clamp_probability(self.investigation_accuracy, defaults.investigation_accuracy);
        self.investigation_rolls = self.investigation_rolls.max(1);
        self
    }

    /// The roles for a game of `players` players, unshuffled.
    pub fn roles_for(&self, players: usize) -> Vec<RoleKind> {
        let mut roles: Vec<RoleKind> = self.role_list.iter().copied().take(players).collect();
        roles.resize(players, RoleKind::Villager);
        roles
    }
}

fn clamp_probability(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// Transitions are strictly ordered:
///
/// ```text
/// WaitingForPlayers → Starting → InProgress → Finished → Destroying
/// ```
///
/// - **WaitingForPlayers**: accepting joins until `min_players` is reached.
/// - **Starting**: roles are being dealt and factions formed.
/// - **InProgress**: phases are running; game input is accepted.
/// - **Finished**: a winner was declared. Input is ignored.
/// - **Destroying**: the last player left; the actor is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    WaitingForPlayers,
    Starting,
    InProgress,
    Finished,
    Destroying,
}

impl RoomState {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::WaitingForPlayers)
    }

    /// Returns `true` while a game is being set up or played.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::InProgress)
    }

    /// The next state in the lifecycle, or `None` at the end.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::WaitingForPlayers => Some(Self::Starting),
            Self::Starting => Some(Self::InProgress),
            Self::InProgress => Some(Self::Finished),
            Self::Finished => Some(Self::Destroying),
            Self::Destroying => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    ///
    /// Any state may jump to `Destroying` (everyone left).
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (target == Self::Destroying && self != Self::Destroying)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitingForPlayers => write!(f, "WaitingForPlayers"),
            Self::Starting => write!(f, "Starting"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Finished => write!(f, "Finished"),
            Self::Destroying => write!(f, "Destroying"),
        }
    }
}
