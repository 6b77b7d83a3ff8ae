//! Core protocol types for Nightfall's wire format.
//!
//! Every message on the wire is a JSON object with a `name` (the kind tag,
//! kebab-case) and an optional `data` payload whose fields are camelCase:
//!
//! ```text
//! { "name": "cast-vote", "data": { "recipient": 2, "isDay": true } }
//! { "name": "player-visit-updated" }
//! ```
//!
//! Both directions use serde's "adjacently tagged" enum representation,
//! so adding a kind is adding a variant.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A connection-scoped identifier for a player.
///
/// Newtype over `u64` so a `PlayerId` can never be confused with a
/// [`RoomId`] or a [`Seat`]. Serializes as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a room (one game instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// A player's seat: their zero-based position in join order.
///
/// Seats are stable for the whole game and are the universal
/// deterministic tie-break (vote ties, resolution order within a stage).
/// Clients address targets by seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seat(pub usize);

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient: where an outbound message goes
// ---------------------------------------------------------------------------

/// The two delivery targets the dispatch contract supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// One connection.
    Player(PlayerId),
    /// Every current connection in the room.
    Room(RoomId),
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The current stage of a day/night cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Day,
    Night,
    /// Short pause between Day and Night (both directions).
    Between,
    /// Input frozen, e.g. while a night resolves or after the game ended.
    Locked,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Night => write!(f, "night"),
            Self::Between => write!(f, "between"),
            Self::Locked => write!(f, "locked"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Messages a client sends to the server.
///
/// `is_day` is the client's view of the phase when the input was made;
/// the engine rejects input whose flag disagrees with the real phase, so
/// a vote clicked during Day never lands in the following Night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "name",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Join a room under the given display name.
    JoinRoom { username: String },

    /// Leave the room and close the connection.
    Disconnect,

    /// Day chat, or faction chat at night.
    ChatMessage { message: String, is_day: bool },

    /// Day vote, or faction kill vote at night. `None` abstains.
    CastVote { recipient: Option<Seat>, is_day: bool },

    /// Choose the target of the role's own ability. `None` stays home.
    SubmitNightVisit { recipient: Option<Seat>, is_day: bool },

    /// A private day message to one player.
    Whisper {
        recipient: Seat,
        message: String,
        is_day: bool,
    },
}

impl ClientMessage {
    /// Every `name` a client may send.
    pub const KINDS: [&'static str; 6] = [
        "join-room",
        "disconnect",
        "chat-message",
        "cast-vote",
        "submit-night-visit",
        "whisper",
    ];

    /// The wire `name` of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join-room",
            Self::Disconnect => "disconnect",
            Self::ChatMessage { .. } => "chat-message",
            Self::CastVote { .. } => "cast-vote",
            Self::SubmitNightVisit { .. } => "submit-night-visit",
            Self::Whisper { .. } => "whisper",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// One row of a `player-list-snapshot`.
///
/// `is_alive` and `role` are only present once they are public knowledge
/// (after the game started, or after a death reveal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_alive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "name",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Free-form system text for one player or the whole room.
    GenericMessage { message: String },

    NewPlayerJoined { player: String },

    PlayerListSnapshot { players: Vec<PlayerSummary> },

    ChatMessage { message: String },

    WhisperMessage { message: String },

    PhaseUpdate {
        phase: Phase,
        day_number: u32,
        time_left_seconds: u64,
    },

    /// Sent privately to each player at game start.
    RoleAssigned {
        name: String,
        role: String,
        day_visit_self: bool,
        day_visit_others: bool,
        day_visit_faction: bool,
        night_visit_self: bool,
        night_visit_others: bool,
        night_visit_faction: bool,
        night_vote: bool,
    },

    /// A player's role became public (death reveal).
    RoleUpdated { name: String, role: String },

    /// A fellow faction member's role, sent privately within the faction.
    FactionRoleUpdated { name: String, role: String },

    /// The recipient's pending night visit changed.
    PlayerVisitUpdated,

    VotingDisabled,

    MessagesBlocked,

    PlayerRemoved { player: String },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&PlayerId(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&RoomId(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&Seat(3)).unwrap(), "3");
    }

    #[test]
    fn test_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
        assert_eq!(RoomId(3).to_string(), "R-3");
        assert_eq!(Seat(2).to_string(), "#2");
    }

    #[test]
    fn test_seats_order_by_position() {
        let mut seats = vec![Seat(3), Seat(0), Seat(2)];
        seats.sort();
        assert_eq!(seats, vec![Seat(0), Seat(2), Seat(3)]);
    }

    #[test]
    fn test_phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Between).unwrap(), "\"between\"");
        assert_eq!(Phase::Night.to_string(), "night");
    }

    // =====================================================================
    // ClientMessage: one test per JSON shape clients send
    // =====================================================================

    #[test]
    fn test_client_join_room_from_json() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"name":"join-room","data":{"username":"ada"}}"#,
        )
        .unwrap();
        assert_eq!(msg, ClientMessage::JoinRoom { username: "ada".into() });
    }

    #[test]
    fn test_client_disconnect_without_data() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"name":"disconnect"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Disconnect);
    }

    #[test]
    fn test_client_cast_vote_uses_camel_case_fields() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"name":"cast-vote","data":{"recipient":2,"isDay":true}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::CastVote { recipient: Some(Seat(2)), is_day: true }
        );
    }

    #[test]
    fn test_client_null_recipient_is_none() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"name":"submit-night-visit","data":{"recipient":null,"isDay":false}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::SubmitNightVisit { recipient: None, is_day: false }
        );
    }

    #[test]
    fn test_client_whisper_from_json() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"name":"whisper","data":{"recipient":1,"message":"psst","isDay":true}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Whisper {
                recipient: Seat(1),
                message: "psst".into(),
                is_day: true
            }
        );
    }

    #[test]
    fn test_client_missing_required_field_is_error() {
        let result: Result<ClientMessage, _> = serde_json::from_str(
            r#"{"name":"chat-message","data":{"message":"hi"}}"#,
        );
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerMessage: JSON shapes the front-end parses
    // =====================================================================

    #[test]
    fn test_server_phase_update_json_format() {
        let json = serde_json::to_value(ServerMessage::PhaseUpdate {
            phase: Phase::Night,
            day_number: 2,
            time_left_seconds: 60,
        })
        .unwrap();

        assert_eq!(json["name"], "phase-update");
        assert_eq!(json["data"]["phase"], "night");
        assert_eq!(json["data"]["dayNumber"], 2);
        assert_eq!(json["data"]["timeLeftSeconds"], 60);
    }

    #[test]
    fn test_server_unit_kind_has_no_data() {
        let json = serde_json::to_value(ServerMessage::VotingDisabled).unwrap();
        assert_eq!(json["name"], "voting-disabled");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_server_role_assigned_carries_permission_flags() {
        let json = serde_json::to_value(ServerMessage::RoleAssigned {
            name: "ada".into(),
            role: "Doctor".into(),
            day_visit_self: false,
            day_visit_others: false,
            day_visit_faction: false,
            night_visit_self: true,
            night_visit_others: true,
            night_visit_faction: false,
            night_vote: false,
        })
        .unwrap();

        assert_eq!(json["name"], "role-assigned");
        assert_eq!(json["data"]["role"], "Doctor");
        assert_eq!(json["data"]["nightVisitSelf"], true);
        assert_eq!(json["data"]["nightVote"], false);
    }

    #[test]
    fn test_player_summary_omits_unknown_fields() {
        let json = serde_json::to_value(PlayerSummary {
            name: "ada".into(),
            is_alive: None,
            role: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "name": "ada" }));

        let json = serde_json::to_value(PlayerSummary {
            name: "bob".into(),
            is_alive: Some(false),
            role: Some("Jester".into()),
        })
        .unwrap();
        assert_eq!(json["isAlive"], false);
        assert_eq!(json["role"], "Jester");
    }
}
