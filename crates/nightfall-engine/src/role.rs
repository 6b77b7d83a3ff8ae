//! Roles: the closed set of role kinds and their per-player state.
//!
//! Every kind has a fixed attribute set (group, base defence, ability,
//! visit permissions). A [`Role`] is one player's instance of a kind plus
//! the intent recorded during the current night (`visiting`). Everything
//! else that changes during a night lives on the
//! [`NightBoard`](crate::NightBoard) and is thrown away after resolution.

use std::fmt;

use nightfall_protocol::{Seat, ServerMessage};
use serde::{Deserialize, Serialize};

use crate::night::NightResolution;

// ---------------------------------------------------------------------------
// RoleGroup
// ---------------------------------------------------------------------------

/// The alignment a role belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleGroup {
    Town,
    Mafia,
    Neutral,
    Unaligned,
}

impl RoleGroup {
    /// Whether roles of this group share a private faction.
    pub fn forms_faction(self) -> bool {
        matches!(self, Self::Mafia)
    }
}

impl fmt::Display for RoleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Town => write!(f, "Town"),
            Self::Mafia => write!(f, "Mafia"),
            Self::Neutral => write!(f, "Neutral"),
            Self::Unaligned => write!(f, "Unaligned"),
        }
    }
}

// ---------------------------------------------------------------------------
// Ability / permissions
// ---------------------------------------------------------------------------

/// What a role's own night visit does. Determines its resolution stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ability {
    None,
    Roleblock,
    Protect,
    Investigate,
    Attack,
}

/// Which targets a role may choose, per time of day.
///
/// "Faction" means a fellow member of the actor's own faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisitPermissions {
    pub day_self: bool,
    pub day_others: bool,
    pub day_faction: bool,
    pub night_self: bool,
    pub night_others: bool,
    pub night_faction: bool,
}

impl VisitPermissions {
    pub const NONE: Self = Self {
        day_self: false,
        day_others: false,
        day_faction: false,
        night_self: false,
        night_others: false,
        night_faction: false,
    };

    const NIGHT_OTHERS: Self = Self {
        night_others: true,
        ..Self::NONE
    };

    /// Whether any night target is allowed at all.
    pub fn acts_at_night(&self) -> bool {
        self.night_self || self.night_others || self.night_faction
    }
}

// ---------------------------------------------------------------------------
// RoleKind
// ---------------------------------------------------------------------------

/// Every role in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    Villager,
    Doctor,
    Bodyguard,
    Investigator,
    Escort,
    Mafioso,
    Consort,
    SerialKiller,
    Jester,
    Survivor,
}

impl RoleKind {
    pub const ALL: [RoleKind; 10] = [
        Self::Villager,
        Self::Doctor,
        Self::Bodyguard,
        Self::Investigator,
        Self::Escort,
        Self::Mafioso,
        Self::Consort,
        Self::SerialKiller,
        Self::Jester,
        Self::Survivor,
    ];

    /// Display name, also used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Self::Villager => "Villager",
            Self::Doctor => "Doctor",
            Self::Bodyguard => "Bodyguard",
            Self::Investigator => "Investigator",
            Self::Escort => "Escort",
            Self::Mafioso => "Mafioso",
            Self::Consort => "Consort",
            Self::SerialKiller => "Serial Killer",
            Self::Jester => "Jester",
            Self::Survivor => "Survivor",
        }
    }

    pub fn group(self) -> RoleGroup {
        match self {
            Self::Villager | Self::Doctor | Self::Bodyguard | Self::Investigator | Self::Escort => {
                RoleGroup::Town
            }
            Self::Mafioso | Self::Consort => RoleGroup::Mafia,
            Self::SerialKiller | Self::Jester => RoleGroup::Neutral,
            Self::Survivor => RoleGroup::Unaligned,
        }
    }

    /// Defence every night starts from.
    pub fn base_defence(self) -> u32 {
        match self {
            Self::SerialKiller | Self::Survivor => 1,
            _ => 0,
        }
    }

    pub fn ability(self) -> Ability {
        match self {
            Self::Doctor | Self::Bodyguard => Ability::Protect,
            Self::Investigator => Ability::Investigate,
            Self::Escort | Self::Consort => Ability::Roleblock,
            Self::SerialKiller => Ability::Attack,
            Self::Villager | Self::Mafioso | Self::Jester | Self::Survivor => Ability::None,
        }
    }

    pub fn is_roleblocker(self) -> bool {
        self.ability() == Ability::Roleblock
    }

    /// Whether this role votes on its faction's nightly kill.
    pub fn has_night_vote(self) -> bool {
        matches!(self, Self::Mafioso | Self::Consort)
    }

    /// Whether this role strikes back at its protectee's visitors.
    pub fn retaliates(self) -> bool {
        matches!(self, Self::Bodyguard)
    }

    pub fn permissions(self) -> VisitPermissions {
        match self {
            Self::Doctor => VisitPermissions {
                night_self: true,
                ..VisitPermissions::NIGHT_OTHERS
            },
            Self::Bodyguard | Self::Investigator | Self::Escort | Self::SerialKiller => {
                VisitPermissions::NIGHT_OTHERS
            }
            Self::Consort => VisitPermissions {
                night_faction: false,
                ..VisitPermissions::NIGHT_OTHERS
            },
            Self::Villager | Self::Mafioso | Self::Jester | Self::Survivor => VisitPermissions::NONE,
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Night-action validation
// ---------------------------------------------------------------------------

/// What the validator needs to know about a prospective target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetView {
    pub seat: Seat,
    pub is_alive: bool,
    pub group: Option<RoleGroup>,
}

/// A night visit that was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitChange {
    Visiting(Seat),
    StayingHome,
}

/// Why a night visit was refused. `Display` is the text sent to the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActionRejected {
    #[error("You have no night ability.")]
    NoAbility,
    #[error("Invalid choice.")]
    InvalidChoice,
    #[error("You cannot target yourself.")]
    SelfTarget,
    #[error("You cannot target a member of your faction.")]
    FactionTarget,
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// One player's role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    kind: RoleKind,
    faction: Option<RoleGroup>,
    visiting: Option<Seat>,
}

impl Role {
    pub fn new(kind: RoleKind) -> Self {
        Self {
            kind,
            faction: None,
            visiting: None,
        }
    }

    pub fn kind(&self) -> RoleKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn group(&self) -> RoleGroup {
        self.kind.group()
    }

    pub fn base_defence(&self) -> u32 {
        self.kind.base_defence()
    }

    pub fn permissions(&self) -> VisitPermissions {
        self.kind.permissions()
    }

    /// The faction this role was registered with, if any.
    pub fn faction(&self) -> Option<RoleGroup> {
        self.faction
    }

    /// The target chosen for tonight.
    pub fn visiting(&self) -> Option<Seat> {
        self.visiting
    }

    pub(crate) fn set_faction(&mut self, group: Option<RoleGroup>) {
        self.faction = group;
    }

    pub(crate) fn clear_visit(&mut self) {
        self.visiting = None;
    }

    /// Validate and record a night target.
    ///
    /// `target` is `None` when `recipient` does not name a seat in the room.
    /// On rejection nothing changes.
    pub fn handle_night_action(
        &mut self,
        actor: Seat,
        recipient: Option<Seat>,
        target: Option<TargetView>,
    ) -> Result<VisitChange, ActionRejected> {
        let permissions = self.permissions();
        if !permissions.acts_at_night() {
            return Err(ActionRejected::NoAbility);
        }

        let Some(seat) = recipient else {
            self.visiting = None;
            return Ok(VisitChange::StayingHome);
        };

        let target = match target {
            Some(target) if target.seat == seat && target.is_alive => target,
            _ => return Err(ActionRejected::InvalidChoice),
        };

        if seat == actor {
            if !permissions.night_self {
                return Err(ActionRejected::SelfTarget);
            }
        } else if self.faction.is_some() && target.group == self.faction {
            if !permissions.night_faction {
                return Err(ActionRejected::FactionTarget);
            }
        } else if !permissions.night_others {
            return Err(ActionRejected::NoAbility);
        }

        self.visiting = Some(seat);
        Ok(VisitChange::Visiting(seat))
    }

    /// Apply this role's own effect to `target` during resolution.
    pub fn visit(&self, actor: Seat, target: Seat, night: &mut NightResolution<'_>) {
        match self.kind.ability() {
            Ability::Roleblock => night.roleblock(actor, target),
            Ability::Protect => night.protect(actor, target),
            Ability::Investigate => night.investigate(actor, target),
            Ability::Attack => night.attack(actor, target),
            Ability::None => {}
        }
    }

    /// React to everyone else who visited `target` tonight.
    pub fn handle_visits(&self, actor: Seat, target: Seat, night: &mut NightResolution<'_>) {
        if self.kind.retaliates() {
            night.retaliate(actor, target);
        }
    }

    /// The private `role-assigned` message for this role's player.
    pub fn assignment(&self, player_name: &str) -> ServerMessage {
        let p = self.permissions();
        ServerMessage::RoleAssigned {
            name: player_name.to_owned(),
            role: self.name().to_owned(),
            day_visit_self: p.day_self,
            day_visit_others: p.day_others,
            day_visit_faction: p.day_faction,
            night_visit_self: p.night_self,
            night_visit_others: p.night_others,
            night_visit_faction: p.night_faction,
            night_vote: self.kind.has_night_vote(),
        }
    }
}
