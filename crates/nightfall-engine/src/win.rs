//! Win conditions.
//!
//! A [`WinConditionManager`] holds an ordered list of [`WinCondition`]s.
//! Evaluation walks the list in registration order and returns the first
//! [`Winner`]; registration order is therefore priority. Conditions only
//! read a [`WinContext`], so checking is pure and can be repeated freely.

use std::fmt;

use nightfall_protocol::Seat;

use crate::player::Player;
use crate::role::{RoleGroup, RoleKind};

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a win condition may look at.
#[derive(Debug, Clone, Copy)]
pub struct WinContext<'a> {
    pub day_number: u32,
    pub end_day: u32,
    pub players: &'a [Player],
    /// Seat of a Jester who was voted out by day, if any.
    pub jester_voted_out: Option<Seat>,
}

impl<'a> WinContext<'a> {
    pub fn alive(self) -> impl Iterator<Item = &'a Player> + 'a {
        self.players.iter().filter(|p| p.is_alive())
    }

    fn alive_kind(self, kind: RoleKind) -> impl Iterator<Item = &'a Player> + 'a {
        self.alive()
            .filter(move |p| p.role().is_some_and(|r| r.kind() == kind))
    }

    fn alive_group(&self, group: RoleGroup) -> usize {
        self.alive().filter(|p| p.group() == Some(group)).count()
    }

    /// Living players that can block or decide a game end.
    fn alive_contenders(&self) -> usize {
        self.alive()
            .filter(|p| p.group() != Some(RoleGroup::Unaligned))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Winner
// ---------------------------------------------------------------------------

/// Who won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinningSide {
    Faction(RoleGroup),
    Solo(Seat),
    Stalemate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    pub side: WinningSide,
    pub reason: String,
}

impl Winner {
    pub fn new(side: WinningSide, reason: impl Into<String>) -> Self {
        Self {
            side,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// A predicate that may end the game.
pub trait WinCondition: Send {
    fn name(&self) -> &'static str;

    fn check(&self, context: &WinContext<'_>) -> Option<Winner>;
}

/// Plain closures work as ad-hoc conditions.
impl<F> WinCondition for F
where
    F: Fn(&WinContext<'_>) -> Option<Winner> + Send,
{
    fn name(&self) -> &'static str {
        "custom"
    }

    fn check(&self, context: &WinContext<'_>) -> Option<Winner> {
        self(context)
    }
}

/// Stalemate once `day_number` reaches `end_day`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxDays;

impl WinCondition for MaxDays {
    fn name(&self) -> &'static str {
        "max-days"
    }

    fn check(&self, context: &WinContext<'_>) -> Option<Winner> {
        (context.day_number >= context.end_day).then(|| {
            Winner::new(
                WinningSide::Stalemate,
                format!("Day {} was reached. Nobody wins.", context.end_day),
            )
        })
    }
}

/// A Jester who gets voted out wins alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct JesterVotedOut;

impl WinCondition for JesterVotedOut {
    fn name(&self) -> &'static str {
        "jester-voted-out"
    }

    fn check(&self, context: &WinContext<'_>) -> Option<Winner> {
        let seat = context.jester_voted_out?;
        let name = context
            .players
            .get(seat.0)
            .map_or("The Jester", Player::name);
        Some(Winner::new(
            WinningSide::Solo(seat),
            format!("{name} was the Jester and fooled the town. The Jester wins!"),
        ))
    }
}

/// Serial Killer alive with at most one other contender left.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialKillerWins;

impl WinCondition for SerialKillerWins {
    fn name(&self) -> &'static str {
        "serial-killer-wins"
    }

    fn check(&self, context: &WinContext<'_>) -> Option<Winner> {
        let killer = context.alive_kind(RoleKind::SerialKiller).next()?;
        let killers = context.alive_kind(RoleKind::SerialKiller).count();
        let others = context.alive_contenders() - killers;
        (others <= 1).then(|| {
            Winner::new(
                WinningSide::Solo(killer.seat()),
                format!("{} the Serial Killer wins!", killer.name()),
            )
        })
    }
}

/// No Mafia and no Serial Killer left alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct TownWins;

impl WinCondition for TownWins {
    fn name(&self) -> &'static str {
        "town-wins"
    }

    fn check(&self, context: &WinContext<'_>) -> Option<Winner> {
        let threats = context.alive_group(RoleGroup::Mafia)
            + context.alive_kind(RoleKind::SerialKiller).count();
        (threats == 0)
            .then(|| Winner::new(WinningSide::Faction(RoleGroup::Town), "The Town wins!"))
    }
}

/// Mafia at parity with everyone else, and no Serial Killer in the way.
#[derive(Debug, Clone, Copy, Default)]
pub struct MafiaWins;

impl WinCondition for MafiaWins {
    fn name(&self) -> &'static str {
        "mafia-wins"
    }

    fn check(&self, context: &WinContext<'_>) -> Option<Winner> {
        let mafia = context.alive_group(RoleGroup::Mafia);
        if mafia == 0 || context.alive_kind(RoleKind::SerialKiller).next().is_some() {
            return None;
        }
        let others = context.alive_contenders() - mafia;
        (mafia >= others)
            .then(|| Winner::new(WinningSide::Faction(RoleGroup::Mafia), "The Mafia wins!"))
    }
}

/// Everyone is dead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NobodyLeft;

impl WinCondition for NobodyLeft {
    fn name(&self) -> &'static str {
        "nobody-left"
    }

    fn check(&self, context: &WinContext<'_>) -> Option<Winner> {
        (context.alive_contenders() == 0)
            .then(|| Winner::new(WinningSide::Stalemate, "Nobody is left standing."))
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Ordered registry of win conditions.
#[derive(Default)]
pub struct WinConditionManager {
    conditions: Vec<Box<dyn WinCondition>>,
}

impl fmt::Debug for WinConditionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.conditions.iter().map(|c| c.name()))
            .finish()
    }
}

impl WinConditionManager {
    /// An empty registry. Nothing ever wins.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard rule set, in priority order.
    pub fn with_defaults() -> Self {
        let mut manager = Self::new();
        manager.register_condition(JesterVotedOut);
        manager.register_condition(NobodyLeft);
        manager.register_condition(SerialKillerWins);
        manager.register_condition(TownWins);
        manager.register_condition(MafiaWins);
        manager.register_condition(MaxDays);
        manager
    }

    /// Append a condition. It has lower priority than every earlier one.
    pub fn register_condition(&mut self, condition: impl WinCondition + 'static) {
        self.conditions.push(Box::new(condition));
    }

    /// The first condition that fires, in registration order.
    pub fn check_win_conditions(&self, context: &WinContext<'_>) -> Option<Winner> {
        self.conditions.iter().find_map(|c| c.check(context))
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use nightfall_protocol::PlayerId;

    use super::*;
    use crate::role::Role;

    fn table(kinds: &[RoleKind]) -> Vec<Player> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let mut p = Player::new(PlayerId(i as u64 + 1), format!("p{i}"), Seat(i));
                p.assign_role(Role::new(*kind));
                p
            })
            .collect()
    }

    fn ctx(players: &[Player], day_number: u32) -> WinContext<'_> {
        WinContext {
            day_number,
            end_day: 5,
            players,
            jester_voted_out: None,
        }
    }

    #[test]
    fn test_max_days_is_pure_threshold() {
        let players = table(&[RoleKind::Villager, RoleKind::Mafioso]);
        for _ in 0..3 {
            assert_eq!(MaxDays.check(&ctx(&players, 4)), None);
            let winner = MaxDays.check(&ctx(&players, 5)).expect("day 5 ends the game");
            assert_eq!(winner.side, WinningSide::Stalemate);
            assert!(MaxDays.check(&ctx(&players, 9)).is_some());
        }
    }

    #[test]
    fn test_town_wins_when_threats_gone() {
        let mut players = table(&[RoleKind::Villager, RoleKind::Doctor, RoleKind::Mafioso]);
        assert_eq!(TownWins.check(&ctx(&players, 1)), None);
        players[2].kill();
        assert_eq!(
            TownWins.check(&ctx(&players, 1)).map(|w| w.side),
            Some(WinningSide::Faction(RoleGroup::Town))
        );
    }

    #[test]
    fn test_mafia_wins_at_parity_ignoring_survivor() {
        let mut players = table(&[
            RoleKind::Mafioso,
            RoleKind::Villager,
            RoleKind::Villager,
            RoleKind::Survivor,
        ]);
        assert_eq!(MafiaWins.check(&ctx(&players, 2)), None);
        players[1].kill();
        assert_eq!(
            MafiaWins.check(&ctx(&players, 2)).map(|w| w.side),
            Some(WinningSide::Faction(RoleGroup::Mafia))
        );
    }

    #[test]
    fn test_serial_killer_blocks_mafia_and_town() {
        let mut players = table(&[
            RoleKind::Mafioso,
            RoleKind::SerialKiller,
            RoleKind::Villager,
        ]);
        players[0].kill();
        assert_eq!(TownWins.check(&ctx(&players, 2)), None);
        assert_eq!(
            SerialKillerWins.check(&ctx(&players, 2)).map(|w| w.side),
            Some(WinningSide::Solo(Seat(1)))
        );
    }

    #[test]
    fn test_first_registered_condition_wins() {
        let mut players = table(&[RoleKind::Jester, RoleKind::Villager, RoleKind::Mafioso]);
        players[0].kill();
        players[2].kill();
        let context = WinContext {
            jester_voted_out: Some(Seat(0)),
            ..ctx(&players, 2)
        };

        let winner = WinConditionManager::with_defaults()
            .check_win_conditions(&context)
            .unwrap();
        assert_eq!(winner.side, WinningSide::Solo(Seat(0)));
        assert!(winner.reason.contains("Jester"));
    }

    #[test]
    fn test_closure_conditions_are_registrable() {
        let players = table(&[RoleKind::Villager]);
        let mut manager = WinConditionManager::new();
        assert_eq!(manager.check_win_conditions(&ctx(&players, 1)), None);

        manager.register_condition(|c: &WinContext<'_>| {
            (c.day_number == 3).then(|| Winner::new(WinningSide::Stalemate, "three"))
        });
        manager.register_condition(MaxDays);
        assert_eq!(manager.len(), 2);
        assert_eq!(
            manager
                .check_win_conditions(&ctx(&players, 3))
                .map(|w| w.reason),
            Some("three".to_string())
        );
        assert_eq!(
            manager
                .check_win_conditions(&ctx(&players, 6))
                .map(|w| w.reason),
            Some("Day 5 was reached. Nobody wins.".to_string())
        );
    }

    #[test]
    fn test_default_priority_order() {
        assert_eq!(
            format!("{:?}", WinConditionManager::with_defaults()),
            r#"["jester-voted-out", "nobody-left", "serial-killer-wins", "town-wins", "mafia-wins", "max-days"]"#
        );
    }

    #[test]
    fn test_nobody_left_is_stalemate() {
        let mut players = table(&[RoleKind::Villager, RoleKind::SerialKiller]);
        players[0].kill();
        players[1].kill();
        let winner = WinConditionManager::with_defaults()
            .check_win_conditions(&ctx(&players, 2))
            .unwrap();
        assert_eq!(winner.side, WinningSide::Stalemate);
    }
}
