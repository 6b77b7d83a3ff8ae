//! Night resolution.
//!
//! All transient per-night state (defence, damage, visitors, attackers,
//! roleblocks) lives on a [`NightBoard`] indexed by seat. The board is
//! built fresh from every role's base defence when resolution starts and
//! is thrown away when it ends, so nothing can leak from one night into
//! the next.
//!
//! Stages, each in seat order:
//!
//! ```text
//! roleblock → protect → investigate → attack → retaliate
//! ```
//!
//! The outcome (who dies) is decided by the room from the finished board.

use std::collections::BTreeSet;

use nightfall_protocol::Seat;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::config::GameConfig;
use crate::player::Player;
use crate::role::{Ability, RoleGroup};

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// One seat's state for the night being resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightSlot {
    pub defence: u32,
    pub damage: u32,
    /// Everyone who visited, in the order the visits happened.
    pub visitors: Vec<Seat>,
    pub attackers: Vec<Seat>,
    pub roleblocked: bool,
}

impl NightSlot {
    pub fn is_lethal(&self) -> bool {
        self.damage > self.defence
    }

    pub fn was_attacked(&self) -> bool {
        !self.attackers.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightBoard {
    slots: Vec<NightSlot>,
}

impl NightBoard {
    /// A board where every seat starts at its role's base defence.
    pub fn new(players: &[Player]) -> Self {
        Self {
            slots: players
                .iter()
                .map(|p| NightSlot {
                    defence: p.role().map_or(0, |r| r.base_defence()),
                    ..NightSlot::default()
                })
                .collect(),
        }
    }

    pub fn slot(&self, seat: Seat) -> Option<&NightSlot> {
        self.slots.get(seat.0)
    }

    fn slot_mut(&mut self, seat: Seat) -> Option<&mut NightSlot> {
        self.slots.get_mut(seat.0)
    }

    fn is_roleblocked(&self, seat: Seat) -> bool {
        self.slot(seat).is_some_and(|s| s.roleblocked)
    }

    /// Seats with their slots, in seat order.
    pub fn iter(&self) -> impl Iterator<Item = (Seat, &NightSlot)> {
        self.slots.iter().enumerate().map(|(i, s)| (Seat(i), s))
    }
}

// ---------------------------------------------------------------------------
// Planned visits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitSource {
    /// The actor's own role ability.
    Own,
    /// The actor carries out its faction's agreed kill.
    FactionKill,
}

/// One visit that will be attempted tonight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedVisit {
    pub actor: Seat,
    pub target: Seat,
    pub source: VisitSource,
}

impl PlannedVisit {
    fn ability(&self, players: &[Player]) -> Ability {
        match self.source {
            VisitSource::FactionKill => Ability::Attack,
            VisitSource::Own => players
                .get(self.actor.0)
                .and_then(Player::role)
                .map_or(Ability::None, |r| r.kind().ability()),
        }
    }
}

/// Everything resolution produced.
#[derive(Debug, Clone)]
pub struct NightReport {
    /// Each seat's defence before any visit was applied.
    pub starting_defence: Vec<u32>,
    pub board: NightBoard,
    /// Private messages for individual seats, in the order they arose.
    pub notices: Vec<(Seat, String)>,
    pub visits: Vec<PlannedVisit>,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// One night's resolution pass.
///
/// Role effects are applied through the methods on this type; roles pick
/// which one in [`Role::visit`](crate::Role::visit).
pub struct NightResolution<'a> {
    players: &'a [Player],
    config: &'a GameConfig,
    rng: &'a mut StdRng,
    board: NightBoard,
    notices: Vec<(Seat, String)>,
}

impl<'a> NightResolution<'a> {
    pub fn new(players: &'a [Player], config: &'a GameConfig, rng: &'a mut StdRng) -> Self {
        Self {
            players,
            config,
            rng,
            board: NightBoard::new(players),
            notices: Vec::new(),
        }
    }

    pub fn board(&self) -> &NightBoard {
        &self.board
    }

    /// Run every stage. `faction_kills` are `(executor, target)` pairs; a
    /// faction kill replaces the executor's own visit.
    pub fn resolve(mut self, faction_kills: &[(Seat, Seat)]) -> NightReport {
        let players = self.players;
        let starting_defence = self.board.slots.iter().map(|s| s.defence).collect();
        let visits = plan_visits(players, faction_kills);

        for stage in [
            Ability::Roleblock,
            Ability::Protect,
            Ability::Investigate,
            Ability::Attack,
        ] {
            for visit in visits.iter().filter(|v| v.ability(players) == stage) {
                if stage != Ability::Roleblock && self.board.is_roleblocked(visit.actor) {
                    debug!(actor = %visit.actor, "visit skipped, actor roleblocked");
                    continue;
                }
                match visit.source {
                    VisitSource::FactionKill => self.attack(visit.actor, visit.target),
                    VisitSource::Own => {
                        if let Some(role) = players.get(visit.actor.0).and_then(Player::role) {
                            role.visit(visit.actor, visit.target, &mut self);
                        }
                    }
                }
            }
        }

        for visit in visits.iter().filter(|v| v.source == VisitSource::Own) {
            if self.board.is_roleblocked(visit.actor) {
                continue;
            }
            if let Some(role) = players.get(visit.actor.0).and_then(Player::role) {
                role.handle_visits(visit.actor, visit.target, &mut self);
            }
        }

        NightReport {
            starting_defence,
            board: self.board,
            notices: self.notices,
            visits,
        }
    }

    /// Block the target's own visit tonight. Town is always blocked; anyone
    /// else resists with the configured chance.
    pub fn roleblock(&mut self, actor: Seat, target: Seat) {
        let town = self.group_of(target) == Some(RoleGroup::Town);
        let blocked = town || !self.rng.random_bool(self.config.roleblock_resist_chance);
        trace!(%actor, %target, blocked, "roleblock");
        if !blocked {
            return;
        }
        // only a landed block counts as a visit
        self.record_visit(actor, target);
        if let Some(slot) = self.board.slot_mut(target) {
            if !slot.roleblocked {
                slot.roleblocked = true;
                self.notices.push((target, "You were roleblocked!".to_owned()));
            }
        }
    }

    /// Raise a zero defence to the configured protection level.
    pub fn protect(&mut self, actor: Seat, target: Seat) {
        self.record_visit(actor, target);
        let minimum = self.config.protect_defence;
        if let Some(slot) = self.board.slot_mut(target) {
            if slot.defence == 0 {
                slot.defence = minimum;
            }
        }
    }

    /// Tell the actor a handful of candidate roles for the target.
    pub fn investigate(&mut self, actor: Seat, target: Seat) {
        self.record_visit(actor, target);
        let players = self.players;
        let Some(suspect) = players.get(target.0) else {
            return;
        };
        let Some(true_role) = suspect.role().map(|r| r.name()) else {
            return;
        };
        let decoys: Vec<&'static str> = players
            .iter()
            .filter(|p| p.seat() != target)
            .filter_map(|p| p.role().map(|r| r.name()))
            .collect();

        let mut names = BTreeSet::new();
        for _ in 0..self.config.investigation_rolls {
            let accurate = decoys.is_empty()
                || self.rng.random_bool(self.config.investigation_accuracy);
            if accurate {
                names.insert(true_role);
            } else {
                names.insert(decoys[self.rng.random_range(0..decoys.len())]);
            }
        }

        let list: Vec<&str> = names.into_iter().collect();
        self.notices.push((
            actor,
            format!("{}'s role might be: {}.", suspect.name(), list.join(", ")),
        ));
    }

    pub fn attack(&mut self, actor: Seat, target: Seat) {
        self.record_visit(actor, target);
        let damage = self.config.attack_damage;
        if let Some(slot) = self.board.slot_mut(target) {
            slot.damage += damage;
            slot.attackers.push(actor);
        }
    }

    /// Hit everyone else who visited the protectee tonight.
    pub fn retaliate(&mut self, actor: Seat, target: Seat) {
        let Some(slot) = self.board.slot(target) else {
            return;
        };
        let visitors: BTreeSet<Seat> = slot.visitors.iter().copied().collect();
        let damage = self.config.attack_damage.max(1);
        for visitor in visitors {
            if visitor == actor || visitor == target {
                continue;
            }
            if let Some(slot) = self.board.slot_mut(visitor) {
                slot.damage += damage;
                slot.attackers.push(actor);
                debug!(bodyguard = %actor, %visitor, "retaliation");
            }
        }
    }

    fn record_visit(&mut self, actor: Seat, target: Seat) {
        if let Some(slot) = self.board.slot_mut(target) {
            slot.visitors.push(actor);
        }
    }

    fn group_of(&self, seat: Seat) -> Option<RoleGroup> {
        self.players.get(seat.0).and_then(Player::group)
    }
}

/// Every visit that will be attempted tonight, in actor seat order.
fn plan_visits(players: &[Player], faction_kills: &[(Seat, Seat)]) -> Vec<PlannedVisit> {
    let alive = |seat: Seat| players.get(seat.0).is_some_and(Player::is_alive);

    let mut visits: Vec<PlannedVisit> = players
        .iter()
        .filter(|p| p.is_alive())
        .filter_map(|p| {
            let target = p.role()?.visiting()?;
            alive(target).then_some(PlannedVisit {
                actor: p.seat(),
                target,
                source: VisitSource::Own,
            })
        })
        .collect();

    for &(executor, target) in faction_kills {
        if !alive(executor) || !alive(target) {
            continue;
        }
        visits.retain(|v| v.actor != executor);
        visits.push(PlannedVisit {
            actor: executor,
            target,
            source: VisitSource::FactionKill,
        });
    }

    visits.sort_by_key(|v| v.actor);
    visits
}

#[cfg(test)]
mod tests {
    use nightfall_protocol::PlayerId;
    use rand::SeedableRng;

    use super::*;
    use crate::role::{Role, RoleKind};

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

    fn target(players: &mut [Player], actor: usize, target: usize) {
        let view = players[target].target_view();
        players[actor]
            .role_mut()
            .unwrap()
            .handle_night_action(Seat(actor), Some(Seat(target)), Some(view))
            .expect("visit should be accepted");
    }

    fn resolve(players: &[Player], config: &GameConfig, seed: u64, kills: &[(Seat, Seat)]) -> NightReport {
        let mut rng = StdRng::seed_from_u64(seed);
        NightResolution::new(players, config, &mut rng).resolve(kills)
    }

    fn notices_for(report: &NightReport, seat: usize) -> Vec<&str> {
        report
            .notices
            .iter()
            .filter(|(s, _)| *s == Seat(seat))
            .map(|(_, m)| m.as_str())
            .collect()
    }

    #[test]
    fn test_board_starts_at_base_defence() {
        let players = table(&[RoleKind::Villager, RoleKind::SerialKiller, RoleKind::Survivor]);
        let board = NightBoard::new(&players);
        let defences: Vec<u32> = board.iter().map(|(_, s)| s.defence).collect();
        assert_eq!(defences, vec![0, 1, 1]);
    }

    #[test]
    fn test_doctor_heal_beats_single_attack() {
        // 0 Doctor heals 1; 2 Mafioso kills 1.
        let mut players = table(&[RoleKind::Doctor, RoleKind::Villager, RoleKind::Mafioso]);
        target(&mut players, 0, 1);

        let report = resolve(&players, &GameConfig::default(), 1, &[(Seat(2), Seat(1))]);
        let slot = report.board.slot(Seat(1)).unwrap();
        assert_eq!(slot.defence, 1);
        assert_eq!(slot.damage, 1);
        assert_eq!(slot.attackers, vec![Seat(2)]);
        assert!(!slot.is_lethal());
    }

    #[test]
    fn test_unprotected_attack_is_lethal() {
        let players = table(&[RoleKind::Villager, RoleKind::Mafioso]);
        let report = resolve(&players, &GameConfig::default(), 1, &[(Seat(1), Seat(0))]);
        assert!(report.board.slot(Seat(0)).unwrap().is_lethal());
    }

    #[test]
    fn test_protection_never_lowers_defence() {
        // Doctor heals the Serial Killer (base 1) with a weaker protection level.
        let mut players = table(&[RoleKind::Doctor, RoleKind::SerialKiller]);
        target(&mut players, 0, 1);
        let config = GameConfig {
            protect_defence: 0,
            ..Default::default()
        };

        let report = resolve(&players, &config, 1, &[]);
        assert_eq!(report.board.slot(Seat(1)).unwrap().defence, 1);
    }

    #[test]
    fn test_escort_blocks_investigator() {
        let mut players = table(&[
            RoleKind::Escort,
            RoleKind::Investigator,
            RoleKind::Mafioso,
        ]);
        target(&mut players, 0, 1);
        target(&mut players, 1, 2);

        let report = resolve(&players, &GameConfig::default(), 7, &[]);
        assert!(report.board.slot(Seat(1)).unwrap().roleblocked);
        assert_eq!(notices_for(&report, 1), vec!["You were roleblocked!"]);
        assert!(
            report.board.slot(Seat(2)).unwrap().visitors.is_empty(),
            "blocked investigator never visits"
        );
        assert!(!report.notices.iter().any(|(_, m)| m.contains("might be")));
    }

    #[test]
    fn test_roleblocked_executor_does_not_kill() {
        let mut players = table(&[RoleKind::Escort, RoleKind::Villager, RoleKind::Mafioso]);
        let config = GameConfig {
            roleblock_resist_chance: 0.0,
            ..Default::default()
        };
        target(&mut players, 0, 2);

        let report = resolve(&players, &config, 3, &[(Seat(2), Seat(1))]);
        assert!(report.board.slot(Seat(2)).unwrap().roleblocked);
        assert_eq!(report.board.slot(Seat(1)).unwrap().damage, 0);
    }

    #[test]
    fn test_roleblock_on_town_always_lands() {
        let mut players = table(&[RoleKind::Consort, RoleKind::Doctor]);
        target(&mut players, 0, 1);
        let config = GameConfig {
            roleblock_resist_chance: 1.0,
            ..Default::default()
        };
        for seed in 0..50 {
            let report = resolve(&players, &config, seed, &[]);
            assert!(report.board.slot(Seat(1)).unwrap().roleblocked);
        }
    }

    #[test]
    fn test_resisted_roleblock_leaves_no_visitor() {
        let mut players = table(&[RoleKind::Escort, RoleKind::SerialKiller]);
        target(&mut players, 0, 1);
        let config = GameConfig {
            roleblock_resist_chance: 1.0,
            ..Default::default()
        };

        let report = resolve(&players, &config, 5, &[]);
        let slot = report.board.slot(Seat(1)).unwrap();
        assert!(!slot.roleblocked);
        assert!(slot.visitors.is_empty());
        assert!(notices_for(&report, 1).is_empty());
    }

    #[test]
    fn test_bodyguard_spares_resisted_roleblocker() {
        // 0 Bodyguard guards 1 (Survivor); 2 Consort tries to block 1.
        let mut players = table(&[RoleKind::Bodyguard, RoleKind::Survivor, RoleKind::Consort]);
        target(&mut players, 0, 1);
        target(&mut players, 2, 1);
        let config = GameConfig {
            roleblock_resist_chance: 1.0,
            ..Default::default()
        };

        let report = resolve(&players, &config, 9, &[]);
        assert_eq!(report.board.slot(Seat(1)).unwrap().visitors, vec![Seat(0)]);
        assert_eq!(report.board.slot(Seat(2)).unwrap().damage, 0);
    }

    #[test]
    fn test_roleblock_on_non_town_matches_resist_chance() {
        let mut players = table(&[RoleKind::Escort, RoleKind::SerialKiller]);
        target(&mut players, 0, 1);
        let config = GameConfig::default();
        let mut rng = StdRng::seed_from_u64(2024);

        let trials = 2000;
        let blocked = (0..trials)
            .filter(|_| {
                let report = NightResolution::new(&players, &config, &mut rng).resolve(&[]);
                report.board.slot(Seat(1)).unwrap().roleblocked
            })
            .count();
        let rate = blocked as f64 / trials as f64;
        assert!((0.45..0.55).contains(&rate), "block rate {rate}");
    }

    #[test]
    fn test_bodyguard_retaliates_against_attacker() {
        // 0 Bodyguard guards 1; 2 Serial Killer attacks 1.
        let mut players = table(&[
            RoleKind::Bodyguard,
            RoleKind::Villager,
            RoleKind::SerialKiller,
            RoleKind::Doctor,
        ]);
        target(&mut players, 0, 1);
        target(&mut players, 2, 1);

        let report = resolve(&players, &GameConfig::default(), 1, &[]);
        let killer = report.board.slot(Seat(2)).unwrap();
        assert!(killer.damage >= 1);
        assert_eq!(killer.attackers, vec![Seat(0)]);
        assert!(
            report.board.slot(Seat(0)).unwrap().damage == 0,
            "bodyguard never hits itself"
        );
        assert!(!report.board.slot(Seat(1)).unwrap().is_lethal());
    }

    #[test]
    fn test_bodyguard_hits_every_other_visitor() {
        let mut players = table(&[
            RoleKind::Bodyguard,
            RoleKind::Villager,
            RoleKind::Doctor,
            RoleKind::Mafioso,
        ]);
        target(&mut players, 0, 1);
        target(&mut players, 2, 1);

        let report = resolve(&players, &GameConfig::default(), 1, &[(Seat(3), Seat(1))]);
        assert_eq!(report.board.slot(Seat(2)).unwrap().damage, 1);
        assert_eq!(report.board.slot(Seat(3)).unwrap().damage, 1);
    }

    #[test]
    fn test_accurate_investigation_reports_true_role() {
        let mut players = table(&[RoleKind::Investigator, RoleKind::Mafioso, RoleKind::Jester]);
        target(&mut players, 0, 1);
        let config = GameConfig {
            investigation_accuracy: 1.0,
            ..Default::default()
        };

        let report = resolve(&players, &config, 9, &[]);
        assert_eq!(notices_for(&report, 0), vec!["p1's role might be: Mafioso."]);
    }

    #[test]
    fn test_inaccurate_investigation_lists_decoys_only() {
        let mut players = table(&[RoleKind::Investigator, RoleKind::Mafioso, RoleKind::Jester]);
        target(&mut players, 0, 1);
        let config = GameConfig {
            investigation_accuracy: 0.0,
            ..Default::default()
        };

        let report = resolve(&players, &config, 9, &[]);
        let notice = notices_for(&report, 0)[0].to_string();
        assert!(notice.starts_with("p1's role might be: "));
        assert!(!notice.contains("Mafioso"));
    }

    #[test]
    fn test_faction_kill_replaces_executor_visit() {
        let mut players = table(&[RoleKind::Consort, RoleKind::Villager, RoleKind::Doctor]);
        target(&mut players, 0, 2);

        let report = resolve(&players, &GameConfig::default(), 1, &[(Seat(0), Seat(1))]);
        assert_eq!(report.visits.len(), 1);
        assert_eq!(report.visits[0].source, VisitSource::FactionKill);
        assert!(!report.board.slot(Seat(2)).unwrap().roleblocked);
        assert!(report.board.slot(Seat(1)).unwrap().is_lethal());
    }
}
