//! Factions: role groups that share a private channel and a nightly kill.

use std::collections::BTreeMap;

use nightfall_protocol::{Seat, ServerMessage};
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::player::Player;
use crate::role::{RoleGroup, RoleKind};

/// One faction's membership and tonight's kill vote.
#[derive(Debug, Clone)]
pub struct Faction {
    group: RoleGroup,
    members: Vec<Seat>,
    /// voter → choice (`None` abstains). Cleared every night.
    votes: BTreeMap<Seat, Option<Seat>>,
}

impl Faction {
    pub fn new(group: RoleGroup) -> Self {
        Self {
            group,
            members: Vec::new(),
            votes: BTreeMap::new(),
        }
    }

    pub fn group(&self) -> RoleGroup {
        self.group
    }

    /// Member seats in seat order.
    pub fn members(&self) -> &[Seat] {
        &self.members
    }

    pub fn is_member(&self, seat: Seat) -> bool {
        self.members.contains(&seat)
    }

    /// Register every living player whose role belongs to this group.
    /// Returns how many members were found.
    pub fn find_members(&mut self, players: &[Player]) -> usize {
        self.members = players
            .iter()
            .filter(|p| p.is_alive() && p.group() == Some(self.group))
            .map(Player::seat)
            .collect();
        self.members.len()
    }

    /// Point each member's role at this faction and introduce the members
    /// to each other.
    pub fn initialize_members(&self, players: &mut [Player], dispatcher: &dyn Dispatcher) {
        for seat in &self.members {
            if let Some(role) = players.get_mut(seat.0).and_then(Player::role_mut) {
                role.set_faction(Some(self.group));
            }
        }

        for &to in &self.members {
            for &about in &self.members {
                if to == about {
                    continue;
                }
                let (Some(recipient), Some(member)) = (players.get(to.0), players.get(about.0))
                else {
                    continue;
                };
                let Some(role) = member.role() else { continue };
                dispatcher.send_player_message(
                    recipient.id(),
                    ServerMessage::FactionRoleUpdated {
                        name: member.name().to_owned(),
                        role: role.name().to_owned(),
                    },
                );
            }
        }
    }

    /// Send `message` to every living member.
    pub fn send_message(&self, players: &[Player], dispatcher: &dyn Dispatcher, message: &ServerMessage) {
        for player in self.living_members(players) {
            dispatcher.send_player_message(player.id(), message.clone());
        }
    }

    /// Drop members who died or no longer belong to the group.
    /// Returns the removed seats.
    pub fn remove_members(&mut self, players: &[Player]) -> Vec<Seat> {
        let group = self.group;
        let (keep, removed): (Vec<Seat>, Vec<Seat>) = self.members.iter().partition(|seat| {
            players
                .get(seat.0)
                .is_some_and(|p| p.is_alive() && p.group() == Some(group))
        });
        self.members = keep;
        for seat in &removed {
            self.votes.remove(seat);
        }
        if !removed.is_empty() {
            debug!(group = %self.group, ?removed, "faction members removed");
        }
        removed
    }

    /// Record (or replace) `voter`'s choice for tonight's kill.
    pub fn cast_vote(&mut self, voter: Seat, target: Option<Seat>) {
        self.votes.insert(voter, target);
    }

    #[cfg(test)]
    fn vote_of(&self, voter: Seat) -> Option<Option<Seat>> {
        self.votes.get(&voter).copied()
    }

    pub fn clear_votes(&mut self) {
        self.votes.clear();
    }

    /// The plurality choice among living voters; ties go to the lowest seat.
    pub fn plurality_target(&self, players: &[Player]) -> Option<Seat> {
        let mut tally: BTreeMap<Seat, u32> = BTreeMap::new();
        for (voter, choice) in &self.votes {
            let voter_alive = players.get(voter.0).is_some_and(Player::is_alive);
            let Some(target) = choice else { continue };
            let target_alive = players.get(target.0).is_some_and(Player::is_alive);
            if voter_alive && target_alive && self.is_member(*voter) {
                *tally.entry(*target).or_default() += 1;
            }
        }
        // BTreeMap iterates in seat order, so the first maximum wins ties.
        tally
            .into_iter()
            .fold(None, |best: Option<(Seat, u32)>, (seat, count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((seat, count)),
            })
            .map(|(seat, _)| seat)
    }

    /// Who carries out the kill: the lowest-seated living Mafioso, else the
    /// lowest-seated living voting member.
    pub fn executor(&self, players: &[Player]) -> Option<Seat> {
        let living: Vec<&Player> = self.living_members(players).collect();
        living
            .iter()
            .find(|p| p.role_kind() == Some(RoleKind::Mafioso))
            .or_else(|| {
                living
                    .iter()
                    .find(|p| p.role_kind().is_some_and(RoleKind::has_night_vote))
            })
            .map(|p| p.seat())
    }

    /// Tonight's kill as `(executor, target)`, if the faction agreed on one.
    pub fn kill_plan(&self, players: &[Player]) -> Option<(Seat, Seat)> {
        let target = self.plurality_target(players)?;
        let executor = self.executor(players)?;
        Some((executor, target))
    }

    fn living_members<'p>(&self, players: &'p [Player]) -> impl Iterator<Item = &'p Player> {
        self.members
            .iter()
            .filter_map(move |seat| players.get(seat.0))
            .filter(|p| p.is_alive())
    }
}
