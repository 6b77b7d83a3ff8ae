//! A participant in a room.

use nightfall_protocol::{PlayerId, PlayerSummary, Seat};

use crate::role::{Role, RoleGroup, RoleKind, TargetView};

/// One connection's seat at the table.
///
/// Players are created on join (before the game starts) and keep their
/// seat for the whole game. A player who leaves mid-game stays in the list,
/// dead and disconnected, so seat numbers never shift under a running game.
#[derive(Debug, Clone)]
pub struct Player {
    id: PlayerId,
    name: String,
    seat: Seat,
    alive: bool,
    connected: bool,
    has_voted: bool,
    /// Who this player's day vote went to, if anyone.
    ballot: Option<Seat>,
    votes_received: u32,
    role: Option<Role>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, seat: Seat) -> Self {
        Self {
            id,
            name: name.into(),
            seat,
            alive: true,
            connected: true,
            has_voted: false,
            ballot: None,
            votes_received: 0,
            role: None,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    pub fn votes_received(&self) -> u32 {
        self.votes_received
    }

    /// The assigned role. `None` until the game starts.
    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    pub fn role_mut(&mut self) -> Option<&mut Role> {
        self.role.as_mut()
    }

    pub fn role_kind(&self) -> Option<RoleKind> {
        self.role.as_ref().map(Role::kind)
    }

    pub fn group(&self) -> Option<RoleGroup> {
        self.role.as_ref().map(Role::group)
    }

    /// The view a night-action validator gets of this player.
    pub fn target_view(&self) -> TargetView {
        TargetView {
            seat: self.seat,
            is_alive: self.alive,
            group: self.group(),
        }
    }

    /// Public row for a `player-list-snapshot`.
    ///
    /// Roles are only shown for the dead, or for everyone when `reveal_all`.
    pub fn summary(&self, started: bool, reveal_all: bool) -> PlayerSummary {
        let role = if reveal_all || !self.alive {
            self.role.as_ref().map(|r| r.name().to_owned())
        } else {
            None
        };
        PlayerSummary {
            name: self.name.clone(),
            is_alive: started.then_some(self.alive),
            role,
        }
    }

    pub(crate) fn assign_role(&mut self, role: Role) {
        self.role = Some(role);
    }

    pub(crate) fn set_seat(&mut self, seat: Seat) {
        self.seat = seat;
    }

    pub(crate) fn kill(&mut self) {
        self.alive = false;
        self.has_voted = false;
        if let Some(role) = self.role.as_mut() {
            role.clear_visit();
        }
    }

    pub(crate) fn disconnect(&mut self) {
        self.connected = false;
    }

    pub(crate) fn record_vote_cast(&mut self, target: Option<Seat>) {
        self.has_voted = true;
        self.ballot = target;
    }

    /// Take back today's vote, returning the seat it counted for.
    pub(crate) fn withdraw_ballot(&mut self) -> Option<Seat> {
        self.ballot.take()
    }

    pub(crate) fn add_vote(&mut self) {
        self.votes_received += 1;
    }

    pub(crate) fn remove_vote(&mut self) {
        self.votes_received = self.votes_received.saturating_sub(1);
    }

    pub(crate) fn reset_votes(&mut self) {
        self.has_voted = false;
        self.ballot = None;
        self.votes_received = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_is_alive_without_role() {
        let player = Player::new(PlayerId(1), "ada", Seat(0));
        assert!(player.is_alive());
        assert!(player.is_connected());
        assert!(player.role().is_none());
        assert_eq!(player.group(), None);
    }

    #[test]
    fn test_summary_hides_living_roles() {
        let mut player = Player::new(PlayerId(1), "ada", Seat(0));
        player.assign_role(Role::new(RoleKind::Doctor));

        let summary = player.summary(true, false);
        assert_eq!(summary.is_alive, Some(true));
        assert_eq!(summary.role, None);

        player.kill();
        let summary = player.summary(true, false);
        assert_eq!(summary.is_alive, Some(false));
        assert_eq!(summary.role.as_deref(), Some("Doctor"));
    }

    #[test]
    fn test_pre_game_summary_has_name_only() {
        let player = Player::new(PlayerId(1), "ada", Seat(0));
        let summary = player.summary(false, false);
        assert_eq!(summary.is_alive, None);
        assert_eq!(summary.role, None);
    }

    #[test]
    fn test_votes_reset() {
        let mut player = Player::new(PlayerId(1), "ada", Seat(0));
        player.add_vote();
        player.add_vote();
        player.record_vote_cast(Some(Seat(3)));
        assert_eq!(player.votes_received(), 2);
        assert!(player.has_voted());

        player.reset_votes();
        assert_eq!(player.votes_received(), 0);
        assert!(!player.has_voted());
        assert_eq!(player.withdraw_ballot(), None);
    }

    #[test]
    fn test_withdrawn_ballot_is_returned_once() {
        let mut player = Player::new(PlayerId(1), "ada", Seat(0));
        player.record_vote_cast(Some(Seat(2)));
        assert_eq!(player.withdraw_ballot(), Some(Seat(2)));
        assert_eq!(player.withdraw_ballot(), None);

        let mut target = Player::new(PlayerId(2), "bob", Seat(2));
        target.remove_vote();
        assert_eq!(target.votes_received(), 0);
    }
}
