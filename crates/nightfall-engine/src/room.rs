//! One game instance.
//!
//! A [`Room`] owns everything a game needs: the players, the factions, the
//! phase machine, the win conditions, the event bus, and the random source.
//! It is synchronous and single-owner; the room actor in `nightfall-room`
//! wraps it in a task and feeds it client input and timer expiries.
//!
//! All output goes through the injected [`Dispatcher`]. Invalid input is
//! answered with a direct message and otherwise ignored, so no client can
//! take a room down.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use nightfall_protocol::{
    ClientMessage, Phase, PlayerId, PlayerSummary, RoomId, Seat, ServerMessage,
};
use nightfall_timer::{PhaseTimer, TimerConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::{GameConfig, RoomState};
use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::event_bus::{EventBus, EventKind, GameEvent};
use crate::faction::Faction;
use crate::night::{NightReport, NightResolution};
use crate::player::Player;
use crate::role::{Role, RoleGroup, RoleKind, VisitChange};
use crate::state::{GameStateManager, PhaseDurations, PhaseSnapshot};
use crate::win::{WinConditionManager, WinContext, Winner};

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// Chat and whisper text beyond this many characters is cut off.
pub const MAX_CHAT_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeathCause {
    Night,
    VotedOut,
    Left,
}

impl DeathCause {
    fn as_str(self) -> &'static str {
        match self {
            Self::Night => "night",
            Self::VotedOut => "voted-out",
            Self::Left => "left",
        }
    }

    fn announcement(self, name: &str) -> String {
        match self {
            Self::Night => format!("{name} was killed during the night."),
            Self::VotedOut => format!("{name} was voted out by the town."),
            Self::Left => format!("{name} left the game."),
        }
    }
}

pub struct Room {
    id: RoomId,
    config: GameConfig,
    lifecycle: RoomState,
    players: Vec<Player>,
    factions: Vec<Faction>,
    state: GameStateManager,
    wins: WinConditionManager,
    events: EventBus,
    rng: StdRng,
    dispatcher: Arc<dyn Dispatcher>,
    jester_voted_out: Arc<Mutex<Option<Seat>>>,
    /// Day number of the last night that was resolved.
    night_resolved: Option<u32>,
    last_night: Option<NightReport>,
    winner: Option<Winner>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("lifecycle", &self.lifecycle)
            .field("players", &self.players.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Room {
    pub fn new(
        id: RoomId,
        config: GameConfig,
        timer: TimerConfig,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let config = config.validated();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let jester_voted_out = Arc::new(Mutex::new(None));
        let mut events = EventBus::new();
        let flag = Arc::clone(&jester_voted_out);
        events.subscribe(EventKind::PlayerVotedOut, move |event: &GameEvent| {
            if event.payload["role"] != RoleKind::Jester.name() {
                return;
            }
            if let Some(seat) = event.payload["seat"].as_u64() {
                *flag.lock().unwrap_or_else(PoisonError::into_inner) = Some(Seat(seat as usize));
            }
        });

        Self {
            id,
            state: GameStateManager::new(PhaseDurations::from_config(&config), timer),
            config,
            lifecycle: RoomState::WaitingForPlayers,
            players: Vec::new(),
            factions: Vec::new(),
            wins: WinConditionManager::with_defaults(),
            events,
            rng,
            dispatcher,
            jester_voted_out,
            night_resolved: None,
            last_night: None,
            winner: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> RoomState {
        self.lifecycle
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, seat: Seat) -> Option<&Player> {
        self.players.get(seat.0)
    }

    /// Seat of a connected player.
    pub fn seat_of(&self, id: PlayerId) -> Option<Seat> {
        self.players
            .iter()
            .find(|p| p.id() == id && p.is_connected())
            .map(Player::seat)
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_connected()).count()
    }

    pub fn factions(&self) -> &[Faction] {
        &self.factions
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn day_number(&self) -> u32 {
        self.state.day_number()
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> &GameStateManager {
        &self.state
    }

    /// The phase timer, for the owner's event loop.
    pub fn timer_mut(&mut self) -> &mut PhaseTimer {
        self.state.timer_mut()
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn win_conditions_mut(&mut self) -> &mut WinConditionManager {
        &mut self.wins
    }

    /// The board and notices of the most recently resolved night.
    pub fn last_night_report(&self) -> Option<&NightReport> {
        self.last_night.as_ref()
    }

    pub fn winner(&self) -> Option<&Winner> {
        self.winner.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.lifecycle, RoomState::Finished | RoomState::Destroying)
    }

    pub fn jester_voted_out(&self) -> Option<Seat> {
        *self
            .jester_voted_out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Joining, leaving, starting
    // -----------------------------------------------------------------------

    /// Seat a new player. Starts the game once `min_players` is reached.
    pub fn join(&mut self, id: PlayerId, username: &str) -> Result<Seat, EngineError> {
        if !self.lifecycle.is_joinable() {
            return Err(EngineError::GameInProgress);
        }
        if self.seat_of(id).is_some() {
            return Err(EngineError::AlreadyJoined(id));
        }
        let name = username.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(EngineError::InvalidName(format!(
                "names must be 1 to {MAX_NAME_LEN} characters"
            )));
        }
        if self
            .players
            .iter()
            .any(|p| p.name().eq_ignore_ascii_case(name))
        {
            return Err(EngineError::NameTaken(name.to_owned()));
        }
        if self.players.len() >= self.config.max_players {
            return Err(EngineError::RoomFull(self.config.max_players));
        }

        let seat = Seat(self.players.len());
        self.players.push(Player::new(id, name, seat));
        info!(room_id = %self.id, player_id = %id, %seat, name, "player joined");

        self.broadcast(ServerMessage::NewPlayerJoined {
            player: name.to_owned(),
        });
        self.send(
            id,
            ServerMessage::PlayerListSnapshot {
                players: self.summaries(false),
            },
        );

        if self.players.len() >= self.config.min_players {
            self.start_game()?;
        }
        Ok(seat)
    }

    /// Remove a player. Pre-game the seat is freed; mid-game the player
    /// dies and stays in the list.
    pub fn leave(&mut self, id: PlayerId) -> Result<(), EngineError> {
        let seat = self.seat_of(id).ok_or(EngineError::UnknownPlayer(id))?;

        if self.lifecycle.is_joinable() {
            let player = self.players.remove(seat.0);
            for (i, p) in self.players.iter_mut().enumerate() {
                p.set_seat(Seat(i));
            }
            info!(room_id = %self.id, player_id = %id, "player left before start");
            self.broadcast(ServerMessage::PlayerRemoved {
                player: player.name().to_owned(),
            });
        } else {
            let name = self.players[seat.0].name().to_owned();
            self.players[seat.0].disconnect();
            info!(room_id = %self.id, player_id = %id, %seat, "player left mid-game");
            if self.lifecycle.is_active() {
                self.kill_player(seat, DeathCause::Left);
            }
            self.broadcast(ServerMessage::PlayerRemoved { player: name });
            if self.lifecycle.is_active() && !self.check_for_winner() {
                self.end_day_early_if_all_voted();
            }
        }

        if self.connected_count() == 0 && self.lifecycle != RoomState::Destroying {
            info!(room_id = %self.id, "room empty");
            self.state.finish();
            self.set_lifecycle(RoomState::Destroying);
        }
        Ok(())
    }

    /// Deal roles from the configured list (shuffled) and start Day 1.
    pub fn start_game(&mut self) -> Result<(), EngineError> {
        if !self.lifecycle.is_joinable() {
            return Err(EngineError::GameInProgress);
        }
        if self.players.len() < self.config.min_players {
            return Err(EngineError::NotEnoughPlayers {
                have: self.players.len(),
                need: self.config.min_players,
            });
        }
        let mut roles = self.config.roles_for(self.players.len());
        roles.shuffle(&mut self.rng);
        self.deal(roles);
        Ok(())
    }

    /// Deal `roles` to seats in order, unshuffled, and start immediately
    /// regardless of `min_players`. Missing roles are Villagers.
    pub fn start_with_roles(&mut self, roles: &[RoleKind]) -> Result<(), EngineError> {
        if !self.lifecycle.is_joinable() {
            return Err(EngineError::GameInProgress);
        }
        if self.players.is_empty() {
            return Err(EngineError::NotEnoughPlayers { have: 0, need: 1 });
        }
        let mut roles = roles.to_vec();
        roles.resize(self.players.len(), RoleKind::Villager);
        self.deal(roles);
        Ok(())
    }

    fn deal(&mut self, roles: Vec<RoleKind>) {
        if !self.set_lifecycle(RoomState::Starting) {
            return;
        }
        for (player, kind) in self.players.iter_mut().zip(roles) {
            player.assign_role(Role::new(kind));
        }

        let groups: BTreeSet<RoleGroup> = self
            .players
            .iter()
            .filter_map(Player::group)
            .filter(|g| g.forms_faction())
            .collect();
        for group in groups {
            let mut faction = Faction::new(group);
            faction.find_members(&self.players);
            faction.initialize_members(&mut self.players, self.dispatcher.as_ref());
            self.factions.push(faction);
        }

        for player in &self.players {
            if let Some(role) = player.role() {
                self.dispatcher
                    .send_player_message(player.id(), role.assignment(player.name()));
            }
        }
        self.broadcast(ServerMessage::PlayerListSnapshot {
            players: self.summaries(false),
        });

        self.set_lifecycle(RoomState::InProgress);
        info!(room_id = %self.id, players = self.players.len(), "game started");
        self.publish(
            EventKind::GameStarted,
            json!({ "players": self.players.len() }),
        );
        self.advance_phase();
    }

    // -----------------------------------------------------------------------
    // Client input
    // -----------------------------------------------------------------------

    /// Route one client message.
    pub fn handle_message(&mut self, sender: PlayerId, message: ClientMessage) {
        let Some(seat) = self.seat_of(sender) else {
            warn!(room_id = %self.id, player_id = %sender, "message from unknown player");
            return;
        };
        debug!(room_id = %self.id, %seat, ?message, "client message");

        match message {
            ClientMessage::JoinRoom { .. } => self.send_text(sender, "You are already in a room."),
            ClientMessage::Disconnect => {
                if let Err(e) = self.leave(sender) {
                    debug!(room_id = %self.id, error = %e, "leave failed");
                }
            }
            ClientMessage::ChatMessage { message, is_day } => self.chat(seat, &message, is_day),
            ClientMessage::CastVote { recipient, is_day } => {
                self.cast_vote(seat, recipient, is_day)
            }
            ClientMessage::SubmitNightVisit { recipient, is_day } => {
                self.submit_night_visit(seat, recipient, is_day)
            }
            ClientMessage::Whisper {
                recipient,
                message,
                is_day,
            } => self.whisper(seat, recipient, &message, is_day),
        }
    }

    /// Public chat by day (and between phases), faction chat at night.
    pub fn chat(&mut self, seat: Seat, message: &str, is_day: bool) {
        let Some(text) = clean_text(message) else { return };
        let Some(player) = self.players.get(seat.0) else { return };
        let (id, name, alive) = (player.id(), player.name().to_owned(), player.is_alive());

        match self.lifecycle {
            RoomState::WaitingForPlayers => {
                self.broadcast(ServerMessage::ChatMessage {
                    message: format!("{name}: {text}"),
                });
                return;
            }
            RoomState::InProgress => {}
            _ => {
                self.send_text(id, "You cannot speak right now.");
                return;
            }
        }
        if !alive {
            self.send_text(id, "You are dead.");
            self.send(id, ServerMessage::MessagesBlocked);
            return;
        }

        match (self.state.phase(), is_day) {
            (Phase::Day, true) | (Phase::Between, _) => {
                self.broadcast(ServerMessage::ChatMessage {
                    message: format!("{name}: {text}"),
                });
            }
            (Phase::Night, false) => match self.faction_of(seat) {
                Some(faction) => faction.send_message(
                    &self.players,
                    self.dispatcher.as_ref(),
                    &ServerMessage::ChatMessage {
                        message: format!("[{}] {name}: {text}", faction.group()),
                    },
                ),
                None => self.send_text(id, "You cannot speak at night."),
            },
            _ => self.send_text(id, "You cannot speak right now."),
        }
    }

    /// Day vote, or faction kill vote at night.
    pub fn cast_vote(&mut self, seat: Seat, recipient: Option<Seat>, is_day: bool) {
        let Some(id) = self.acting_player(seat) else { return };
        match (self.state.phase(), is_day) {
            (Phase::Day, true) => self.day_vote(seat, id, recipient),
            (Phase::Night, false) => self.faction_vote(seat, id, recipient),
            _ => self.send_text(id, "You cannot do that right now."),
        }
    }

    /// Choose (or clear) the target of the player's own night ability.
    pub fn submit_night_visit(&mut self, seat: Seat, recipient: Option<Seat>, is_day: bool) {
        let Some(id) = self.acting_player(seat) else { return };
        if self.state.phase() != Phase::Night || is_day {
            self.send_text(id, "You cannot do that right now.");
            return;
        }

        let view = recipient
            .and_then(|r| self.players.get(r.0))
            .map(Player::target_view);
        let Some(role) = self.players.get_mut(seat.0).and_then(Player::role_mut) else {
            return;
        };

        match role.handle_night_action(seat, recipient, view) {
            Ok(VisitChange::Visiting(target)) => {
                let target_name = self.name_of(target);
                self.send_text(id, &format!("You will visit {target_name} tonight."));
                self.send(id, ServerMessage::PlayerVisitUpdated);
                self.publish(
                    EventKind::VisitSubmitted,
                    json!({ "seat": seat, "target": target }),
                );
            }
            Ok(VisitChange::StayingHome) => {
                self.send_text(id, "You will stay home tonight.");
                self.send(id, ServerMessage::PlayerVisitUpdated);
                self.publish(
                    EventKind::VisitSubmitted,
                    json!({ "seat": seat, "target": Value::Null }),
                );
            }
            Err(rejected) => {
                debug!(room_id = %self.id, %seat, %rejected, "night visit rejected");
                self.send_text(id, &rejected.to_string());
            }
        }
    }

    /// A private day message to one living player.
    pub fn whisper(&mut self, seat: Seat, recipient: Seat, message: &str, is_day: bool) {
        let Some(id) = self.acting_player(seat) else { return };
        if self.state.phase() != Phase::Day || !is_day {
            self.send_text(id, "You can only whisper during the day.");
            return;
        }
        let Some(text) = clean_text(message) else { return };
        if recipient == seat {
            self.send_text(id, "You cannot whisper to yourself.");
            return;
        }
        let Some(target) = self.players.get(recipient.0).filter(|p| p.is_alive()) else {
            self.send_text(id, "Invalid choice.");
            return;
        };
        let target_id = target.id();
        let to = target.name().to_owned();
        let from = self.name_of(seat);

        self.send(
            target_id,
            ServerMessage::WhisperMessage {
                message: format!("{from} whispers: {text}"),
            },
        );
        self.send(
            id,
            ServerMessage::WhisperMessage {
                message: format!("You whisper to {to}: {text}"),
            },
        );
        self.broadcast(ServerMessage::GenericMessage {
            message: format!("{from} is whispering to {to}."),
        });
    }

    fn day_vote(&mut self, seat: Seat, id: PlayerId, recipient: Option<Seat>) {
        if self.players[seat.0].has_voted() {
            self.send_text(id, "You have already voted today.");
            return;
        }
        let name = self.name_of(seat);

        let announcement = match recipient {
            None => format!("{name} abstained."),
            Some(target) if target == seat => {
                self.send_text(id, "You cannot vote for yourself.");
                return;
            }
            Some(target) => {
                let Some(voted) = self.players.get_mut(target.0).filter(|p| p.is_alive()) else {
                    self.send_text(id, "Invalid choice.");
                    return;
                };
                voted.add_vote();
                format!("{name} voted for {}.", voted.name())
            }
        };

        self.players[seat.0].record_vote_cast(recipient);
        self.broadcast(ServerMessage::GenericMessage {
            message: announcement,
        });
        self.end_day_early_if_all_voted();
    }

    fn faction_vote(&mut self, seat: Seat, id: PlayerId, recipient: Option<Seat>) {
        let can_vote = self.players[seat.0]
            .role_kind()
            .is_some_and(RoleKind::has_night_vote);
        let Some(index) = self.factions.iter().position(|f| f.is_member(seat)) else {
            self.send_text(id, "You have no night vote.");
            return;
        };
        if !can_vote {
            self.send_text(id, "You have no night vote.");
            return;
        }

        let name = self.name_of(seat);
        let relay = match recipient {
            None => format!("{name} abstains from tonight's kill."),
            Some(target) => {
                let Some(victim) = self.players.get(target.0).filter(|p| p.is_alive()) else {
                    self.send_text(id, "Invalid choice.");
                    return;
                };
                if self.factions[index].is_member(target) {
                    self.send_text(id, "You cannot target a member of your faction.");
                    return;
                }
                format!("{name} votes to kill {}.", victim.name())
            }
        };

        let faction = &mut self.factions[index];
        faction.cast_vote(seat, recipient);
        faction.send_message(
            &self.players,
            self.dispatcher.as_ref(),
            &ServerMessage::GenericMessage { message: relay },
        );
    }

    // -----------------------------------------------------------------------
    // Phase flow
    // -----------------------------------------------------------------------

    /// Move to the next phase: on timer expiry, or early when everyone
    /// voted. Ending a Day resolves the vote; ending a Night resolves the
    /// night. Returns the new phase, or `None` if nothing moved (game not
    /// running, or it just ended).
    pub fn advance_phase(&mut self) -> Option<PhaseSnapshot> {
        if self.lifecycle != RoomState::InProgress {
            return None;
        }
        let next = match self.state.phase() {
            Phase::Day => {
                self.end_day();
                Phase::Between
            }
            Phase::Night => {
                self.end_night();
                Phase::Between
            }
            Phase::Between => self.state.next_phase(),
            Phase::Locked => return None,
        };
        if self.winner.is_some() {
            return None;
        }

        let snapshot = match self.state.transition(next) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(room_id = %self.id, error = %e, "phase advance refused");
                return None;
            }
        };
        match next {
            Phase::Day => self.begin_day(),
            Phase::Night => self.begin_night(),
            _ => {}
        }

        info!(
            room_id = %self.id,
            phase = %snapshot.phase,
            day = snapshot.day_number,
            "phase changed"
        );
        self.broadcast(snapshot.to_message());
        self.publish(
            EventKind::PhaseChanged,
            json!({ "phase": snapshot.phase, "dayNumber": snapshot.day_number }),
        );

        if next == Phase::Day && self.check_for_winner() {
            return None;
        }
        Some(snapshot)
    }

    fn begin_day(&mut self) {
        for player in &mut self.players {
            player.reset_votes();
        }
    }

    fn begin_night(&mut self) {
        for role in self.players.iter_mut().filter_map(Player::role_mut) {
            role.clear_visit();
        }
        for faction in &mut self.factions {
            faction.clear_votes();
        }
    }

    fn end_day_early_if_all_voted(&mut self) {
        if self.lifecycle != RoomState::InProgress || self.state.phase() != Phase::Day {
            return;
        }
        let mut living = self.players.iter().filter(|p| p.is_alive()).peekable();
        if living.peek().is_some() && living.all(Player::has_voted) {
            info!(room_id = %self.id, "everyone voted, ending day early");
            self.advance_phase();
        }
    }

    fn end_day(&mut self) {
        self.broadcast(ServerMessage::VotingDisabled);

        let living = self.players.iter().filter(|p| p.is_alive()).count() as u32;
        let voted_out = self
            .players
            .iter()
            .filter(|p| p.is_alive())
            .find(|p| p.votes_received() * 2 > living)
            .map(Player::seat);

        match voted_out {
            Some(seat) => {
                let role = self.players[seat.0].role().map_or("", |r| r.name());
                let payload = json!({
                    "seat": seat,
                    "name": self.players[seat.0].name(),
                    "role": role,
                });
                self.kill_player(seat, DeathCause::VotedOut);
                self.publish(EventKind::PlayerVotedOut, payload);
            }
            None => self.broadcast(ServerMessage::GenericMessage {
                message: "The town could not reach a decision.".to_owned(),
            }),
        }
        for player in &mut self.players {
            player.reset_votes();
        }
        self.check_for_winner();
    }

    fn end_night(&mut self) {
        let day = self.state.day_number();
        if self.night_resolved == Some(day) {
            warn!(room_id = %self.id, day, "night already resolved");
            return;
        }
        self.night_resolved = Some(day);
        self.state.lock();

        let kills: Vec<(Seat, Seat)> = self
            .factions
            .iter()
            .filter_map(|f| f.kill_plan(&self.players))
            .collect();
        let report =
            NightResolution::new(&self.players, &self.config, &mut self.rng).resolve(&kills);

        for (seat, notice) in &report.notices {
            self.send_to_seat(*seat, notice);
        }

        let mut deaths = Vec::new();
        for (seat, slot) in report.board.iter() {
            if !self.players.get(seat.0).is_some_and(Player::is_alive) {
                continue;
            }
            if slot.is_lethal() {
                deaths.push(seat);
            } else if slot.was_attacked() {
                self.send_to_seat(seat, "You were attacked tonight, but you survived!");
            }
        }

        if deaths.is_empty() {
            self.broadcast(ServerMessage::GenericMessage {
                message: "Nobody died last night.".to_owned(),
            });
        }
        for &seat in &deaths {
            self.kill_player(seat, DeathCause::Night);
        }
        self.publish(
            EventKind::NightResolved,
            json!({ "day": day, "deaths": deaths }),
        );
        self.last_night = Some(report);

        self.begin_night();
        if let Err(e) = self.state.unlock() {
            warn!(room_id = %self.id, error = %e, "unlock after night failed");
        }
        self.check_for_winner();
    }

    fn kill_player(&mut self, seat: Seat, cause: DeathCause) {
        let Some(player) = self.players.get_mut(seat.0) else { return };
        if !player.is_alive() {
            return;
        }
        let ballot = player.withdraw_ballot();
        player.kill();
        let id = player.id();
        let name = player.name().to_owned();
        let role = player.role().map_or("Unknown", |r| r.name());

        info!(room_id = %self.id, %seat, %name, role, cause = cause.as_str(), "player died");
        self.broadcast(ServerMessage::GenericMessage {
            message: cause.announcement(&name),
        });
        self.broadcast(ServerMessage::RoleUpdated {
            name: name.clone(),
            role: role.to_owned(),
        });
        self.send_text(id, "You have died.");
        self.send(id, ServerMessage::MessagesBlocked);
        self.send(id, ServerMessage::VotingDisabled);
        self.publish(
            EventKind::PlayerDied,
            json!({ "seat": seat, "name": name, "role": role, "cause": cause.as_str() }),
        );
        // the dead don't vote
        if let Some(target) = ballot.and_then(|t| self.players.get_mut(t.0)) {
            target.remove_vote();
        }

        for faction in &mut self.factions {
            faction.remove_members(&self.players);
        }
    }

    /// Evaluate win conditions; ends the game on a winner.
    fn check_for_winner(&mut self) -> bool {
        if self.winner.is_some() {
            return true;
        }
        if self.lifecycle != RoomState::InProgress {
            return false;
        }
        let context = WinContext {
            day_number: self.state.day_number(),
            end_day: self.config.end_day,
            players: &self.players,
            jester_voted_out: self.jester_voted_out(),
        };
        let Some(winner) = self.wins.check_win_conditions(&context) else {
            return false;
        };
        self.finish(winner);
        true
    }

    /// Move the room along its lifecycle. Illegal edges are refused.
    fn set_lifecycle(&mut self, to: RoomState) -> bool {
        if !self.lifecycle.can_transition_to(to) {
            warn!(room_id = %self.id, from = %self.lifecycle, %to, "illegal lifecycle transition");
            return false;
        }
        debug!(room_id = %self.id, from = %self.lifecycle, %to, "lifecycle");
        self.lifecycle = to;
        true
    }

    fn finish(&mut self, winner: Winner) {
        info!(room_id = %self.id, reason = %winner.reason, "game ended");
        self.state.finish();
        self.set_lifecycle(RoomState::Finished);

        self.broadcast(ServerMessage::GenericMessage {
            message: format!("Game over! {}", winner.reason),
        });
        self.broadcast(ServerMessage::PlayerListSnapshot {
            players: self.summaries(true),
        });
        self.publish(
            EventKind::GameEnded,
            json!({ "side": format!("{:?}", winner.side), "reason": winner.reason }),
        );
        self.winner = Some(winner);
        self.dispatcher.disconnect_sockets();
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The id of a living player allowed to act now, or `None` after
    /// telling them why not.
    fn acting_player(&self, seat: Seat) -> Option<PlayerId> {
        let player = self.players.get(seat.0)?;
        if self.lifecycle != RoomState::InProgress {
            self.send_text(player.id(), "You cannot do that right now.");
            return None;
        }
        if !player.is_alive() {
            self.send_text(player.id(), "You are dead.");
            return None;
        }
        Some(player.id())
    }

    fn faction_of(&self, seat: Seat) -> Option<&Faction> {
        self.factions.iter().find(|f| f.is_member(seat))
    }

    fn name_of(&self, seat: Seat) -> String {
        self.players
            .get(seat.0)
            .map_or_else(String::new, |p| p.name().to_owned())
    }

    fn summaries(&self, reveal_all: bool) -> Vec<PlayerSummary> {
        let started = !self.lifecycle.is_joinable();
        self.players
            .iter()
            .map(|p| p.summary(started, reveal_all))
            .collect()
    }

    fn send(&self, id: PlayerId, message: ServerMessage) {
        self.dispatcher.send_player_message(id, message);
    }

    fn send_text(&self, id: PlayerId, text: &str) {
        self.send(
            id,
            ServerMessage::GenericMessage {
                message: text.to_owned(),
            },
        );
    }

    fn send_to_seat(&self, seat: Seat, text: &str) {
        if let Some(player) = self.players.get(seat.0) {
            self.send_text(player.id(), text);
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        self.dispatcher.send_room_message(self.id, message);
    }

    fn publish(&mut self, kind: EventKind, payload: Value) {
        self.events.publish(&GameEvent::new(kind, payload));
    }
}

/// Trim and cap user text. `None` when nothing is left.
fn clean_text(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(MAX_CHAT_LEN).collect())
}
