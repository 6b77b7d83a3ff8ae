//! Room manager: creates, tracks, and routes players to rooms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use nightfall_engine::GameConfig;
use nightfall_protocol::{ClientMessage, PlayerId, RoomId, Seat};
use tracing::{debug, info};

use crate::room::spawn_room;
use crate::{PlayerSender, RoomConfig, RoomError, RoomHandle, RoomInfo};

/// Counter for generating unique room IDs.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Manages all active rooms and tracks which player is in which room.
///
/// This is the entry point for room operations from the server's
/// connection handlers.
#[derive(Debug)]
pub struct RoomManager {
    /// Rules for rooms created without an explicit config.
    game: GameConfig,
    room: RoomConfig,

    /// Active rooms, keyed by room ID.
    rooms: HashMap<RoomId, RoomHandle>,

    /// Maps each player to the room they're currently in.
    /// A player can be in at most ONE room at a time.
    player_rooms: HashMap<PlayerId, RoomId>,
}

impl RoomManager {
    pub fn new(game: GameConfig, room: RoomConfig) -> Self {
        Self {
            game,
            room,
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
        }
    }

    /// The rules new rooms are created with.
    pub fn game_config(&self) -> &GameConfig {
        &self.game
    }

    /// Creates a new room with the default rules and returns its ID.
    pub fn create_room(&mut self) -> RoomId {
        self.create_room_with(self.game.clone())
    }

    /// Creates a new room running `game` and returns its ID.
    pub fn create_room_with(&mut self, game: GameConfig) -> RoomId {
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_room(room_id, game, &self.room);
        self.rooms.insert(room_id, handle);
        info!(%room_id, "room created");
        room_id
    }

    /// Seats a player in a specific room.
    ///
    /// Enforces the "one room at a time" invariant.
    pub async fn join_room(
        &mut self,
        player_id: PlayerId,
        room_id: RoomId,
        username: &str,
        sender: PlayerSender,
    ) -> Result<Seat, RoomError> {
        self.ensure_roomless(player_id, Some(room_id))?;

        let handle = self
            .rooms
            .get(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        let seat = handle.join(player_id, username, sender).await?;
        self.player_rooms.insert(player_id, room_id);
        Ok(seat)
    }

    /// Removes a player from their current room.
    ///
    /// The player is forgotten even if the room already stopped. A room
    /// that shut down because this was its last player is forgotten too.
    pub async fn leave_room(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        let room_id = self.player_rooms.remove(&player_id).ok_or_else(|| {
            RoomError::InvalidState(format!("player {player_id} is not in any room"))
        })?;
        let Some(handle) = self.rooms.get(&room_id).cloned() else {
            return Ok(());
        };

        let result = match handle.leave(player_id).await {
            Err(RoomError::Unavailable(_)) => Ok(()),
            other => other,
        };
        // The actor answers the leave before it stops, so a stopped room
        // shows up on the next request.
        if handle.get_info().await.is_err() {
            self.forget_room(room_id);
        }
        result
    }

    /// Routes client input from a player to their current room.
    pub async fn route_message(
        &self,
        player_id: PlayerId,
        msg: ClientMessage,
    ) -> Result<(), RoomError> {
        let handle = self.handle_for(player_id)?;
        handle.send_message(player_id, msg).await
    }

    /// The handle of the room a player is in.
    ///
    /// Connection handlers cache this so routine input does not go
    /// through the manager.
    pub fn handle_for(&self, player_id: PlayerId) -> Result<&RoomHandle, RoomError> {
        let room_id = self.player_rooms.get(&player_id).ok_or_else(|| {
            RoomError::InvalidState(format!("player {player_id} is not in any room"))
        })?;
        self.rooms
            .get(room_id)
            .ok_or(RoomError::NotFound(*room_id))
    }

    /// Returns info about a specific room.
    pub async fn get_room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        let handle = self
            .rooms
            .get(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        handle.get_info().await
    }

    /// Shuts down a room and removes all its players from the index.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        let _ = handle.shutdown().await;
        self.player_rooms.retain(|_, rid| *rid != room_id);

        info!(%room_id, "room destroyed");
        Ok(())
    }

    fn forget_room(&mut self, room_id: RoomId) {
        if self.rooms.remove(&room_id).is_some() {
            self.player_rooms.retain(|_, rid| *rid != room_id);
            info!(%room_id, "room closed");
        }
    }

    /// Returns the room ID a player is currently in, if any.
    pub fn player_room(&self, player_id: &PlayerId) -> Option<RoomId> {
        self.player_rooms.get(player_id).copied()
    }

    /// Lists all rooms that are currently joinable.
    ///
    /// Queries each room actor for its current info. Rooms that fail
    /// to respond (e.g., shutting down) are silently skipped.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if let Ok(info) = handle.get_info().await {
                if info.state.is_joinable() {
                    infos.push(info);
                }
            }
        }
        infos.sort_by_key(|info| info.room_id);
        infos
    }

    /// Returns cloned handles to all active rooms.
    pub fn room_handles(&self) -> Vec<RoomHandle> {
        self.rooms.values().cloned().collect()
    }

    /// Seats a player in the oldest room with a free seat, or in a new
    /// room when none will take them.
    ///
    /// A room that refuses the player (the name is taken there, or it
    /// filled up since it was queried) is skipped.
    pub async fn join_or_create(
        &mut self,
        player_id: PlayerId,
        username: &str,
        sender: PlayerSender,
    ) -> Result<(RoomId, Seat), RoomError> {
        self.ensure_roomless(player_id, None)?;
        self.prune();

        let mut candidates: Vec<RoomId> = self.rooms.keys().copied().collect();
        candidates.sort();
        for room_id in candidates {
            let Some(handle) = self.rooms.get(&room_id) else {
                continue;
            };
            let Ok(info) = handle.get_info().await else {
                continue;
            };
            if !info.has_free_seat() {
                continue;
            }
            match handle.join(player_id, username, sender.clone()).await {
                Ok(seat) => {
                    self.player_rooms.insert(player_id, room_id);
                    return Ok((room_id, seat));
                }
                Err(e) => debug!(%room_id, %player_id, error = %e, "room refused player"),
            }
        }

        let room_id = self.create_room();
        match self.join_room(player_id, room_id, username, sender).await {
            Ok(seat) => Ok((room_id, seat)),
            Err(e) => {
                // Nobody else knows about this room yet.
                let _ = self.destroy_room(room_id).await;
                Err(e)
            }
        }
    }

    /// Forgets rooms whose actor has stopped, and the players in them.
    /// Returns how many rooms were dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|room_id, handle| {
            let closed = handle.is_closed();
            if closed {
                debug!(%room_id, "forgetting stopped room");
            }
            !closed
        });
        let rooms = &self.rooms;
        self.player_rooms.retain(|_, room_id| rooms.contains_key(room_id));
        before - self.rooms.len()
    }

    /// Returns the number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Lists all active room IDs.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }

    fn ensure_roomless(&self, player_id: PlayerId, target: Option<RoomId>) -> Result<(), RoomError> {
        match self.player_rooms.get(&player_id) {
            None => Ok(()),
            Some(&current) if Some(current) == target => {
                Err(RoomError::AlreadyInRoom(player_id, current))
            }
            Some(current) => Err(RoomError::InvalidState(format!(
                "player {player_id} is already in room {current}"
            ))),
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(GameConfig::default(), RoomConfig::default())
    }
}
