//! Room actor: an isolated Tokio task that owns one game.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. The actor `select!`s between that channel and
//! the engine's phase timer, so commands and phase changes never race.

use std::sync::Arc;

use nightfall_engine::{
    Dispatcher, EngineError, EventKind, GameConfig, GameEvent, Room, RoomState,
};
use nightfall_protocol::{ClientMessage, Phase, PlayerId, RoomId, Seat};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::{ChannelDispatcher, PlayerSender, RoomConfig, RoomError};

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in some variants is a "reply channel": the
/// caller sends a command and waits for the response on that channel.
pub(crate) enum RoomCommand {
    /// Seat a player.
    Join {
        player_id: PlayerId,
        username: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<Seat, RoomError>>,
    },

    /// Remove a player.
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Deliver client input.
    Message {
        sender: PlayerId,
        msg: ClientMessage,
    },

    /// Request a metadata snapshot.
    GetInfo { reply: oneshot::Sender<RoomInfo> },

    /// Shut down the room.
    Shutdown,
}

/// A snapshot of room metadata (not the game state itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    /// Current lifecycle state.
    pub state: RoomState,
    pub phase: Phase,
    pub day_number: u32,
    /// Players still connected.
    pub player_count: usize,
    pub max_players: usize,
}

impl RoomInfo {
    /// Whether a new player could take a seat right now.
    pub fn has_free_seat(&self) -> bool {
        self.state.is_joinable() && self.player_count < self.max_players
    }
}

/// Handle to a running room actor. Used to send commands to it.
///
/// This is cheap to clone: it's just an `mpsc::Sender` wrapper.
/// The `RoomManager` holds one of these per room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's unique ID.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Asks the room to seat a player under `username`.
    pub async fn join(
        &self,
        player_id: PlayerId,
        username: &str,
        sender: PlayerSender,
    ) -> Result<Seat, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            player_id,
            username: username.to_owned(),
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Sends a leave request to the room.
    pub async fn leave(&self, player_id: PlayerId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Leave {
            player_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Sends client input to the room (fire-and-forget).
    pub async fn send_message(&self, sender: PlayerId, msg: ClientMessage) -> Result<(), RoomError> {
        self.send(RoomCommand::Message { sender, msg }).await
    }

    /// Requests the current room info.
    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id)
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room: Room,
    dispatcher: Arc<ChannelDispatcher>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    fn room_id(&self) -> RoomId {
        self.room.id()
    }

    /// Runs the actor loop until shutdown, or until the last player left.
    async fn run(mut self) {
        info!(room_id = %self.room_id(), "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else {
                        debug!(room_id = %self.room_id(), "all handles dropped");
                        break;
                    };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                expiry = self.room.timer_mut().wait_for_expiry() => {
                    debug!(
                        room_id = %self.room_id(),
                        generation = expiry.generation,
                        "phase deadline expired"
                    );
                    self.room.advance_phase();
                }
            }

            if self.room.lifecycle() == RoomState::Destroying {
                info!(room_id = %self.room_id(), "room empty, shutting down");
                break;
            }
        }

        if !self.dispatcher.is_empty() {
            debug!(
                room_id = %self.room_id(),
                connections = self.dispatcher.len(),
                "closing remaining connections"
            );
        }
        self.dispatcher.disconnect_sockets();
        info!(room_id = %self.room_id(), "room actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                player_id,
                username,
                sender,
                reply,
            } => {
                let result = self.handle_join(player_id, &username, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.handle_leave(player_id);
                let _ = reply.send(result);
            }
            RoomCommand::Message { sender, msg } => self.handle_message(sender, msg),
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                info!(room_id = %self.room_id(), "room shutting down");
                return false;
            }
        }
        true
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        username: &str,
        sender: PlayerSender,
    ) -> Result<Seat, RoomError> {
        let room_id = self.room_id();
        if !self.room.lifecycle().is_joinable() {
            return Err(RoomError::InvalidState(format!(
                "cannot join room in state {}",
                self.room.lifecycle()
            )));
        }
        if self.room.seat_of(player_id).is_some() {
            return Err(RoomError::AlreadyInRoom(player_id, room_id));
        }

        // Registered first so the joiner sees their own join broadcast.
        self.dispatcher.register(player_id, sender);
        match self.room.join(player_id, username) {
            Ok(seat) => {
                debug!(
                    room_id = %self.dispatcher.room_id(),
                    %player_id,
                    connections = self.dispatcher.len(),
                    "player connected"
                );
                Ok(seat)
            }
            Err(e) => {
                self.dispatcher.unregister(player_id);
                debug!(room_id = %room_id, %player_id, error = %e, "join rejected");
                Err(match e {
                    EngineError::RoomFull(_) => RoomError::RoomFull(room_id),
                    EngineError::AlreadyJoined(_) => RoomError::AlreadyInRoom(player_id, room_id),
                    other => other.into(),
                })
            }
        }
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        // After a game ends the channels are already gone; the engine
        // still has to see the leave to empty the room.
        if self.dispatcher.unregister(player_id) {
            debug!(
                room_id = %self.dispatcher.room_id(),
                %player_id,
                connections = self.dispatcher.len(),
                "player disconnected"
            );
        }
        self.room.leave(player_id).map_err(|e| match e {
            EngineError::UnknownPlayer(_) => RoomError::NotInRoom(player_id, self.room.id()),
            other => other.into(),
        })
    }

    fn handle_message(&mut self, sender: PlayerId, msg: ClientMessage) {
        if self.room.seat_of(sender).is_none() {
            debug!(room_id = %self.room_id(), %sender, "message from non-member, ignoring");
            return;
        }
        match msg {
            ClientMessage::Disconnect => {
                if let Err(e) = self.handle_leave(sender) {
                    debug!(room_id = %self.room_id(), %sender, error = %e, "disconnect failed");
                }
            }
            msg => self.room.handle_message(sender, msg),
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id(),
            state: self.room.lifecycle(),
            phase: self.room.phase(),
            day_number: self.room.day_number(),
            player_count: self.room.connected_count(),
            max_players: self.room.config().max_players,
        }
    }
}

/// Mirrors the game's notable events into the log.
fn log_events(room: &mut Room) {
    let room_id = room.id();
    for kind in [
        EventKind::GameStarted,
        EventKind::NightResolved,
        EventKind::PlayerVotedOut,
        EventKind::GameEnded,
    ] {
        room.events_mut().subscribe(kind, move |event: &GameEvent| {
            debug!(%room_id, kind = ?event.kind, payload = %event.payload, "game event");
        });
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// `config.channel_size` controls backpressure: if the channel fills up,
/// senders will wait (bounded channel).
pub(crate) fn spawn_room(room_id: RoomId, game: GameConfig, config: &RoomConfig) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size());

    let dispatcher = Arc::new(ChannelDispatcher::new(room_id));
    let output: Arc<dyn Dispatcher> = dispatcher.clone();
    let mut room = Room::new(room_id, game, config.timer(), output);
    log_events(&mut room);

    let actor = RoomActor {
        room,
        dispatcher,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
