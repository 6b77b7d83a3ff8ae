//! Channel-backed delivery of engine output.
//!
//! Every connected player owns the receiving half of an unbounded channel;
//! a writer task on the connection side drains it onto the socket. The
//! room actor registers the sending half here and hands the dispatcher to
//! its engine [`Room`](nightfall_engine::Room).

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use nightfall_engine::Dispatcher;
use nightfall_protocol::{PlayerId, RoomId, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Channel sender for delivering outbound messages to a player.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

/// A [`Dispatcher`] for one room.
#[derive(Debug)]
pub struct ChannelDispatcher {
    room_id: RoomId,
    senders: Mutex<BTreeMap<PlayerId, PlayerSender>>,
}

impl ChannelDispatcher {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            senders: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Start delivering to `player`. Replaces any previous sender.
    pub fn register(&self, player: PlayerId, sender: PlayerSender) {
        self.senders().insert(player, sender);
    }

    /// Stop delivering to `player`. Returns `true` if it was registered.
    ///
    /// Dropping the sender closes the player's channel once nothing else
    /// holds it, which ends their writer task.
    pub fn unregister(&self, player: PlayerId) -> bool {
        self.senders().remove(&player).is_some()
    }

    pub fn is_registered(&self, player: PlayerId) -> bool {
        self.senders().contains_key(&player)
    }

    pub fn len(&self) -> usize {
        self.senders().len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders().is_empty()
    }

    fn senders(&self) -> MutexGuard<'_, BTreeMap<PlayerId, PlayerSender>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Dispatcher for ChannelDispatcher {
    fn send_player_message(&self, player: PlayerId, message: ServerMessage) {
        match self.senders().get(&player) {
            Some(sender) => {
                if sender.send(message).is_err() {
                    debug!(room_id = %self.room_id, %player, "receiver gone, message dropped");
                }
            }
            None => debug!(room_id = %self.room_id, %player, "unknown player, message dropped"),
        }
    }

    fn send_room_message(&self, room: RoomId, message: ServerMessage) {
        if room != self.room_id {
            warn!(room_id = %self.room_id, target = %room, "broadcast for another room dropped");
            return;
        }
        for (player, sender) in self.senders().iter() {
            if sender.send(message.clone()).is_err() {
                debug!(room_id = %self.room_id, %player, "receiver gone, message dropped");
            }
        }
    }

    fn disconnect_sockets(&self) {
        let dropped = std::mem::take(&mut *self.senders());
        debug!(room_id = %self.room_id, count = dropped.len(), "dropping player channels");
    }
}
