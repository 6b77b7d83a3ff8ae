//! The outbound message contract between the engine and a transport.
//!
//! The engine never touches sockets. A [`Room`](crate::Room) holds an
//! `Arc<dyn Dispatcher>` and hands every outbound [`ServerMessage`] to it,
//! addressed to one player or to the whole room. What happens next (a
//! channel per connection, a test log, ...) is the implementor's business.

use std::sync::{Mutex, PoisonError};

use nightfall_protocol::{PlayerId, Recipient, RoomId, ServerMessage};

/// Delivers engine output.
///
/// Implementations must not block: the engine calls them while holding
/// exclusive access to the room. Delivery is best effort; a message for a
/// player that is already gone is dropped.
pub trait Dispatcher: Send + Sync + 'static {
    /// Deliver `message` to one player.
    fn send_player_message(&self, player: PlayerId, message: ServerMessage);

    /// Deliver `message` to every player currently in `room`.
    fn send_room_message(&self, room: RoomId, message: ServerMessage);

    /// Drop every connection this dispatcher serves. Best effort.
    fn disconnect_sockets(&self) {}
}

/// A [`Dispatcher`] that records every delivery in memory.
///
/// Used by tests and by embedders that poll for output instead of
/// pushing it to sockets.
#[derive(Debug, Default)]
pub struct MemoryDispatcher {
    log: Mutex<Vec<(Recipient, ServerMessage)>>,
    disconnects: Mutex<u32>,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery so far, in order.
    pub fn deliveries(&self) -> Vec<(Recipient, ServerMessage)> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return every delivery so far.
    pub fn take(&self) -> Vec<(Recipient, ServerMessage)> {
        std::mem::take(&mut *self.log.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Messages sent directly to `player`.
    pub fn player_messages(&self, player: PlayerId) -> Vec<ServerMessage> {
        self.filtered(Recipient::Player(player))
    }

    /// Messages broadcast to `room`.
    pub fn room_messages(&self, room: RoomId) -> Vec<ServerMessage> {
        self.filtered(Recipient::Room(room))
    }

    /// Text of every `generic-message` sent directly to `player`.
    pub fn generic_texts(&self, player: PlayerId) -> Vec<String> {
        self.player_messages(player)
            .into_iter()
            .filter_map(|msg| match msg {
                ServerMessage::GenericMessage { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// How many times `disconnect_sockets` was called.
    pub fn disconnect_count(&self) -> u32 {
        *self.disconnects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn filtered(&self, recipient: Recipient) -> Vec<ServerMessage> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(to, _)| *to == recipient)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    fn record(&self, recipient: Recipient, message: ServerMessage) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((recipient, message));
    }
}

impl Dispatcher for MemoryDispatcher {
    fn send_player_message(&self, player: PlayerId, message: ServerMessage) {
        self.record(Recipient::Player(player), message);
    }

    fn send_room_message(&self, room: RoomId, message: ServerMessage) {
        self.record(Recipient::Room(room), message);
    }

    fn disconnect_sockets(&self) {
        *self.disconnects.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}
