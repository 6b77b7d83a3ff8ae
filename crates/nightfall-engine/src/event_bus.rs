//! In-process publish/subscribe for game events.
//!
//! Components that should not know about each other talk through the bus:
//! the room publishes `PlayerVotedOut`, and whoever cares (the jester
//! tracker feeding win conditions, the actor's logger) subscribes.
//!
//! Publishing is synchronous. Callbacks for a kind run in the order they
//! were subscribed, on the publisher's thread, before `publish` returns.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    GameStarted,
    PhaseChanged,
    VisitSubmitted,
    NightResolved,
    PlayerDied,
    PlayerVotedOut,
    GameEnded,
}

/// One published event. The payload is free-form JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub kind: EventKind,
    pub payload: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl GameEvent {
    /// Build an event stamped with the current wall-clock time.
    pub fn new(kind: EventKind, payload: Value) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            kind,
            payload,
            timestamp_ms,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&GameEvent) + Send>;

/// The bus itself. One per room.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: HashMap<EventKind, Vec<(SubscriptionId, Callback)>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self
            .subscribers
            .iter()
            .map(|(kind, subs)| (*kind, subs.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("subscribers", &counts)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events of `kind`.
    pub fn subscribe<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers
            .entry(kind)
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    /// Remove exactly the callback registered under `id`.
    ///
    /// Returns `false` (and does nothing) if it was not registered for `kind`.
    pub fn unsubscribe(&mut self, kind: EventKind, id: SubscriptionId) -> bool {
        let Some(subs) = self.subscribers.get_mut(&kind) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id);
        before != subs.len()
    }

    /// Call every subscriber of `event.kind`, in subscription order.
    pub fn publish(&mut self, event: &GameEvent) {
        if let Some(subs) = self.subscribers.get_mut(&event.kind) {
            for (_, callback) in subs.iter_mut() {
                callback(event);
            }
        }
    }

    /// Number of callbacks registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |tag: &'static str| -> Callback {
                let log = Arc::clone(&log);
                Box::new(move |_event: &GameEvent| log.lock().unwrap().push(tag.to_string()))
            }
        };
        (log, make)
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let mut bus = EventBus::new();
        bus.publish(&GameEvent::new(EventKind::GameStarted, json!({})));
        assert_eq!(bus.subscriber_count(EventKind::GameStarted), 0);
    }

    #[test]
    fn test_subscribers_run_in_order() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::PlayerDied, make("first"));
        bus.subscribe(EventKind::PlayerDied, make("second"));
        bus.subscribe(EventKind::GameEnded, make("other-kind"));

        bus.publish(&GameEvent::new(EventKind::PlayerDied, json!({ "seat": 1 })));

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_callback() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        let a = bus.subscribe(EventKind::PhaseChanged, make("a"));
        bus.subscribe(EventKind::PhaseChanged, make("b"));

        assert!(bus.unsubscribe(EventKind::PhaseChanged, a));
        bus.publish(&GameEvent::new(EventKind::PhaseChanged, Value::Null));
        bus.publish(&GameEvent::new(EventKind::PhaseChanged, Value::Null));

        assert_eq!(*log.lock().unwrap(), vec!["b", "b"]);
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let (_log, make) = recorder();
        let mut bus = EventBus::new();
        let id = bus.subscribe(EventKind::GameEnded, make("x"));

        assert!(!bus.unsubscribe(EventKind::GameStarted, id));
        assert!(bus.unsubscribe(EventKind::GameEnded, id));
        assert!(!bus.unsubscribe(EventKind::GameEnded, id));
    }

    #[test]
    fn test_callback_sees_payload() {
        let seen = Arc::new(Mutex::new(None));
        let mut bus = EventBus::new();
        let sink = Arc::clone(&seen);
        bus.subscribe(EventKind::PlayerVotedOut, move |event| {
            *sink.lock().unwrap() = event.payload["name"].as_str().map(str::to_owned);
        });

        bus.publish(&GameEvent::new(
            EventKind::PlayerVotedOut,
            json!({ "name": "bob" }),
        ));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("bob"));
    }
}
