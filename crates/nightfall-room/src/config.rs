//! Room actor configuration.

use std::time::Duration;

use nightfall_timer::TimerConfig;
use serde::{Deserialize, Serialize};

/// Settings for a room actor, as opposed to the rules of the game it runs
/// (those live in [`nightfall_engine::GameConfig`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Capacity of the actor's inbound command channel. When it fills up,
    /// callers wait (bounded channel backpressure).
    pub channel_size: usize,

    /// Random extra delay added to every phase deadline, so rooms created
    /// together do not advance on the same instant.
    pub timer_jitter: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            channel_size: 64,
            timer_jitter: Duration::ZERO,
        }
    }
}

impl RoomConfig {
    pub(crate) fn timer(&self) -> TimerConfig {
        TimerConfig::with_jitter(self.timer_jitter)
    }

    /// A zero-sized channel would panic in `mpsc::channel`.
    pub(crate) fn channel_size(&self) -> usize {
        self.channel_size.max(1)
    }
}
