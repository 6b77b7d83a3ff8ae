//! The authoritative phase and day counter for one room.
//!
//! ```text
//! Between(day 0) → Day 1 → Between → Night → Between → Day 2 → ...
//!                      any phase ⇄ Locked
//! ```
//!
//! The manager owns the room's single [`PhaseTimer`]. Every transition
//! re-arms it with the new phase's duration, which replaces whatever
//! deadline was pending. Locking pauses the countdown; unlocking resumes it.

use std::time::Duration;

use nightfall_protocol::{Phase, ServerMessage};
use nightfall_timer::{PhaseTimer, TimerConfig};
use tracing::debug;

use crate::config::GameConfig;
use crate::error::PhaseError;

/// How long each phase lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDurations {
    pub day: Duration,
    pub night: Duration,
    pub between: Duration,
}

impl PhaseDurations {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            day: config.day_duration,
            night: config.night_duration,
            between: config.between_duration,
        }
    }

    pub fn of(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Day => self.day,
            Phase::Night => self.night,
            Phase::Between => self.between,
            Phase::Locked => Duration::ZERO,
        }
    }
}

/// Read-only view of the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSnapshot {
    pub phase: Phase,
    pub day_number: u32,
    pub time_left: Duration,
}

impl PhaseSnapshot {
    /// The `phase-update` message for this snapshot. Seconds round up.
    pub fn to_message(self) -> ServerMessage {
        let millis = self.time_left.as_millis() as u64;
        ServerMessage::PhaseUpdate {
            phase: self.phase,
            day_number: self.day_number,
            time_left_seconds: millis.div_ceil(1000),
        }
    }
}

#[derive(Debug)]
pub struct GameStateManager {
    phase: Phase,
    day_number: u32,
    /// Where `Between` goes next.
    after_between: Phase,
    /// The phase to return to on unlock. `None` once finished.
    locked_from: Option<Phase>,
    durations: PhaseDurations,
    timer: PhaseTimer,
}

impl GameStateManager {
    /// A pre-game manager: `Between`, day 0, next phase `Day`, timer idle.
    pub fn new(durations: PhaseDurations, timer: TimerConfig) -> Self {
        Self {
            phase: Phase::Between,
            day_number: 0,
            after_between: Phase::Day,
            locked_from: None,
            durations,
            timer: PhaseTimer::new(timer),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn day_number(&self) -> u32 {
        self.day_number
    }

    pub fn time_left(&self) -> Duration {
        self.timer.time_left()
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        PhaseSnapshot {
            phase: self.phase,
            day_number: self.day_number,
            time_left: self.time_left(),
        }
    }

    /// The phase the next regular advance moves to.
    pub fn next_phase(&self) -> Phase {
        match self.phase {
            Phase::Day | Phase::Night => Phase::Between,
            Phase::Between => self.after_between,
            Phase::Locked => self.locked_from.unwrap_or(Phase::Locked),
        }
    }

    /// Whether the game is over and the machine can no longer move.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Locked && self.locked_from.is_none()
    }

    pub fn timer(&self) -> &PhaseTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut PhaseTimer {
        &mut self.timer
    }

    /// Move to `to` along a legal edge and re-arm the timer.
    ///
    /// Entering `Day` increments the day counter. Locking goes through
    /// [`lock`](Self::lock) instead.
    pub fn transition(&mut self, to: Phase) -> Result<PhaseSnapshot, PhaseError> {
        let from = self.phase;
        let legal = match (from, to) {
            (Phase::Day, Phase::Between | Phase::Night) => true,
            (Phase::Night, Phase::Between | Phase::Day) => true,
            (Phase::Between, next) => next == self.after_between,
            _ => false,
        };
        if !legal {
            return Err(PhaseError::IllegalTransition { from, to });
        }

        match (from, to) {
            (Phase::Day, _) => self.after_between = Phase::Night,
            (Phase::Night, _) => self.after_between = Phase::Day,
            _ => {}
        }
        if to == Phase::Day {
            self.increment_day_number();
        }

        self.phase = to;
        self.timer.start(self.durations.of(to));
        debug!(%from, %to, day = self.day_number, "phase transition");
        Ok(self.snapshot())
    }

    /// Advance the day counter by exactly one.
    pub fn increment_day_number(&mut self) {
        self.day_number += 1;
    }

    /// Freeze the machine, pausing the countdown. No-op when already locked.
    pub fn lock(&mut self) {
        if self.phase == Phase::Locked {
            return;
        }
        self.locked_from = Some(self.phase);
        self.phase = Phase::Locked;
        self.timer.pause();
    }

    /// Return to the phase that was locked and resume its countdown.
    pub fn unlock(&mut self) -> Result<Phase, PhaseError> {
        match (self.phase, self.locked_from.take()) {
            (Phase::Locked, Some(previous)) => {
                self.phase = previous;
                self.timer.resume();
                Ok(previous)
            }
            _ => Err(PhaseError::NotLocked),
        }
    }

    /// Lock permanently and disarm the timer. Used when the game ends.
    pub fn finish(&mut self) {
        self.phase = Phase::Locked;
        self.locked_from = None;
        self.timer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> GameStateManager {
        GameStateManager::new(
            PhaseDurations {
                day: Duration::from_secs(60),
                night: Duration::from_secs(30),
                between: Duration::from_secs(5),
            },
            TimerConfig::default(),
        )
    }

    #[test]
    fn test_starts_between_on_day_zero() {
        let state = manager();
        assert_eq!(state.phase(), Phase::Between);
        assert_eq!(state.day_number(), 0);
        assert_eq!(state.next_phase(), Phase::Day);
        assert!(!state.timer().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_and_day_counter() {
        let mut state = manager();
        state.transition(Phase::Day).unwrap();
        assert_eq!(state.day_number(), 1);

        state.transition(Phase::Between).unwrap();
        assert_eq!(state.day_number(), 1, "Day -> Between never bumps the day");
        assert_eq!(state.next_phase(), Phase::Night);

        state.transition(Phase::Night).unwrap();
        assert_eq!(state.day_number(), 1);
        state.transition(Phase::Between).unwrap();
        assert_eq!(state.next_phase(), Phase::Day);

        state.transition(Phase::Day).unwrap();
        assert_eq!(state.day_number(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_edges_are_legal() {
        let mut state = manager();
        state.transition(Phase::Day).unwrap();
        state.transition(Phase::Night).unwrap();
        state.transition(Phase::Day).unwrap();
        assert_eq!(state.day_number(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_illegal_transitions_rejected() {
        let mut state = manager();
        assert_eq!(
            state.transition(Phase::Night),
            Err(PhaseError::IllegalTransition {
                from: Phase::Between,
                to: Phase::Night
            })
        );
        state.transition(Phase::Day).unwrap();
        assert!(state.transition(Phase::Day).is_err());
        assert!(state.transition(Phase::Locked).is_err());
        assert_eq!(state.phase(), Phase::Day);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_rearms_single_timer() {
        let mut state = manager();
        let snapshot = state.transition(Phase::Day).unwrap();
        assert_eq!(snapshot.time_left, Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(10)).await;
        state.transition(Phase::Between).unwrap();

        assert_eq!(state.timer().active_deadlines(), 1);
        assert_eq!(state.time_left(), Duration::from_secs(5));
        assert_eq!(state.timer().metrics().cancelled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_pauses_and_unlock_resumes() {
        let mut state = manager();
        state.transition(Phase::Day).unwrap();
        state.transition(Phase::Night).unwrap();

        state.lock();
        assert_eq!(state.phase(), Phase::Locked);
        assert!(state.timer().is_paused());

        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(state.unlock(), Ok(Phase::Night));
        assert_eq!(state.time_left(), Duration::from_secs(30));
        assert_eq!(state.unlock(), Err(PhaseError::NotLocked));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_is_permanent() {
        let mut state = manager();
        state.transition(Phase::Day).unwrap();
        state.finish();

        assert!(state.is_finished());
        assert!(!state.timer().is_active());
        assert_eq!(state.unlock(), Err(PhaseError::NotLocked));
        assert!(state.transition(Phase::Between).is_err());
    }

    #[test]
    fn test_snapshot_message_rounds_seconds_up() {
        let snapshot = PhaseSnapshot {
            phase: Phase::Night,
            day_number: 3,
            time_left: Duration::from_millis(29_001),
        };
        assert_eq!(
            snapshot.to_message(),
            ServerMessage::PhaseUpdate {
                phase: Phase::Night,
                day_number: 3,
                time_left_seconds: 30
            }
        );
    }
}
