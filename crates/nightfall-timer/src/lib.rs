//! Phase countdown timer for Nightfall.
//!
//! One [`PhaseTimer`] per room drives automatic day/night advancement.
//! The timer holds **at most one** deadline: [`PhaseTimer::start`] always
//! replaces the pending deadline, so a phase that ends early (everyone
//! voted) can never leave a stale countdown behind that fires later.
//!
//! # Integration
//!
//! The engine's phase machine owns the timer and re-arms it on every
//! transition. A room actor only awaits the expiry and advances the game:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = receiver.recv() => { /* handle commands */ }
//!         _ = room.timer_mut().wait_for_expiry() => {
//!             // restarts the timer for the next phase
//!             room.advance_phase();
//!         }
//!     }
//! }
//! ```
//!
//! While no deadline is armed (pre-game, game over, paused),
//! [`PhaseTimer::wait_for_expiry`] pends forever and `select!` only
//! services the other branches.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`PhaseTimer`].
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Random extra delay (0..max) added to every armed deadline so rooms
    /// created together do not all advance on the same instant.
    pub max_jitter: Duration,
    /// An expiry observed later than this is logged as an overrun.
    pub late_warn_threshold: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            max_jitter: Duration::ZERO,
            late_warn_threshold: Duration::from_millis(100),
        }
    }
}

impl TimerConfig {
    /// A config with the given jitter and default thresholds.
    pub fn with_jitter(max_jitter: Duration) -> Self {
        Self {
            max_jitter,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Expiry (returned to caller)
// ---------------------------------------------------------------------------

/// Information about a fired deadline, returned by
/// [`PhaseTimer::wait_for_expiry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    /// Generation of the deadline that fired (see [`PhaseTimer::start`]).
    pub generation: u64,
    /// The duration the deadline was armed with (jitter excluded).
    pub duration: Duration,
    /// How late the wake-up was relative to the deadline.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters describing a timer's history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerMetrics {
    /// Deadlines armed via `start`.
    pub started: u64,
    /// Deadlines that fired.
    pub expired: u64,
    /// Deadlines discarded before firing (explicit cancel or replaced by `start`).
    pub cancelled: u64,
    /// Expiries observed later than `late_warn_threshold`.
    pub late: u64,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Armed {
    Running { deadline: TokioInstant },
    Paused { remaining: Duration },
}

/// A single-deadline countdown.
#[derive(Debug)]
pub struct PhaseTimer {
    config: TimerConfig,
    armed: Option<Armed>,
    duration: Duration,
    generation: u64,
    metrics: TimerMetrics,
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

impl PhaseTimer {
    /// Create an idle timer.
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            armed: None,
            duration: Duration::ZERO,
            generation: 0,
            metrics: TimerMetrics::default(),
        }
    }

    /// Arm the timer for `duration`, replacing any pending deadline.
    ///
    /// Returns the new generation number. Generations increase by one per
    /// `start`, so an [`Expiry`] can always be matched to the phase that
    /// armed it.
    pub fn start(&mut self, duration: Duration) -> u64 {
        if self.armed.is_some() {
            self.metrics.cancelled += 1;
            debug!(
                generation = self.generation,
                "replacing pending phase deadline"
            );
        }

        let jitter = if self.config.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max_ms = self.config.max_jitter.as_millis() as u64;
            Duration::from_millis(rand::rng().random_range(0..=max_ms))
        };

        self.generation += 1;
        self.duration = duration;
        self.armed = Some(Armed::Running {
            deadline: TokioInstant::now() + duration + jitter,
        });
        self.metrics.started += 1;

        trace!(
            generation = self.generation,
            secs = duration.as_secs_f64(),
            "phase deadline armed"
        );
        self.generation
    }

    /// Disarm the timer. Returns `true` if a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(_) => {
                self.metrics.cancelled += 1;
                debug!(generation = self.generation, "phase deadline cancelled");
                true
            }
            None => false,
        }
    }

    /// Freeze the countdown, keeping the remaining time.
    ///
    /// Safe to call multiple times (idempotent). No-op when idle.
    pub fn pause(&mut self) {
        if let Some(Armed::Running { deadline }) = self.armed {
            let remaining = deadline.saturating_duration_since(TokioInstant::now());
            self.armed = Some(Armed::Paused { remaining });
            debug!(generation = self.generation, "phase timer paused");
        }
    }

    /// Resume a paused countdown with the time it had left.
    pub fn resume(&mut self) {
        if let Some(Armed::Paused { remaining }) = self.armed {
            self.armed = Some(Armed::Running {
                deadline: TokioInstant::now() + remaining,
            });
            debug!(generation = self.generation, "phase timer resumed");
        }
    }

    /// Wait until the armed deadline passes.
    ///
    /// When idle or paused this future pends forever: it never resolves
    /// on its own, but `tokio::select!` will still process other branches.
    ///
    /// Cancel-safe: dropping the future before it completes leaves the
    /// deadline armed.
    pub async fn wait_for_expiry(&mut self) -> Expiry {
        let deadline = match self.armed {
            Some(Armed::Running { deadline }) => deadline,
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(deadline).await;

        self.armed = None;
        self.metrics.expired += 1;

        let late_by = TokioInstant::now().saturating_duration_since(deadline);
        if late_by > self.config.late_warn_threshold {
            self.metrics.late += 1;
            warn!(
                generation = self.generation,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "phase deadline fired late"
            );
        }

        Expiry {
            generation: self.generation,
            duration: self.duration,
            late_by,
        }
    }

    /// Time until the armed deadline, or zero when idle.
    pub fn time_left(&self) -> Duration {
        match self.armed {
            Some(Armed::Running { deadline }) => {
                deadline.saturating_duration_since(TokioInstant::now())
            }
            Some(Armed::Paused { remaining }) => remaining,
            None => Duration::ZERO,
        }
    }

    /// Whether a deadline is armed (running or paused).
    pub fn is_active(&self) -> bool {
        self.armed.is_some()
    }

    /// Whether the countdown is frozen.
    pub fn is_paused(&self) -> bool {
        matches!(self.armed, Some(Armed::Paused { .. }))
    }

    /// Number of armed deadlines. Always 0 or 1.
    pub fn active_deadlines(&self) -> usize {
        usize::from(self.armed.is_some())
    }

    /// Generation of the most recent `start`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Snapshot of the timer's counters.
    pub fn metrics(&self) -> &TimerMetrics {
        &self.metrics
    }
}
