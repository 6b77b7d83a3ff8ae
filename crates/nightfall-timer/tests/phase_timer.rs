//! Integration tests for the phase countdown timer.
//!
//! Uses `start_paused = true` so Tokio's clock only moves when the test
//! advances it (or when every task is idle and auto-advance kicks in).

use std::time::Duration;

use nightfall_timer::{PhaseTimer, TimerConfig};

// =========================================================================
// Helpers
// =========================================================================

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

// =========================================================================
// Idle timer
// =========================================================================

#[test]
fn test_new_timer_is_idle() {
    let t = PhaseTimer::default();
    assert!(!t.is_active());
    assert_eq!(t.active_deadlines(), 0);
    assert_eq!(t.generation(), 0);
    assert_eq!(t.time_left(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_idle_timer_never_fires() {
    let mut t = PhaseTimer::default();

    let result = tokio::time::timeout(secs(3600), t.wait_for_expiry()).await;
    assert!(result.is_err(), "idle timer should pend forever");
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_then_expiry_reports_generation_and_duration() {
    let mut t = PhaseTimer::default();
    let generation = t.start(secs(60));

    let expiry = t.wait_for_expiry().await;

    assert_eq!(generation, 1);
    assert_eq!(expiry.generation, 1);
    assert_eq!(expiry.duration, secs(60));
    assert!(!t.is_active(), "deadline is consumed by expiry");
    assert_eq!(t.metrics().expired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_time_left_counts_down() {
    let mut t = PhaseTimer::default();
    t.start(secs(10));

    tokio::time::advance(secs(4)).await;

    assert_eq!(t.time_left(), secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_does_not_fire_early() {
    let mut t = PhaseTimer::default();
    t.start(secs(10));

    let result = tokio::time::timeout(secs(9), t.wait_for_expiry()).await;
    assert!(result.is_err());
    assert!(t.is_active(), "timed-out wait must leave the deadline armed");
}

// =========================================================================
// Restart / cancel: at most one deadline
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_pending_deadline() {
    let mut t = PhaseTimer::default();
    t.start(secs(10));
    tokio::time::advance(secs(5)).await;

    // Phase forced to end early: the next phase's timer replaces the old one.
    t.start(secs(10));
    assert_eq!(t.active_deadlines(), 1);

    // The original deadline (t = 10s) must not fire.
    let early = tokio::time::timeout(secs(9), t.wait_for_expiry()).await;
    assert!(early.is_err(), "stale deadline fired");

    let expiry = t.wait_for_expiry().await;
    assert_eq!(expiry.generation, 2);
    assert_eq!(t.metrics().started, 2);
    assert_eq!(t.metrics().cancelled, 1);
    assert_eq!(t.metrics().expired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_disarms() {
    let mut t = PhaseTimer::default();
    t.start(secs(10));

    assert!(t.cancel());
    assert!(!t.cancel(), "second cancel has nothing to cancel");

    let result = tokio::time::timeout(secs(60), t.wait_for_expiry()).await;
    assert!(result.is_err());
    assert_eq!(t.metrics().cancelled, 1);
}

// =========================================================================
// Pause / resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_remaining_time() {
    let mut t = PhaseTimer::default();
    t.start(secs(10));
    tokio::time::advance(secs(3)).await;

    t.pause();
    t.pause();
    assert!(t.is_paused());
    tokio::time::advance(secs(100)).await;
    assert_eq!(t.time_left(), secs(7));

    let result = tokio::time::timeout(secs(60), t.wait_for_expiry()).await;
    assert!(result.is_err(), "paused timer should pend");
}

#[tokio::test(start_paused = true)]
async fn test_resume_continues_with_remaining_time() {
    let mut t = PhaseTimer::default();
    t.start(secs(10));
    tokio::time::advance(secs(3)).await;
    t.pause();
    tokio::time::advance(secs(30)).await;

    t.resume();
    assert!(!t.is_paused());

    let early = tokio::time::timeout(secs(6), t.wait_for_expiry()).await;
    assert!(early.is_err());
    let expiry = t.wait_for_expiry().await;
    assert_eq!(expiry.generation, 1);
}

// =========================================================================
// Jitter
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_jitter_only_delays() {
    let mut t = PhaseTimer::new(TimerConfig::with_jitter(Duration::from_millis(500)));
    t.start(secs(10));

    let left = t.time_left();
    assert!(left >= secs(10));
    assert!(left <= secs(10) + Duration::from_millis(500));
}

// =========================================================================
// Integration: select! loop pattern (mirrors the room actor)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_forced_advance_keeps_single_deadline() {
    let mut t = PhaseTimer::default();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(10);

    tokio::spawn(async move {
        // Everyone votes 20s into a 60s day, then the test stops at 200s.
        tokio::time::sleep(secs(20)).await;
        tx.send("all-voted").await.ok();
        tokio::time::sleep(secs(180)).await;
        tx.send("stop").await.ok();
    });

    t.start(secs(60));
    let mut expiries = Vec::new();
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                if cmd == "stop" {
                    break;
                }
                t.start(secs(30));
            }
            expiry = t.wait_for_expiry() => {
                expiries.push(expiry.generation);
                t.start(secs(30));
            }
        }
        assert!(t.active_deadlines() <= 1);
    }

    // Forced advance at 20s (gen 2, fires at 50s), then 80s, 110s, ...
    // The original 60s deadline (gen 1) never fires.
    assert!(!expiries.contains(&1));
    assert_eq!(expiries.first(), Some(&2));
}
