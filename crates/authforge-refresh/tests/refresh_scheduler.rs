//! Integration tests for the refresh scheduler and timer.
//!
//! Uses `tokio::time::pause()` to control time deterministically.
//! All tests run with auto-advanced time so `sleep_until` resolves
//! instantly when we advance the clock.

use std::time::Duration;

use authforge_refresh::{
    RefreshConfig, RefreshDecision, RefreshScheduler, RefreshTimer,
    RefreshTrigger, SkipReason,
};

// =========================================================================
// Helpers
// =========================================================================

/// Config with every pacing guard disabled: decisions depend only on
/// phase and authentication.
fn config_no_guards() -> RefreshConfig {
    RefreshConfig {
        interval: Duration::from_secs(1800),
        visibility_min_gap: Duration::ZERO,
        cooldown: Duration::ZERO,
        initial_jitter_ms: 0,
    }
}

/// Production-shaped config, minus the first-fire jitter.
fn config_standard() -> RefreshConfig {
    RefreshConfig {
        initial_jitter_ms: 0,
        ..Default::default()
    }
}

const MANUAL: RefreshTrigger = RefreshTrigger::Manual { force: false };
const FORCED: RefreshTrigger = RefreshTrigger::Manual { force: true };

// =========================================================================
// RefreshConfig
// =========================================================================

#[test]
fn test_default_config_values() {
    let cfg = RefreshConfig::default();
    assert_eq!(cfg.interval, Duration::from_secs(1800));
    assert_eq!(cfg.visibility_min_gap, Duration::from_secs(300));
    assert_eq!(cfg.cooldown, Duration::from_secs(30));
}

#[test]
fn test_validated_clamps_cooldown_to_interval() {
    let cfg = RefreshConfig {
        interval: Duration::from_secs(60),
        cooldown: Duration::from_secs(600),
        ..config_standard()
    }
    .validated();
    assert_eq!(cfg.cooldown, Duration::from_secs(60));
}

#[test]
fn test_validated_keeps_cooldown_when_interval_disabled() {
    // A zero interval means "no periodic timer"; the cooldown still
    // paces visibility and manual triggers and must survive.
    let cfg = RefreshConfig {
        interval: Duration::ZERO,
        cooldown: Duration::from_secs(600),
        ..config_standard()
    }
    .validated();
    assert_eq!(cfg.cooldown, Duration::from_secs(600));
}

// =========================================================================
// try_begin: phase and authentication guards
// =========================================================================

#[test]
fn test_try_begin_idle_authenticated_proceeds() {
    let mut s = RefreshScheduler::new(config_no_guards());

    let decision = s.try_begin(MANUAL, true);

    assert_eq!(decision, RefreshDecision::Proceed);
    assert!(s.is_refreshing());
    assert_eq!(s.stats().attempts, 1);
}

#[test]
fn test_try_begin_while_refreshing_skips() {
    let mut s = RefreshScheduler::new(config_no_guards());
    assert!(s.try_begin(MANUAL, true).proceeds());

    let decision = s.try_begin(RefreshTrigger::Interval, true);

    assert_eq!(
        decision,
        RefreshDecision::Skip(SkipReason::AlreadyRefreshing)
    );
    assert_eq!(s.stats().attempts, 1);
    assert_eq!(s.stats().skipped_in_flight, 1);
    assert_eq!(s.stats().total_skips(), 1);
}

#[test]
fn test_force_does_not_bypass_single_flight() {
    // Forcing skips the cooldown, never the in-flight guard. Two
    // concurrent refreshes would race each other's token writes.
    let mut s = RefreshScheduler::new(config_no_guards());
    assert!(s.try_begin(MANUAL, true).proceeds());

    let decision = s.try_begin(FORCED, true);

    assert_eq!(
        decision,
        RefreshDecision::Skip(SkipReason::AlreadyRefreshing)
    );
}

#[test]
fn test_try_begin_unauthenticated_skips() {
    let mut s = RefreshScheduler::new(config_no_guards());

    let decision = s.try_begin(RefreshTrigger::Interval, false);

    assert_eq!(
        decision,
        RefreshDecision::Skip(SkipReason::NotAuthenticated)
    );
    assert_eq!(s.stats().skipped_unauthenticated, 1);
    assert_eq!(s.stats().attempts, 0);
}

#[test]
fn test_force_does_not_bypass_authentication() {
    let mut s = RefreshScheduler::new(config_no_guards());

    let decision = s.try_begin(FORCED, false);

    assert_eq!(
        decision,
        RefreshDecision::Skip(SkipReason::NotAuthenticated)
    );
}

// =========================================================================
// try_begin: visibility gap
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_visibility_within_gap_skips() {
    let mut s = RefreshScheduler::new(RefreshConfig {
        visibility_min_gap: Duration::from_secs(300),
        cooldown: Duration::ZERO,
        ..config_standard()
    });
    s.mark_fresh();

    tokio::time::advance(Duration::from_secs(299)).await;
    let decision = s.try_begin(RefreshTrigger::VisibilityGained, true);

    assert_eq!(
        decision,
        RefreshDecision::Skip(SkipReason::RefreshedRecently)
    );
}

#[tokio::test(start_paused = true)]
async fn test_visibility_past_gap_proceeds() {
    let mut s = RefreshScheduler::new(RefreshConfig {
        visibility_min_gap: Duration::from_secs(300),
        cooldown: Duration::ZERO,
        ..config_standard()
    });
    s.mark_fresh();

    tokio::time::advance(Duration::from_secs(301)).await;
    let decision = s.try_begin(RefreshTrigger::VisibilityGained, true);

    assert_eq!(decision, RefreshDecision::Proceed);
}

#[test]
fn test_visibility_without_prior_refresh_proceeds() {
    // No refresh on record means no gap to respect.
    let mut s = RefreshScheduler::new(RefreshConfig {
        visibility_min_gap: Duration::from_secs(300),
        cooldown: Duration::ZERO,
        ..config_standard()
    });

    let decision = s.try_begin(RefreshTrigger::VisibilityGained, true);

    assert_eq!(decision, RefreshDecision::Proceed);
}

#[tokio::test(start_paused = true)]
async fn test_gap_applies_only_to_visibility_trigger() {
    // The gap exists to stop alt-tabbing from refreshing a seconds-old
    // session; other triggers are paced by the cooldown alone.
    let mut s = RefreshScheduler::new(RefreshConfig {
        visibility_min_gap: Duration::from_secs(300),
        cooldown: Duration::ZERO,
        ..config_standard()
    });
    s.mark_fresh();

    tokio::time::advance(Duration::from_secs(1)).await;

    assert!(s.try_begin(RefreshTrigger::Interval, true).proceeds());
}

// =========================================================================
// try_begin: cooldown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cooldown_blocks_unforced_attempts() {
    let mut s = RefreshScheduler::new(RefreshConfig {
        visibility_min_gap: Duration::ZERO,
        cooldown: Duration::from_secs(30),
        ..config_standard()
    });
    assert!(s.try_begin(MANUAL, true).proceeds());
    s.complete(false);

    tokio::time::advance(Duration::from_secs(5)).await;
    let decision = s.try_begin(MANUAL, true);

    assert_eq!(decision, RefreshDecision::Skip(SkipReason::CooldownActive));
}

#[tokio::test(start_paused = true)]
async fn test_force_bypasses_cooldown() {
    let mut s = RefreshScheduler::new(RefreshConfig {
        visibility_min_gap: Duration::ZERO,
        cooldown: Duration::from_secs(30),
        ..config_standard()
    });
    assert!(s.try_begin(MANUAL, true).proceeds());
    s.complete(false);

    tokio::time::advance(Duration::from_secs(5)).await;

    assert!(s.try_begin(FORCED, true).proceeds());
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_releases_after_window() {
    let mut s = RefreshScheduler::new(RefreshConfig {
        visibility_min_gap: Duration::ZERO,
        cooldown: Duration::from_secs(30),
        ..config_standard()
    });
    assert!(s.try_begin(MANUAL, true).proceeds());
    s.complete(false);

    tokio::time::advance(Duration::from_secs(31)).await;

    assert!(s.try_begin(MANUAL, true).proceeds());
}

// =========================================================================
// complete() and mark_fresh()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_complete_success_records_refresh_timestamp() {
    let mut s = RefreshScheduler::new(RefreshConfig {
        visibility_min_gap: Duration::from_secs(300),
        cooldown: Duration::ZERO,
        ..config_standard()
    });
    assert!(s.try_begin(MANUAL, true).proceeds());
    s.complete(true);

    assert!(!s.is_refreshing());
    assert_eq!(s.stats().successes, 1);

    // The fresh timestamp now blocks an immediate visibility trigger.
    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(
        s.try_begin(RefreshTrigger::VisibilityGained, true),
        RefreshDecision::Skip(SkipReason::RefreshedRecently)
    );
}

#[tokio::test(start_paused = true)]
async fn test_complete_failure_keeps_old_refresh_timestamp() {
    let mut s = RefreshScheduler::new(RefreshConfig {
        visibility_min_gap: Duration::from_secs(300),
        cooldown: Duration::ZERO,
        ..config_standard()
    });
    s.mark_fresh();
    tokio::time::advance(Duration::from_secs(400)).await;

    assert!(s.try_begin(RefreshTrigger::Interval, true).proceeds());
    s.complete(false);
    assert_eq!(s.stats().failures, 1);

    // The failed attempt didn't renew anything; visibility still sees a
    // 400-second-old session and proceeds.
    assert!(s.try_begin(RefreshTrigger::VisibilityGained, true).proceeds());
}

#[test]
fn test_complete_when_idle_is_ignored() {
    let mut s = RefreshScheduler::new(config_no_guards());

    s.complete(true);

    assert!(!s.is_refreshing());
    assert_eq!(s.stats().successes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_mark_fresh_counts_as_recent_refresh() {
    // A login installs a brand-new session; the next focus change must
    // not immediately re-refresh it.
    let mut s = RefreshScheduler::new(RefreshConfig {
        visibility_min_gap: Duration::from_secs(300),
        cooldown: Duration::ZERO,
        ..config_standard()
    });
    s.mark_fresh();

    tokio::time::advance(Duration::from_secs(30)).await;

    assert_eq!(
        s.try_begin(RefreshTrigger::VisibilityGained, true),
        RefreshDecision::Skip(SkipReason::RefreshedRecently)
    );
}

// =========================================================================
// Timer
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_timer_fires_on_period() {
    let mut timer = RefreshTimer::new(Duration::from_secs(60), Duration::ZERO);
    let start = tokio::time::Instant::now();

    timer.wait_for_due().await;
    assert!(start.elapsed() >= Duration::from_secs(60));

    timer.wait_for_due().await;
    assert!(start.elapsed() >= Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn test_timer_zero_period_pends_forever() {
    let mut timer = RefreshTimer::new(Duration::ZERO, Duration::ZERO);
    assert!(timer.is_disabled());

    let result =
        tokio::time::timeout(Duration::from_secs(5), timer.wait_for_due())
            .await;
    assert!(result.is_err(), "disabled timer should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_timer_jitter_delays_first_fire_only() {
    let period = Duration::from_secs(60);
    let jitter = Duration::from_secs(10);
    let mut timer = RefreshTimer::new(period, jitter);
    let start = tokio::time::Instant::now();

    timer.wait_for_due().await;
    let first = start.elapsed();
    assert!(first >= period, "first fire before the period: {first:?}");
    assert!(
        first <= period + jitter,
        "first fire past period + jitter: {first:?}"
    );

    // Second fire is one clean period after the first.
    timer.wait_for_due().await;
    assert_eq!(start.elapsed(), first + period);
}

// =========================================================================
// Integration: select! loop pattern (mirrors supervisor usage)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut scheduler = RefreshScheduler::new(RefreshConfig {
        interval: Duration::from_secs(1800),
        visibility_min_gap: Duration::ZERO,
        cooldown: Duration::from_secs(30),
        initial_jitter_ms: 0,
    });
    let mut timer =
        RefreshTimer::new(Duration::from_secs(1800), Duration::ZERO);

    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(10);

    // Simulate: 3 periodic refreshes fire, then a "stop" command arrives.
    let tx2 = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3 * 1800 + 60)).await;
        tx2.send("stop").await.ok();
    });

    let start = tokio::time::Instant::now();
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            _ = timer.wait_for_due() => {
                if scheduler.try_begin(RefreshTrigger::Interval, true).proceeds() {
                    // Stand-in for the provider call.
                    scheduler.complete(true);
                }
            }
        }
    }

    assert_eq!(scheduler.stats().attempts, 3);
    assert_eq!(scheduler.stats().successes, 3);
    assert!(start.elapsed() >= Duration::from_secs(3 * 1800));
}
