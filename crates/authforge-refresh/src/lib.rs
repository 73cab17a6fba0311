//! Background session refresh scheduling for Authforge.
//!
//! Keeps an authenticated session alive by deciding *when* a token
//! refresh may run. Three things can ask for one:
//!
//! - the periodic timer (default: every 30 minutes)
//! - the window regaining visibility after being hidden
//! - an explicit caller (optionally forced)
//!
//! The scheduler itself never talks to the identity provider. It is a
//! guard machine: callers propose a refresh with a trigger, the scheduler
//! answers [`RefreshDecision::Proceed`] or a [`SkipReason`], and the
//! caller reports the outcome back. This keeps refreshes single-flight
//! and stops trigger storms (a user alt-tabbing rapidly, a timer firing
//! during a manual refresh) from stacking provider calls.
//!
//! # Integration
//!
//! The scheduler and timer are designed to sit inside a supervisor's
//! `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = timer.wait_for_due() => {
//!             if scheduler.try_begin(RefreshTrigger::Interval, authed).proceeds() {
//!                 let ok = provider.refresh_session().await.is_ok();
//!                 scheduler.complete(ok);
//!             }
//!         }
//!         _ = visibility.changed() => { /* VisibilityGained trigger */ }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, warn};

/// Default spacing between periodic refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Minimum age of the last refresh before regaining visibility triggers
/// a new one.
pub const DEFAULT_VISIBILITY_MIN_GAP: Duration = Duration::from_secs(5 * 60);

/// Minimum spacing between unforced refresh attempts.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Full configuration for refresh scheduling.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Periodic refresh interval. Zero disables the periodic timer
    /// (visibility and manual triggers still work).
    pub interval: Duration,
    /// A visibility-gained trigger is skipped when the last successful
    /// refresh is younger than this.
    pub visibility_min_gap: Duration,
    /// Unforced attempts within this window of the previous attempt are
    /// skipped. Forced refreshes bypass it.
    pub cooldown: Duration,
    /// Random jitter (0..max ms) added to the *first* periodic deadline
    /// so clients started together don't refresh in lockstep.
    pub initial_jitter_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            visibility_min_gap: DEFAULT_VISIBILITY_MIN_GAP,
            cooldown: DEFAULT_REFRESH_COOLDOWN,
            initial_jitter_ms: 2_000, // 0-2 s default jitter
        }
    }
}

impl RefreshConfig {
    /// Fix up out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`RefreshScheduler::new`]. Rules:
    /// - `cooldown` is capped at `interval` (when the interval is
    ///   non-zero), otherwise every periodic attempt would land inside
    ///   the cooldown of the previous one and be skipped forever.
    pub fn validated(mut self) -> Self {
        if !self.interval.is_zero() && self.cooldown > self.interval {
            warn!(
                cooldown_secs = self.cooldown.as_secs(),
                interval_secs = self.interval.as_secs(),
                "cooldown exceeds refresh interval; clamping"
            );
            self.cooldown = self.interval;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Triggers and decisions
// ---------------------------------------------------------------------------

/// What prompted a refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// The periodic timer fired.
    Interval,
    /// The window went from hidden to visible.
    VisibilityGained,
    /// An explicit caller request. `force` bypasses the cooldown (and
    /// only the cooldown; single-flight and the signed-in requirement
    /// always hold).
    Manual { force: bool },
}

impl RefreshTrigger {
    /// Short tag for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            RefreshTrigger::Interval => "interval",
            RefreshTrigger::VisibilityGained => "visibility",
            RefreshTrigger::Manual { force: false } => "manual",
            RefreshTrigger::Manual { force: true } => "forced",
        }
    }

    fn is_forced(&self) -> bool {
        matches!(self, RefreshTrigger::Manual { force: true })
    }
}

/// Why a proposed refresh was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another refresh is already in flight.
    AlreadyRefreshing,
    /// No session to refresh.
    NotAuthenticated,
    /// The last successful refresh is too recent for this trigger.
    RefreshedRecently,
    /// An attempt ran within the cooldown window.
    CooldownActive,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::AlreadyRefreshing => "already-refreshing",
            SkipReason::NotAuthenticated => "not-authenticated",
            SkipReason::RefreshedRecently => "refreshed-recently",
            SkipReason::CooldownActive => "cooldown",
        }
    }
}

/// Outcome of proposing a refresh to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    /// Go ahead; the scheduler is now in the `Refreshing` phase and
    /// expects a [`RefreshScheduler::complete`] call.
    Proceed,
    /// Don't; nothing changed.
    Skip(SkipReason),
}

impl RefreshDecision {
    pub fn proceeds(&self) -> bool {
        matches!(self, RefreshDecision::Proceed)
    }
}

/// Scheduler phase. There are exactly two: a refresh is running or it
/// isn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters for refresh activity, reported at supervisor shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Attempts that were allowed to proceed.
    pub attempts: u64,
    /// Attempts that completed successfully.
    pub successes: u64,
    /// Attempts that completed with an error.
    pub failures: u64,
    /// Skips: another refresh was in flight.
    pub skipped_in_flight: u64,
    /// Skips: no session to refresh.
    pub skipped_unauthenticated: u64,
    /// Skips: last refresh too recent for a visibility trigger.
    pub skipped_recent: u64,
    /// Skips: attempt landed inside the cooldown.
    pub skipped_cooldown: u64,
}

impl RefreshStats {
    /// Proposals turned away by any guard.
    pub fn total_skips(&self) -> u64 {
        self.skipped_in_flight
            + self.skipped_unauthenticated
            + self.skipped_recent
            + self.skipped_cooldown
    }

    fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::AlreadyRefreshing => self.skipped_in_flight += 1,
            SkipReason::NotAuthenticated => self.skipped_unauthenticated += 1,
            SkipReason::RefreshedRecently => self.skipped_recent += 1,
            SkipReason::CooldownActive => self.skipped_cooldown += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Single-flight refresh guard machine.
///
/// One per client. The scheduler is not thread-safe by itself; the
/// supervisor owns it behind a mutex and locks only for the synchronous
/// begin/complete moments around the provider call.
pub struct RefreshScheduler {
    config: RefreshConfig,
    phase: RefreshPhase,
    /// When a refresh last *started*, successful or not. Drives the
    /// cooldown.
    last_attempt: Option<TokioInstant>,
    /// When a session was last freshly issued (successful refresh or
    /// login). Drives the visibility gap.
    last_refresh: Option<TokioInstant>,
    stats: RefreshStats,
}

impl RefreshScheduler {
    pub fn new(config: RefreshConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_secs = config.interval.as_secs(),
            gap_secs = config.visibility_min_gap.as_secs(),
            cooldown_secs = config.cooldown.as_secs(),
            "refresh scheduler created"
        );
        Self {
            config,
            phase: RefreshPhase::Idle,
            last_attempt: None,
            last_refresh: None,
            stats: RefreshStats::default(),
        }
    }

    /// Propose a refresh. On [`RefreshDecision::Proceed`] the scheduler
    /// enters the `Refreshing` phase and the caller owns the follow-up
    /// [`complete`](Self::complete) call.
    ///
    /// Guards are checked in a fixed order:
    /// 1. single-flight (never two refreshes at once, forced or not)
    /// 2. `authenticated` (nothing to refresh while signed out)
    /// 3. visibility gap (only for [`RefreshTrigger::VisibilityGained`])
    /// 4. cooldown (bypassed by a forced manual trigger)
    pub fn try_begin(
        &mut self,
        trigger: RefreshTrigger,
        authenticated: bool,
    ) -> RefreshDecision {
        if let Some(reason) = self.blocking_guard(trigger, authenticated) {
            self.stats.record_skip(reason);
            debug!(
                trigger = trigger.label(),
                reason = reason.label(),
                "refresh skipped"
            );
            return RefreshDecision::Skip(reason);
        }

        self.phase = RefreshPhase::Refreshing;
        self.last_attempt = Some(TokioInstant::now());
        self.stats.attempts += 1;
        debug!(trigger = trigger.label(), "refresh starting");
        RefreshDecision::Proceed
    }

    /// Report the outcome of a refresh the scheduler allowed.
    ///
    /// Ignored (with a log line) when no refresh is in flight, so a
    /// misordered caller can't corrupt the phase.
    pub fn complete(&mut self, success: bool) {
        if self.phase != RefreshPhase::Refreshing {
            debug!("refresh completion reported while idle; ignoring");
            return;
        }
        self.phase = RefreshPhase::Idle;
        if success {
            self.last_refresh = Some(TokioInstant::now());
            self.stats.successes += 1;
            debug!("refresh succeeded");
        } else {
            self.stats.failures += 1;
            debug!("refresh attempt failed");
        }
    }

    /// Record that a fresh session was just issued outside the refresh
    /// path (a login). Counts as a refresh for the visibility gap and
    /// cooldown, so the next focus change doesn't immediately re-refresh
    /// a seconds-old session.
    ///
    /// Does not interrupt an in-flight refresh.
    pub fn mark_fresh(&mut self) {
        let now = TokioInstant::now();
        self.last_refresh = Some(now);
        self.last_attempt = Some(now);
    }

    pub fn phase(&self) -> RefreshPhase {
        self.phase
    }

    pub fn is_refreshing(&self) -> bool {
        self.phase == RefreshPhase::Refreshing
    }

    /// Age of the last successful refresh (or login), if any.
    pub fn last_refresh_elapsed(&self) -> Option<Duration> {
        self.last_refresh.map(|at| at.elapsed())
    }

    /// Snapshot of current counters.
    pub fn stats(&self) -> &RefreshStats {
        &self.stats
    }

    /// The first guard that blocks this proposal, if any.
    fn blocking_guard(
        &self,
        trigger: RefreshTrigger,
        authenticated: bool,
    ) -> Option<SkipReason> {
        if self.phase == RefreshPhase::Refreshing {
            return Some(SkipReason::AlreadyRefreshing);
        }
        if !authenticated {
            return Some(SkipReason::NotAuthenticated);
        }
        if trigger == RefreshTrigger::VisibilityGained {
            if let Some(at) = self.last_refresh {
                if at.elapsed() < self.config.visibility_min_gap {
                    return Some(SkipReason::RefreshedRecently);
                }
            }
        }
        if !trigger.is_forced() {
            if let Some(at) = self.last_attempt {
                if at.elapsed() < self.config.cooldown {
                    return Some(SkipReason::CooldownActive);
                }
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Rearming deadline timer for periodic work.
///
/// A zero period disables the timer: [`wait_for_due`](Self::wait_for_due)
/// then pends forever, which is the correct shape inside `tokio::select!`
/// (other branches still run). After firing, the next deadline is
/// scheduled from *now*, so a slow handler delays the cadence rather than
/// bunching up missed fires.
pub struct RefreshTimer {
    period: Duration,
    next_due: Option<TokioInstant>,
}

impl RefreshTimer {
    /// Create a timer. The first deadline gets up to `initial_jitter`
    /// of random extra delay to desynchronize clients started together.
    pub fn new(period: Duration, initial_jitter: Duration) -> Self {
        let next_due = if period.is_zero() {
            debug!("refresh timer disabled (zero period)");
            None
        } else {
            let jitter = if initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let us = rand::rng()
                    .random_range(0..initial_jitter.as_micros().max(1) as u64);
                Duration::from_micros(us)
            };
            Some(TokioInstant::now() + period + jitter)
        };
        Self { period, next_due }
    }

    /// Wait until the next deadline, then rearm.
    ///
    /// Pends forever when the timer is disabled.
    pub async fn wait_for_due(&mut self) {
        let Some(due) = self.next_due else {
            // This future never completes; select! handles other branches.
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(due).await;
        self.next_due = Some(TokioInstant::now() + self.period);
    }

    pub fn is_disabled(&self) -> bool {
        self.next_due.is_none()
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
