//! Status and configuration types for the session cache.
//!
//! A "status" is the client's current belief about authentication. It is
//! deliberately a three-way answer and nothing more: every screen, guard,
//! and background job in the application branches on these same three
//! cases, so adding a fourth would ripple everywhere.

use std::time::Duration;

use authforge_identity::{Session, User};

/// Diagnostic key identifying the session entry in logs, mirroring the
/// cache key a browser client would use for the same record.
pub const SESSION_CACHE_KEY: &str = "session";

/// How long a cached status is trusted before it must be re-verified.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// How often the supervisor re-checks the session in the background.
pub const DEFAULT_REFETCH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Minimum spacing between provider fetch attempts.
pub const DEFAULT_ATTEMPT_COOLDOWN: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Configuration for cache freshness behavior.
///
/// All three knobs are windows of time. The defaults suit an interactive
/// application: trust the cache for five minutes, re-verify every ten in
/// the background, and never hit the provider more than once per thirty
/// seconds from the advisory paths.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a resolved status stays fresh. While fresh, reads are
    /// answered from the cache without touching the provider.
    ///
    /// Default: 5 minutes. Set to zero to treat every read as stale
    /// (useful in tests that want a fetch on every access).
    pub stale_after: Duration,

    /// Interval for the supervisor's periodic background re-check.
    ///
    /// Default: 10 minutes. Set to zero to disable the periodic re-check
    /// entirely; focus-driven and manual fetches still work.
    pub refetch_interval: Duration,

    /// Minimum gap between fetch attempts from advisory triggers (window
    /// focus, periodic re-check). Stops a flapping window or a failing
    /// provider from turning into a request storm.
    ///
    /// Default: 30 seconds. Forced fetches ignore this.
    pub attempt_cooldown: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            refetch_interval: DEFAULT_REFETCH_INTERVAL,
            attempt_cooldown: DEFAULT_ATTEMPT_COOLDOWN,
        }
    }
}

impl CacheConfig {
    /// Fix up suspicious combinations so the config is safe to use.
    ///
    /// Called automatically by [`SessionCache::new`]. Rules:
    /// - `attempt_cooldown` is capped at `stale_after` (when the latter is
    ///   non-zero), otherwise a stale cache could sit unrefreshable.
    /// - A `refetch_interval` shorter than `stale_after` is allowed but
    ///   warned about: those re-checks would always find a fresh cache
    ///   and no-op.
    ///
    /// [`SessionCache::new`]: crate::SessionCache::new
    pub fn validated(mut self) -> Self {
        if !self.stale_after.is_zero() && self.attempt_cooldown > self.stale_after {
            tracing::warn!(
                cooldown_secs = self.attempt_cooldown.as_secs(),
                stale_secs = self.stale_after.as_secs(),
                "attempt_cooldown exceeds stale_after; clamping"
            );
            self.attempt_cooldown = self.stale_after;
        }
        if !self.refetch_interval.is_zero() && self.refetch_interval < self.stale_after {
            tracing::warn!(
                refetch_secs = self.refetch_interval.as_secs(),
                stale_secs = self.stale_after.as_secs(),
                "refetch_interval is shorter than stale_after; periodic re-checks will no-op"
            );
        }
        self
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// The client's current belief about who is signed in.
///
/// This is a state machine with three states:
///
/// ```text
///              ┌──(fetch finds a session)──→ Authenticated
///   Loading ───┤                                 │     ↑
///              │                          (logout or   │ (login or
///              │                           teardown)   │  fresh fetch)
///              └──(nothing / failure)──→ Unauthenticated
/// ```
///
/// - **Loading**: the first fetch has not resolved yet. Screens show a
///   spinner; nothing should redirect or tear down while here.
/// - **Authenticated**: a session is cached. It may be *stale* (past the
///   freshness window) and still served; staleness is the cache's
///   business, not the subscriber's.
/// - **Unauthenticated**: definitively signed out. Distinct from Loading
///   so "not signed in" never flickers during startup.
///
/// There is deliberately no `Error` state: a failed re-check keeps the
/// previous answer and records the error alongside it.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// Initial fetch is still in flight.
    Loading,

    /// Signed in; the session carries the user and token bundle.
    Authenticated(Session),

    /// Definitively signed out.
    Unauthenticated,
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionStatus::Loading)
    }

    /// The cached session, if signed in.
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionStatus::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// The signed-in user, if any.
    pub fn user(&self) -> Option<&User> {
        self.session().map(|s| &s.user)
    }

    /// Short tag for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Loading => "loading",
            SessionStatus::Authenticated(_) => "authenticated",
            SessionStatus::Unauthenticated => "unauthenticated",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = CacheConfig::default();
        assert_eq!(config.stale_after, Duration::from_secs(300));
        assert_eq!(config.refetch_interval, Duration::from_secs(600));
        assert_eq!(config.attempt_cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_validated_clamps_cooldown_to_stale_window() {
        let config = CacheConfig {
            stale_after: Duration::from_secs(60),
            attempt_cooldown: Duration::from_secs(300),
            ..Default::default()
        }
        .validated();
        assert_eq!(config.attempt_cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_validated_keeps_cooldown_with_zero_stale_window() {
        // stale_after == 0 means "always stale"; the cooldown is then the
        // only thing pacing fetches and must survive validation.
        let config = CacheConfig {
            stale_after: Duration::ZERO,
            attempt_cooldown: Duration::from_secs(30),
            ..Default::default()
        }
        .validated();
        assert_eq!(config.attempt_cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_status_accessors() {
        assert!(SessionStatus::Loading.is_loading());
        assert!(!SessionStatus::Loading.is_authenticated());
        assert!(SessionStatus::Unauthenticated.session().is_none());
        assert_eq!(SessionStatus::Loading.label(), "loading");
        assert_eq!(SessionStatus::Unauthenticated.label(), "unauthenticated");
    }
}
