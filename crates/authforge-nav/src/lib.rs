//! Navigation locking and route helpers for Authforge.
//!
//! Auth flows end in redirects, and several can end at the same moment:
//! a login completing while a stale-session teardown fires, or a user
//! clicking logout twice. Letting every caller push a route produces
//! redirect loops and half-rendered screens. This crate provides:
//!
//! 1. **A navigation gate** ([`NavigationGate`]): first redirect wins,
//!    later ones within a short hold are silently dropped
//! 2. **The navigator seam** ([`Navigator`]): the one-method trait the
//!    host application implements to actually change routes
//! 3. **Route helpers**: the sign-in and home paths, plus safe handling
//!    of the `from` return-target query parameter

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// How long a navigation holds the gate before it lapses on its own.
///
/// Long enough to cover a route transition plus the screen settling,
/// short enough that a missed release can't wedge navigation.
pub const DEFAULT_NAV_HOLD: Duration = Duration::from_secs(2);

/// Route of the sign-in screen.
pub const SIGN_IN_PATH: &str = "/auth/signin";

/// Route of the landing screen after sign-in.
pub const HOME_PATH: &str = "/";

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// The seam between auth flows and the host application's router.
///
/// Implementations push a route change and return immediately; auth flows
/// never wait for a navigation to "finish". A test double can simply
/// record the paths it was handed.
pub trait Navigator: Send + Sync + 'static {
    /// Fire-and-forget route change to an application-internal path.
    fn navigate(&self, path: &str);
}

// ---------------------------------------------------------------------------
// NavigationGate
// ---------------------------------------------------------------------------

/// First-wins lock around redirects.
///
/// The contract is deliberately quiet: a caller that fails to acquire the
/// gate does *nothing*. No queueing, no retry, no error. Whoever locked
/// it is already navigating somewhere sensible, and a dropped redirect is
/// strictly better than two competing ones.
///
/// Expiry is lazy: there is no background task. A lock older than the
/// hold is simply treated as free by the next caller, so a flow that
/// forgot to [`release`](Self::release) can't block navigation for good.
///
/// Not thread-safe by itself; the facade owns it behind a mutex.
pub struct NavigationGate {
    hold: Duration,
    locked_at: Option<Instant>,
    /// How many acquisitions were turned away. Surfaced in shutdown
    /// logs; a high count usually means a redirect loop upstream.
    suppressed: u64,
}

impl Default for NavigationGate {
    fn default() -> Self {
        Self::new(DEFAULT_NAV_HOLD)
    }
}

impl NavigationGate {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            locked_at: None,
            suppressed: 0,
        }
    }

    /// Try to take the gate. Returns `true` if this caller may navigate.
    ///
    /// On `false` the caller must drop its navigation entirely.
    pub fn try_acquire(&mut self) -> bool {
        if self.is_locked() {
            self.suppressed += 1;
            debug!(
                suppressed = self.suppressed,
                "navigation suppressed; gate is held"
            );
            return false;
        }
        self.locked_at = Some(Instant::now());
        true
    }

    /// Whether the gate is currently held (and the hold hasn't lapsed).
    pub fn is_locked(&self) -> bool {
        match self.locked_at {
            None => false,
            Some(at) => at.elapsed() < self.hold,
        }
    }

    /// Re-stamp the hold from now. No-op when the gate isn't held.
    ///
    /// Used by flows that acquire early (before a provider round-trip)
    /// and navigate late, so the post-redirect window stays covered.
    pub fn touch(&mut self) {
        if self.is_locked() {
            self.locked_at = Some(Instant::now());
        }
    }

    /// Release the gate ahead of the hold lapsing.
    ///
    /// Optional: hosts that surface a navigation-completed event can
    /// call this to reopen the gate immediately.
    pub fn release(&mut self) {
        self.locked_at = None;
    }

    /// How many navigations have been dropped by this gate.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Time left on the current hold, if held.
    pub fn remaining(&self) -> Option<Duration> {
        let at = self.locked_at?;
        self.hold.checked_sub(at.elapsed()).filter(|d| !d.is_zero())
    }
}

// ---------------------------------------------------------------------------
// Route helpers
// ---------------------------------------------------------------------------

/// Whether a `from` value names a place inside the application.
///
/// Anything else (absolute URLs, protocol-relative `//host` forms,
/// back-slash variants) is refused so the return-target parameter can't
/// be turned into an open redirect.
pub fn is_internal_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

/// The sign-in route, carrying the interrupted location as a `from`
/// query parameter so sign-in can send the user back.
pub fn signin_path_with_from(from: Option<&str>) -> String {
    match from {
        Some(path) if !path.is_empty() => {
            format!("{SIGN_IN_PATH}?from={}", urlencoding::encode(path))
        }
        _ => SIGN_IN_PATH.to_string(),
    }
}

/// Where to land after a successful sign-in.
///
/// Honors a `from` value (already URL-decoded by the host) when it is an
/// internal path; everything else falls back to [`HOME_PATH`].
pub fn resolve_post_login_target(from: Option<&str>) -> String {
    match from {
        Some(path) if is_internal_path(path) => path.to_string(),
        _ => HOME_PATH.to_string(),
    }
}

// =========================================================================
// Tests
// =========================================================================
