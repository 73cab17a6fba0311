//! The session cache: the single source of truth for "who is signed in".
//!
//! This is the central piece of the cache layer. It's responsible for:
//! - Holding the current [`SessionStatus`]
//! - Deciding when that answer is stale and due for re-verification
//! - Absorbing fetch results (success, signed-out, failure) into the
//!   right status transition
//! - Pacing fetch attempts so a failing provider isn't hammered
//!
//! # Concurrency note
//!
//! `SessionCache` is NOT thread-safe by itself, and it never performs
//! I/O. This is intentional: the facade owns the provider calls and wraps
//! the cache in a mutex, locking only for the short synchronous moments
//! before and after a fetch. Keeping the cache synchronous means every
//! staleness rule can be unit-tested without a provider in sight.

use tokio::time::Instant;
use tracing::{debug, warn};

use authforge_identity::{IdentityError, Session, User};

use crate::{CacheConfig, SessionStatus, SESSION_CACHE_KEY};

/// Caches the client's authentication status between provider fetches.
///
/// ## Fetch lifecycle
///
/// The facade drives this loop; the cache only answers questions and
/// records outcomes:
///
/// ```text
///  read ──→ is_stale()? ──no──→ status()          (served from cache)
///              │ yes
///              ▼
///        cooldown_active()? ──yes──→ status()     (attempted too recently)
///              │ no
///              ▼
///        begin_attempt() ──→ [provider fetch happens in the facade]
///                                      │
///            ┌─────────────────────────┼─────────────────────┐
///            ▼                         ▼                     ▼
///       install(session)      set_unauthenticated()   record_failure(err)
/// ```
pub struct SessionCache {
    /// The current answer. Starts as [`SessionStatus::Loading`] until the
    /// first fetch resolves one way or the other.
    status: SessionStatus,

    /// When the status was last *resolved* (successful fetch, login,
    /// logout, or a definitive signed-out answer). `None` until then.
    ///
    /// Freshness is measured from this point. `tokio::time::Instant` so
    /// paused-clock tests can steer it.
    fetched_at: Option<Instant>,

    /// When a fetch was last *attempted*, successful or not. Drives the
    /// attempt cooldown.
    last_attempt: Option<Instant>,

    /// Display message of the most recent fetch failure. Cleared by any
    /// successful resolution.
    last_error: Option<String>,

    /// Freshness windows (see [`CacheConfig`]).
    config: CacheConfig,
}

impl SessionCache {
    /// Creates a cache in the `Loading` state.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            status: SessionStatus::Loading,
            fetched_at: None,
            last_attempt: None,
            last_error: None,
            config: config.validated(),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The current status. Always answerable, even mid-fetch.
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// The cached session, if signed in.
    pub fn session(&self) -> Option<&Session> {
        self.status.session()
    }

    /// The most recent fetch failure, if the current status was kept
    /// alive through one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The freshness configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether the cached answer is past its trust window.
    ///
    /// A cache that has never resolved is always stale, and so is one
    /// configured with a zero `stale_after`.
    pub fn is_stale(&self) -> bool {
        match self.fetched_at {
            None => true,
            Some(at) => at.elapsed() >= self.config.stale_after,
        }
    }

    /// Whether a fetch was attempted within the cooldown window.
    ///
    /// Advisory triggers (focus, periodic re-check) respect this; forced
    /// fetches do not.
    pub fn cooldown_active(&self) -> bool {
        match self.last_attempt {
            None => false,
            Some(at) => at.elapsed() < self.config.attempt_cooldown,
        }
    }

    // -----------------------------------------------------------------------
    // Fetch bookkeeping
    // -----------------------------------------------------------------------

    /// Records that a fetch attempt is starting now. Call right before
    /// handing off to the provider so the cooldown covers failures too.
    pub fn begin_attempt(&mut self) {
        self.last_attempt = Some(Instant::now());
    }

    /// Installs a session, overwriting whatever was cached.
    ///
    /// This is the landing point for successful fetches, logins, and
    /// refreshes alike. The cache becomes fresh and any recorded failure
    /// is cleared.
    ///
    /// Returns `true` if the visible status changed.
    pub fn install(&mut self, session: Session) -> bool {
        let user_id = session.user.id.clone();
        let changed = self.transition(SessionStatus::Authenticated(session));
        self.mark_resolved();
        if changed {
            debug!(user = %user_id, "session installed");
        }
        changed
    }

    /// Records a definitive signed-out answer (the provider reported no
    /// session, or the user logged out).
    ///
    /// This is knowledge, not absence of it: the cache becomes fresh, so
    /// reads within the trust window won't re-ask the provider.
    ///
    /// Returns `true` if the visible status changed.
    pub fn set_unauthenticated(&mut self) -> bool {
        let changed = self.transition(SessionStatus::Unauthenticated);
        self.mark_resolved();
        changed
    }

    /// Absorbs a fetch failure.
    ///
    /// The transition depends on where we were:
    /// - `Loading` → `Unauthenticated`. The initial load must resolve;
    ///   a spinner that never ends is worse than a sign-in prompt.
    /// - `Authenticated` → unchanged. The last known session keeps being
    ///   served while re-verification fails (it also keeps its old
    ///   `fetched_at`, so the next read past the cooldown retries).
    /// - `Unauthenticated` → unchanged.
    ///
    /// Returns `true` if the visible status changed.
    pub fn record_failure(&mut self, error: &IdentityError) -> bool {
        self.last_error = Some(error.to_string());

        match self.status {
            SessionStatus::Loading => {
                warn!(%error, "initial session fetch failed; resolving as signed out");
                let changed = self.transition(SessionStatus::Unauthenticated);
                // Resolved, even though unhappily: guards can now route
                // to sign-in instead of spinning.
                self.fetched_at = Some(Instant::now());
                changed
            }
            SessionStatus::Authenticated(_) => {
                warn!(%error, "session re-check failed; keeping last known session");
                false
            }
            SessionStatus::Unauthenticated => {
                debug!(%error, "session fetch failed while signed out");
                false
            }
        }
    }

    /// Patches the cached user in place after a profile update.
    ///
    /// The token bundle is untouched; only the profile changes. No-op
    /// when not signed in (the update response has nowhere to land).
    ///
    /// Returns `true` if a session was present and patched.
    pub fn patch_user(&mut self, user: User) -> bool {
        match &mut self.status {
            SessionStatus::Authenticated(session) => {
                session.user = user;
                // The provider just told us who we are; that counts as a
                // fresh resolution.
                self.mark_resolved();
                true
            }
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Swaps in a new status, reporting whether it differs.
    fn transition(&mut self, next: SessionStatus) -> bool {
        if self.status == next {
            return false;
        }
        debug!(
            cache = SESSION_CACHE_KEY,
            from = self.status.label(),
            to = next.label(),
            "status changed"
        );
        self.status = next;
        true
    }

    /// Stamps the cache fresh and clears failure bookkeeping.
    fn mark_resolved(&mut self) {
        let now = Instant::now();
        self.fetched_at = Some(now);
        self.last_attempt = Some(now);
        self.last_error = None;
    }
}

// =========================================================================
// Tests
// =========================================================================
