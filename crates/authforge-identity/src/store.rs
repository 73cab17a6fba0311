//! Credential storage heuristics.
//!
//! The session subsystem never parses cookies or tokens itself, but it does
//! use one signal from persistent storage: "do persisted credentials still
//! exist?". If the in-memory cache says authenticated while the cookies are
//! gone (user cleared browser storage, another tab signed out), that
//! anomaly forces a refetch. The check lives behind [`CredentialStore`] so
//! the storage mechanism can be swapped without touching scheduler logic.
//!
//! The same store holds the remembered-email entry used to pre-fill the
//! login form.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Cookie holding the auth token. Existence-checked only, never parsed.
pub const AUTH_COOKIE: &str = "auth_token";

/// Cookie holding the refresh token. Existence-checked only, never parsed.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Persistent storage key for the login form's remembered email.
pub const REMEMBERED_EMAIL_KEY: &str = "rememberedEmail";

/// Read/write access to the credentials the host environment persists.
///
/// Implementations are cheap, synchronous, and infallible: a cookie jar, a
/// keychain, a file, or plain memory. Methods take `&self`; implementations
/// handle their own interior mutability.
pub trait CredentialStore: Send + Sync + 'static {
    /// `true` when at least one of the persisted credential entries
    /// ([`AUTH_COOKIE`] or [`REFRESH_COOKIE`]) still exists.
    ///
    /// A pure existence heuristic: it says nothing about validity. The
    /// supervisor treats "authenticated in memory but nothing persisted"
    /// as an anomaly and refetches.
    fn has_persisted_credentials(&self) -> bool;

    /// The remembered login email, if the user opted in.
    fn remembered_email(&self) -> Option<String>;

    /// Stores the login email for pre-filling the next sign-in.
    fn remember_email(&self, email: &str);

    /// Removes the remembered email.
    fn forget_email(&self);
}

/// A shared store is still a store. Lets callers keep a handle to the
/// same storage the client owns.
impl<S: CredentialStore> CredentialStore for Arc<S> {
    fn has_persisted_credentials(&self) -> bool {
        (**self).has_persisted_credentials()
    }

    fn remembered_email(&self) -> Option<String> {
        (**self).remembered_email()
    }

    fn remember_email(&self, email: &str) {
        (**self).remember_email(email)
    }

    fn forget_email(&self) {
        (**self).forget_email()
    }
}

// ---------------------------------------------------------------------------
// MemoryCredentials
// ---------------------------------------------------------------------------

/// An in-memory [`CredentialStore`] for demos and tests.
///
/// Cookies are modeled as a set of names; tests flip them explicitly to
/// simulate the browser writing or clearing storage.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    cookies: HashSet<String>,
    remembered: Option<String>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a cookie as present.
    pub fn set_cookie(&self, name: &str) {
        self.lock().cookies.insert(name.to_string());
    }

    /// Marks a cookie as absent.
    pub fn clear_cookie(&self, name: &str) {
        self.lock().cookies.remove(name);
    }

    /// Clears every cookie, simulating the user wiping browser storage.
    pub fn clear_all_cookies(&self) {
        self.lock().cookies.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // The state is plain data; a poisoned lock still holds a usable
        // value, so recover it instead of propagating the panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentials {
    fn has_persisted_credentials(&self) -> bool {
        let state = self.lock();
        state.cookies.contains(AUTH_COOKIE)
            || state.cookies.contains(REFRESH_COOKIE)
    }

    fn remembered_email(&self) -> Option<String> {
        self.lock().remembered.clone()
    }

    fn remember_email(&self, email: &str) {
        self.lock().remembered = Some(email.to_string());
    }

    fn forget_email(&self) {
        self.lock().remembered = None;
    }
}

// =========================================================================
// Tests
// =========================================================================
