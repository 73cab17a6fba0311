//! Client-side session caching for Authforge.
//!
//! This crate answers one question cheaply: "who is signed in right now?"
//! It is responsible for:
//!
//! 1. **Status tracking**: exactly three answers, still finding out,
//!    signed in as this user, or signed out ([`SessionStatus`])
//! 2. **Staleness**: a cached answer is trusted for a configurable
//!    window, then re-verified against the identity provider
//! 3. **Degrading gracefully**: a failed re-check keeps serving the last
//!    known session instead of logging the user out ([`SessionCache`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)  ← drives fetches, publishes status to subscribers
//!     ↕
//! Cache Layer (this crate)  ← decides when a fetch is due, holds the answer
//!     ↕
//! Identity Layer (below)  ← provides Session, User, IdentityError
//! ```
//!
//! The cache itself is a plain synchronous state machine. It never calls
//! the provider and holds no locks; the facade owns the async fetch
//! plumbing and wraps the cache in a `Mutex`.

mod cache;
mod status;

pub use cache::SessionCache;
pub use status::{
    CacheConfig, SessionStatus, DEFAULT_ATTEMPT_COOLDOWN,
    DEFAULT_REFETCH_INTERVAL, DEFAULT_STALE_AFTER, SESSION_CACHE_KEY,
};
