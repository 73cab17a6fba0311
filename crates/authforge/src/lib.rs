//! # Authforge
//!
//! Client-side authentication lifecycle toolkit for portal applications.
//!
//! Authforge keeps a signed-in session alive for the lifetime of a
//! client application: it caches the session with staleness tracking,
//! refreshes tokens in the background, recovers from rejected requests,
//! and debounces the redirects auth flows love to fire. Applications
//! implement [`IdentityProvider`](authforge_identity::IdentityProvider)
//! for their backend and [`Navigator`](authforge_nav::Navigator) for
//! their routing, and the framework handles the rest.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authforge::prelude::*;
//!
//! // Implement IdentityProvider and Navigator for your stack, then:
//! // let client = AuthClient::builder(provider, navigator, MemoryCredentials::new())
//! //     .build();
//! // let supervisor = client.spawn_supervisor();
//! // client.login(LoginRequest::new("you@example.com", "secret")).await?;
//! ```

mod client;
mod error;
mod notify;
mod supervisor;

pub use client::{
    AuthClient, AuthClientBuilder, ClientConfig, LoginRequest,
    RecoveryOutcome, RefreshOutcome, DEFAULT_POST_LOGIN_DELAY,
};
pub use error::AuthError;
pub use notify::{LogNotifier, Notice, NoticeKind, Notifier};
pub use supervisor::SupervisorHandle;

// The sub-crates stay importable under short names for anything the
// re-exports above do not cover.
pub use authforge_identity as identity;
pub use authforge_nav as nav;
pub use authforge_refresh as refresh;
pub use authforge_session as session;

/// Everything a typical embedding needs in one import.
pub mod prelude {
    pub use crate::{
        AuthClient, AuthClientBuilder, AuthError, ClientConfig,
        LogNotifier, LoginRequest, Notice, NoticeKind, Notifier,
        RecoveryOutcome, RefreshOutcome, SupervisorHandle,
    };

    pub use authforge_identity::{
        CredentialStore, IdentityError, IdentityProvider,
        MemoryCredentials, NewAccount, RegisteredUser, Session, User,
        UserId, UserRole, UserUpdate,
    };
    pub use authforge_nav::{Navigator, HOME_PATH, SIGN_IN_PATH};
    pub use authforge_refresh::{RefreshConfig, SkipReason};
    pub use authforge_session::{CacheConfig, SessionStatus};
}
