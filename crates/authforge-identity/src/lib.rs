//! Identity provider contract for Authforge.
//!
//! This crate defines the "language" spoken between the session subsystem
//! and the external identity provider:
//!
//! - **Types** ([`Session`], [`User`], [`UserRole`], etc.): the credential
//!   bundle and profile data the provider issues.
//! - **Seams** ([`IdentityProvider`], [`CredentialStore`]): the traits the
//!   rest of the stack is written against. Swap in a REST provider, a dev
//!   stub, or a test mock without touching any session logic.
//! - **Errors** ([`IdentityError`]): the taxonomy every provider failure is
//!   mapped into before it reaches a user.
//! - **REST implementation** ([`RestProvider`], behind the default `rest`
//!   feature): a concrete provider speaking a GoTrue-style HTTP surface.
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)        ← orchestrates login/logout/refresh
//!     ↕
//! Session cache         ← stores what this crate's provider returns
//!     ↕
//! Identity layer (this crate)  ← provider contract and data model
//! ```

mod error;
mod provider;
mod store;
mod types;

#[cfg(feature = "rest")]
mod rest;

pub use error::IdentityError;
pub use provider::IdentityProvider;
pub use store::{
    CredentialStore, MemoryCredentials, AUTH_COOKIE, REFRESH_COOKIE,
    REMEMBERED_EMAIL_KEY,
};
pub use types::{
    NewAccount, RegisteredUser, Session, User, UserId, UserRole, UserUpdate,
};

#[cfg(feature = "rest")]
pub use rest::{RestConfig, RestProvider};
