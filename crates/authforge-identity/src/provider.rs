//! The identity provider seam.
//!
//! Authforge doesn't implement authentication itself: issuing, refreshing,
//! and revoking credentials is the job of an external identity service
//! (Supabase, GoTrue, Keycloak, a custom backend). This module defines the
//! [`IdentityProvider`] trait the whole session subsystem is written
//! against.
//!
//! # Why a trait?
//!
//! A trait defines WHAT the provider can do without fixing HOW. The same
//! cache, scheduler, and mutation code then runs against:
//! - the bundled [`RestProvider`](crate::RestProvider) in production,
//! - a hand-rolled in-memory provider in demos,
//! - a counting mock in tests.

use std::future::Future;

use crate::{
    IdentityError, NewAccount, RegisteredUser, Session, User, UserUpdate,
};

/// The external identity service the session subsystem wraps.
///
/// All methods are single network round-trips with no retry logic; retry
/// and cooldown policy live in the layers above. The provider owns its own
/// credential storage, which is why `fetch_session` and `refresh_session`
/// take no token arguments.
///
/// # Trait bounds
///
/// - `Send + Sync` → the provider is shared across async tasks (the
///   supervisor refreshes in the background while the UI task signs in).
/// - `'static` → it doesn't borrow temporary data; it lives as long as the
///   client.
///
/// # Example
///
/// ```rust
/// use authforge_identity::{
///     IdentityError, IdentityProvider, NewAccount, RegisteredUser, Session,
///     User, UserId, UserRole, UserUpdate,
/// };
///
/// /// Accepts one hard-coded account. Development only.
/// struct DevProvider;
///
/// fn dev_user() -> User {
///     User {
///         id: UserId("dev-1".into()),
///         email: "dev@example.com".into(),
///         name: "Dev User".into(),
///         role: UserRole::User,
///         email_verified: true,
///         organization: None,
///         department: None,
///         phone: None,
///     }
/// }
///
/// fn dev_session() -> Session {
///     Session {
///         user: dev_user(),
///         access_token: "dev-access".into(),
///         refresh_token: "dev-refresh".into(),
///         expires_at: u64::MAX,
///     }
/// }
///
/// impl IdentityProvider for DevProvider {
///     async fn fetch_session(&self) -> Result<Option<Session>, IdentityError> {
///         Ok(Some(dev_session()))
///     }
///
///     async fn sign_in(
///         &self,
///         email: &str,
///         _password: &str,
///     ) -> Result<Session, IdentityError> {
///         if email == "dev@example.com" {
///             Ok(dev_session())
///         } else {
///             Err(IdentityError::InvalidCredentials)
///         }
///     }
///
///     async fn sign_up(
///         &self,
///         account: NewAccount,
///     ) -> Result<RegisteredUser, IdentityError> {
///         Ok(RegisteredUser {
///             id: UserId("dev-2".into()),
///             email: account.email,
///             email_verified: false,
///         })
///     }
///
///     async fn sign_out(&self) -> Result<(), IdentityError> {
///         Ok(())
///     }
///
///     async fn refresh_session(&self) -> Result<Session, IdentityError> {
///         Ok(dev_session())
///     }
///
///     async fn update_user(
///         &self,
///         _update: UserUpdate,
///     ) -> Result<User, IdentityError> {
///         Ok(dev_user())
///     }
/// }
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns the current session according to the provider's own storage,
    /// or `None` when nobody is signed in.
    ///
    /// This is the read the session cache fronts. It must report the
    /// provider's truth, not a guess: a stored-but-revoked token should
    /// come back as `Ok(None)`, not as an error.
    fn fetch_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, IdentityError>> + Send;

    /// Exchanges credentials for a fresh session.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, IdentityError>> + Send;

    /// Creates a new account.
    ///
    /// Never returns a session: the portal requires email verification
    /// before the first sign-in, so implementations must not persist any
    /// tokens the remote service may hand back here.
    fn sign_up(
        &self,
        account: NewAccount,
    ) -> impl Future<Output = Result<RegisteredUser, IdentityError>> + Send;

    /// Revokes the current session at the provider.
    ///
    /// Local sign-out proceeds even when this fails; callers log the error
    /// and continue tearing down.
    fn sign_out(&self) -> impl Future<Output = Result<(), IdentityError>> + Send;

    /// Asks the provider to mint a fresh session from its stored refresh
    /// credential.
    ///
    /// # Returns
    /// - `Ok(Session)` with a new token bundle
    /// - `Err(IdentityError::Unauthorized)` when there is nothing left to
    ///   refresh (missing or revoked refresh credential)
    fn refresh_session(
        &self,
    ) -> impl Future<Output = Result<Session, IdentityError>> + Send;

    /// Applies a partial profile update and returns the updated user.
    fn update_user(
        &self,
        update: UserUpdate,
    ) -> impl Future<Output = Result<User, IdentityError>> + Send;
}
