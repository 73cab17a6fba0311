//! Unified error type for the Authforge client.

use authforge_identity::IdentityError;

/// Top-level error returned by [`AuthClient`] operations.
///
/// When using the `authforge` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute auto-generates a `From` impl, so the `?`
/// operator converts provider errors automatically.
///
/// [`AuthClient`]: crate::AuthClient
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A provider-level error (credentials, network, remote rejection).
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The operation needs a signed-in user and there is none.
    #[error("not signed in")]
    NotAuthenticated,
}

impl AuthError {
    /// `true` when retrying the same call cannot succeed because the
    /// stored credentials themselves are gone or rejected.
    pub fn requires_sign_in(&self) -> bool {
        match self {
            AuthError::Identity(err) => {
                matches!(err, IdentityError::Unauthorized)
            }
            AuthError::NotAuthenticated => true,
        }
    }
}
