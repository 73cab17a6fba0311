//! Error taxonomy for identity provider calls.

/// Errors surfaced by an [`IdentityProvider`](crate::IdentityProvider).
///
/// Every provider failure is mapped into one of these variants at the
/// provider boundary. The `Display` string is the single user-facing
/// message; [`code`](Self::code) is the machine-readable companion, so
/// callers never need to parse the message text.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Wrong email or password. Always user-visible, never retried.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// An account already exists for this email address.
    #[error("an account with this email already exists")]
    EmailTaken,

    /// The provider could not be reached (network failure, timeout, 5xx).
    /// Retried passively through the next scheduled refresh cycle only.
    #[error("the authentication service is unreachable: {0}")]
    Unavailable(String),

    /// The provider no longer accepts the current credentials (expired or
    /// revoked token, failed refresh). The session must be torn down.
    #[error("your session has expired, please sign in again")]
    Unauthorized,

    /// The provider rejected the request for rate reasons.
    #[error("too many attempts, please wait a moment and try again")]
    RateLimited,

    /// The provider rejected the request for any other reason (malformed
    /// response, unexpected status, validation failure on its side).
    #[error("the authentication service rejected the request: {0}")]
    Rejected(String),
}

impl IdentityError {
    /// Machine-readable error code, stable across message rewording.
    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::InvalidCredentials => "invalid_credentials",
            IdentityError::EmailTaken => "email_taken",
            IdentityError::Unavailable(_) => "provider_unavailable",
            IdentityError::Unauthorized => "unauthorized",
            IdentityError::RateLimited => "rate_limited",
            IdentityError::Rejected(_) => "rejected",
        }
    }

    /// `true` for errors caused by what the user typed. These are shown
    /// and never retried: resubmitting the same credentials cannot help.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            IdentityError::InvalidCredentials | IdentityError::EmailTaken
        )
    }

    /// `true` for errors that may clear up on their own. The scheduler
    /// retries these passively (next cycle), never immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IdentityError::Unavailable(_) | IdentityError::RateLimited
        )
    }
}

// =========================================================================
// Tests
// =========================================================================
