//! Core data types: the session bundle and the user profile inside it.
//!
//! These are the structures the identity provider issues and the session
//! cache stores. They serialize with camelCase field names, matching the
//! JSON the portal's web clients exchange.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user account.
///
/// This is a newtype wrapper around `String` (providers issue opaque IDs,
/// usually UUIDs). Wrapping it means a `UserId` can't be confused with any
/// other string in a signature, and `#[serde(transparent)]` keeps the JSON
/// representation a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The portal role attached to a user account.
///
/// Serialized in SCREAMING_SNAKE_CASE (`"NODE_OFFICER"`), the same spelling
/// the provider stores in its role metadata.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Regular portal user. The default for new accounts.
    #[default]
    User,
    /// Node officer: may manage metadata records for their organization.
    NodeOfficer,
    /// Full administrative access.
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::NodeOfficer => write!(f, "node officer"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user profile snapshot, embedded inside a [`Session`].
///
/// Never mutated independently: profile edits go through the provider's
/// update path, and the caller reflects the returned `User` back into the
/// cached session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    /// Whether the user has confirmed their email address. Accounts that
    /// haven't can register but cannot sign in.
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The authenticated user's credential bundle, held client-side.
///
/// Created on successful login or initial fetch, replaced wholesale on
/// refresh, cleared on logout. The session cache owns exactly one of these
/// at a time; the provider's own storage is the cross-instance share point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) at which the access token expires.
    pub expires_at: u64,
}

impl Session {
    /// Whether the access token's expiry has passed.
    ///
    /// Uses wall-clock time (`SystemTime`), since `expires_at` is an
    /// absolute timestamp issued by the provider.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_now()
    }

    /// Whether the access token expires within the given window.
    ///
    /// Useful for refresh-ahead decisions: `expires_within(5 min)` means a
    /// proactive refresh is worthwhile even though the token still works.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.expires_at <= unix_now().saturating_add(window.as_secs())
    }
}

/// Current wall-clock time as unix seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Provider call inputs / outputs
// ---------------------------------------------------------------------------

/// Input to account creation: credentials plus the profile metadata the
/// portal collects at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// What a successful sign-up yields.
///
/// Deliberately NOT a [`Session`]: registration requires the user to verify
/// their email and sign in explicitly, so account creation never hands out
/// tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: UserId,
    pub email: String,
    pub email_verified: bool,
}

/// A partial profile update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UserUpdate {
    /// `true` when no field is set. An empty update is a no-op at the
    /// provider.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.organization.is_none()
            && self.department.is_none()
            && self.phone.is_none()
    }
}

// =========================================================================
// Tests
// =========================================================================
