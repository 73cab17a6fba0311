//! REST identity provider.
//!
//! Speaks a GoTrue-style HTTP surface (the wire contract of Supabase Auth
//! and compatible services): password and refresh-token grants against
//! `/auth/v1/token`, plus `/signup`, `/logout`, and `/user`. Every remote
//! failure is mapped into the [`IdentityError`] taxonomy here, so the rest
//! of the stack never sees an HTTP status.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::types::unix_now;
use crate::{
    IdentityError, IdentityProvider, NewAccount, RegisteredUser, Session,
    User, UserId, UserRole, UserUpdate,
};

/// Fallback access-token lifetime when the provider omits both
/// `expires_at` and `expires_in`.
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Every request gets a hard deadline so a hung provider can't wedge a
/// sign-in flow indefinitely.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for a [`RestProvider`].
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Service origin, e.g. `https://project.supabase.co`. Trailing
    /// slashes are tolerated.
    pub base_url: String,
    /// Public API key sent as the `apikey` header on every request.
    pub api_key: String,
    /// Per-request timeout. Default: 10 seconds.
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// An [`IdentityProvider`] backed by a GoTrue-style REST service.
///
/// Holds the current token pair internally (the provider owns credential
/// storage; see the trait docs). The lock around the pair is synchronous
/// and never held across an await: tokens are cloned out before a request
/// and written back after.
pub struct RestProvider {
    http: reqwest::Client,
    config: RestConfig,
    tokens: RwLock<Option<TokenPair>>,
}

#[derive(Debug, Clone)]
struct TokenPair {
    access: String,
    refresh: String,
    expires_at: u64,
}

impl RestProvider {
    pub fn new(config: RestConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                IdentityError::Rejected(format!("http client init failed: {e}"))
            })?;

        Ok(Self {
            http,
            config,
            tokens: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/auth/v1{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    fn current_tokens(&self) -> Option<TokenPair> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_tokens(&self, pair: TokenPair) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) =
            Some(pair);
    }

    fn take_tokens(&self) -> Option<TokenPair> {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// POSTs to the token endpoint with the given grant type and body.
    async fn post_token(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<(Session, TokenPair), IdentityError> {
        let url = format!("{}?grant_type={grant_type}", self.url("/token"));
        let resp = self
            .http
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(connection_error)?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_error_status(status, &text));
        }

        let token_resp: TokenResponse =
            resp.json().await.map_err(malformed_response)?;
        Ok(session_from_token_response(token_resp))
    }
}

impl IdentityProvider for RestProvider {
    async fn fetch_session(&self) -> Result<Option<Session>, IdentityError> {
        let Some(pair) = self.current_tokens() else {
            return Ok(None);
        };

        let resp = self
            .http
            .get(self.url("/user"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&pair.access)
            .send()
            .await
            .map_err(connection_error)?;

        match resp.status().as_u16() {
            200 => {
                let payload: UserPayload =
                    resp.json().await.map_err(malformed_response)?;
                Ok(Some(Session {
                    user: user_from_payload(payload),
                    access_token: pair.access,
                    refresh_token: pair.refresh,
                    expires_at: pair.expires_at,
                }))
            }
            // Stored credentials are no longer accepted: that is a
            // signed-out truth, not a failure of this call.
            401 | 403 => {
                self.take_tokens();
                Ok(None)
            }
            status => {
                let text = resp.text().await.unwrap_or_default();
                Err(map_error_status(status, &text))
            }
        }
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let (session, pair) = self
            .post_token(
                "password",
                json!({ "email": email, "password": password }),
            )
            .await?;

        self.store_tokens(pair);
        tracing::debug!(user = %session.user.id, "sign-in succeeded");
        Ok(session)
    }

    async fn sign_up(
        &self,
        account: NewAccount,
    ) -> Result<RegisteredUser, IdentityError> {
        let body = json!({
            "email": account.email,
            "password": account.password,
            "data": metadata_object(
                Some(&account.name),
                account.organization.as_deref(),
                account.department.as_deref(),
                account.phone.as_deref(),
            ),
        });

        let resp = self
            .http
            .post(self.url("/signup"))
            .header("apikey", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(connection_error)?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_error_status(status, &text));
        }

        let parsed: SignUpResponse =
            resp.json().await.map_err(malformed_response)?;

        // Deployments with auto-confirm enabled hand back a full token
        // bundle here. Those tokens are discarded: registration must not
        // establish a session before the email is verified.
        let payload = match parsed {
            SignUpResponse::WithSession(token_resp) => token_resp.user,
            SignUpResponse::UserOnly(payload) => payload,
        };

        tracing::debug!(user = %payload.id, "account created");
        Ok(RegisteredUser {
            email_verified: payload.email_confirmed_at.is_some(),
            id: UserId(payload.id),
            email: payload.email,
        })
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        // Clear local tokens first: local sign-out must succeed even when
        // the revocation request cannot reach the provider.
        let Some(pair) = self.take_tokens() else {
            return Ok(());
        };

        let resp = self
            .http
            .post(self.url("/logout"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&pair.access)
            .send()
            .await
            .map_err(connection_error)?;

        match resp.status().as_u16() {
            // An already-invalid token is as signed out as it gets.
            s if (200..300).contains(&s) => Ok(()),
            401 | 403 => Ok(()),
            status => {
                let text = resp.text().await.unwrap_or_default();
                Err(map_error_status(status, &text))
            }
        }
    }

    async fn refresh_session(&self) -> Result<Session, IdentityError> {
        let Some(pair) = self.current_tokens() else {
            return Err(IdentityError::Unauthorized);
        };

        let result = self
            .post_token(
                "refresh_token",
                json!({ "refresh_token": pair.refresh }),
            )
            .await;

        let (session, new_pair) = match result {
            Ok(ok) => ok,
            // A 400 from the refresh grant means the refresh token is
            // spent or revoked, which is an expired session, not a
            // credentials problem.
            Err(IdentityError::InvalidCredentials) => {
                return Err(IdentityError::Unauthorized);
            }
            Err(other) => return Err(other),
        };

        self.store_tokens(new_pair);
        tracing::debug!(user = %session.user.id, "session refreshed");
        Ok(session)
    }

    async fn update_user(
        &self,
        update: UserUpdate,
    ) -> Result<User, IdentityError> {
        let Some(pair) = self.current_tokens() else {
            return Err(IdentityError::Unauthorized);
        };

        let body = json!({
            "data": metadata_object(
                update.name.as_deref(),
                update.organization.as_deref(),
                update.department.as_deref(),
                update.phone.as_deref(),
            ),
        });

        let resp = self
            .http
            .put(self.url("/user"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&pair.access)
            .json(&body)
            .send()
            .await
            .map_err(connection_error)?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_error_status(status, &text));
        }

        let payload: UserPayload =
            resp.json().await.map_err(malformed_response)?;
        Ok(user_from_payload(payload))
    }
}

// ---------------------------------------------------------------------------
// Wire DTOs
// ---------------------------------------------------------------------------

/// Token endpoint response (password and refresh-token grants).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    expires_at: Option<u64>,
    user: UserPayload,
}

/// The provider's user object.
#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    email: String,
    #[serde(default)]
    email_confirmed_at: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
    #[serde(default)]
    app_metadata: AppMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    organization: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    /// Portal role as stored by the provider. Parsed leniently: unknown
    /// or missing values fall back to the regular user role.
    #[serde(default)]
    role: Option<String>,
}

/// Sign-up responses come in two shapes depending on whether the
/// deployment auto-confirms accounts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    WithSession(TokenResponse),
    UserOnly(UserPayload),
}

/// Error body shape. The token endpoint uses `error`/`error_description`,
/// everything else uses `code`/`msg`. All fields optional so a partial or
/// unexpected body still parses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl ErrorBody {
    fn detail(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.error.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Mapping helpers
// ---------------------------------------------------------------------------

fn connection_error(e: reqwest::Error) -> IdentityError {
    IdentityError::Unavailable(e.to_string())
}

fn malformed_response(e: reqwest::Error) -> IdentityError {
    IdentityError::Rejected(format!("malformed response: {e}"))
}

/// Maps a non-2xx status plus its body into the error taxonomy.
fn map_error_status(status: u16, body_text: &str) -> IdentityError {
    let body: ErrorBody = serde_json::from_str(body_text).unwrap_or_default();
    let detail = body
        .detail()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("status {status}"));

    match status {
        400 => {
            let invalid_grant = body.error.as_deref() == Some("invalid_grant")
                || detail.to_ascii_lowercase().contains("invalid login");
            if invalid_grant {
                IdentityError::InvalidCredentials
            } else {
                IdentityError::Rejected(detail)
            }
        }
        401 | 403 => IdentityError::Unauthorized,
        422 => {
            let lower = detail.to_ascii_lowercase();
            if lower.contains("already registered")
                || lower.contains("already exists")
            {
                IdentityError::EmailTaken
            } else {
                IdentityError::Rejected(detail)
            }
        }
        429 => IdentityError::RateLimited,
        500..=599 => IdentityError::Unavailable(detail),
        _ => IdentityError::Rejected(detail),
    }
}

fn user_from_payload(payload: UserPayload) -> User {
    let role = match payload.app_metadata.role.as_deref() {
        Some("ADMIN") => UserRole::Admin,
        Some("NODE_OFFICER") => UserRole::NodeOfficer,
        _ => UserRole::User,
    };

    // Accounts created outside the portal may have no display name; the
    // email address stands in so the field is never empty.
    let name = payload
        .user_metadata
        .name
        .clone()
        .unwrap_or_else(|| payload.email.clone());

    User {
        id: UserId(payload.id),
        name,
        role,
        email_verified: payload.email_confirmed_at.is_some(),
        organization: payload.user_metadata.organization,
        department: payload.user_metadata.department,
        phone: payload.user_metadata.phone,
        email: payload.email,
    }
}

fn session_from_token_response(resp: TokenResponse) -> (Session, TokenPair) {
    let expires_at = resp.expires_at.unwrap_or_else(|| {
        unix_now() + resp.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS)
    });

    let pair = TokenPair {
        access: resp.access_token.clone(),
        refresh: resp.refresh_token.clone(),
        expires_at,
    };

    let session = Session {
        user: user_from_payload(resp.user),
        access_token: resp.access_token,
        refresh_token: resp.refresh_token,
        expires_at,
    };

    (session, pair)
}

/// Builds the `data` metadata object, omitting unset fields.
fn metadata_object(
    name: Option<&str>,
    organization: Option<&str>,
    department: Option<&str>,
    phone: Option<&str>,
) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    if let Some(name) = name {
        map.insert("name".into(), json!(name));
    }
    if let Some(organization) = organization {
        map.insert("organization".into(), json!(organization));
    }
    if let Some(department) = department {
        map.insert("department".into(), json!(department));
    }
    if let Some(phone) = phone {
        map.insert("phone".into(), json!(phone));
    }
    serde_json::Value::Object(map)
}

// =========================================================================
// Tests
// =========================================================================
