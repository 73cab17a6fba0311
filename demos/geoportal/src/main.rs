//! A national geospatial data portal's auth lifecycle, driven from the
//! terminal.
//!
//! The portal serves map layers to government node officers. This demo
//! wires an in-memory identity provider and a logging navigator into an
//! [`AuthClient`], then walks the full lifecycle: a guarded route with
//! nobody signed in, registration and email confirmation, sign-in with a
//! deep-link redirect, a profile update, manual and background refreshes,
//! tab visibility changes, and sign-out.
//!
//! Run with `RUST_LOG=debug` to watch the client's internal decisions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use authforge::identity::AUTH_COOKIE;
use authforge::prelude::*;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Demo identity provider
// ---------------------------------------------------------------------------

/// In-memory stand-in for the portal's identity service.
///
/// Accounts live in a map keyed by email; at most one session is signed
/// in at a time, mirroring a single browser profile. Cloning shares the
/// same state, so the demo can poke at accounts while the client holds
/// its own handle.
#[derive(Clone, Default)]
struct DemoProvider {
    inner: Arc<DemoState>,
}

#[derive(Default)]
struct DemoState {
    accounts: Mutex<HashMap<String, DemoAccount>>,
    signed_in: Mutex<Option<Session>>,
    token_counter: AtomicU64,
}

struct DemoAccount {
    password: String,
    verified: bool,
    user: User,
}

impl DemoProvider {
    /// A provider pre-seeded with one verified node officer account.
    fn with_seeded_officer() -> Self {
        let provider = Self::default();
        provider.accounts().insert(
            "amina.bello@example.gov.ng".into(),
            DemoAccount {
                password: "Correct-Horse-9".into(),
                verified: true,
                user: User {
                    id: UserId("officer-001".into()),
                    email: "amina.bello@example.gov.ng".into(),
                    name: "Amina Bello".into(),
                    role: UserRole::NodeOfficer,
                    email_verified: true,
                    organization: Some("Office of the Surveyor General".into()),
                    department: Some("Geodata Services".into()),
                    phone: None,
                },
            },
        );
        provider
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<String, DemoAccount>> {
        self.inner
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn signed_in(&self) -> MutexGuard<'_, Option<Session>> {
        self.inner
            .signed_in
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks an account's email as confirmed, as the verification link
    /// in the confirmation mail would.
    fn confirm_email(&self, email: &str) {
        if let Some(account) = self.accounts().get_mut(email) {
            account.verified = true;
            account.user.email_verified = true;
        }
    }

    fn mint_session(&self, user: User) -> Session {
        let n = self.inner.token_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Session {
            user,
            access_token: format!("demo-access-{n}"),
            refresh_token: format!("demo-refresh-{n}"),
            expires_at: unix_now() + 3600,
        }
    }
}

/// Current wall-clock time as unix seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl IdentityProvider for DemoProvider {
    async fn fetch_session(&self) -> Result<Option<Session>, IdentityError> {
        Ok(self.signed_in().clone())
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let session = {
            let accounts = self.accounts();
            let account = accounts
                .get(email)
                .ok_or(IdentityError::InvalidCredentials)?;
            if account.password != password {
                return Err(IdentityError::InvalidCredentials);
            }
            if !account.verified {
                return Err(IdentityError::Rejected(
                    "email not confirmed".into(),
                ));
            }
            self.mint_session(account.user.clone())
        };
        *self.signed_in() = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(
        &self,
        account: NewAccount,
    ) -> Result<RegisteredUser, IdentityError> {
        let mut accounts = self.accounts();
        if accounts.contains_key(&account.email) {
            return Err(IdentityError::EmailTaken);
        }
        let id = UserId(format!("user-{}", accounts.len() + 1));
        accounts.insert(
            account.email.clone(),
            DemoAccount {
                password: account.password,
                verified: false,
                user: User {
                    id: id.clone(),
                    email: account.email.clone(),
                    name: account.name,
                    role: UserRole::User,
                    email_verified: false,
                    organization: account.organization,
                    department: account.department,
                    phone: account.phone,
                },
            },
        );
        Ok(RegisteredUser { id, email: account.email, email_verified: false })
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        *self.signed_in() = None;
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session, IdentityError> {
        let user = self
            .signed_in()
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or(IdentityError::Unauthorized)?;
        let session = self.mint_session(user);
        *self.signed_in() = Some(session.clone());
        Ok(session)
    }

    async fn update_user(
        &self,
        update: UserUpdate,
    ) -> Result<User, IdentityError> {
        let mut signed_in = self.signed_in();
        let session =
            signed_in.as_mut().ok_or(IdentityError::Unauthorized)?;
        let user = &mut session.user;
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(organization) = update.organization {
            user.organization = Some(organization);
        }
        if let Some(department) = update.department {
            user.department = Some(department);
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        let updated = user.clone();
        if let Some(account) = self.accounts().get_mut(&updated.email) {
            account.user = updated.clone();
        }
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Portal navigator
// ---------------------------------------------------------------------------

/// Stands in for the portal's router; a real embedding would push onto
/// the browser history here.
struct PortalNavigator;

impl Navigator for PortalNavigator {
    fn navigate(&self, path: &str) {
        info!(%path, "portal route changed");
    }
}

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,authforge=debug")),
        )
        .with_target(false)
        .init();

    eprintln!("geoportal auth walkthrough (RUST_LOG=debug for internals)");

    let provider = DemoProvider::with_seeded_officer();
    let credentials = Arc::new(MemoryCredentials::new());
    let client = AuthClient::builder(
        provider.clone(),
        PortalNavigator,
        Arc::clone(&credentials),
    )
    .build();
    let supervisor = client.spawn_supervisor();
    sleep(Duration::from_millis(200)).await;

    // A guarded map layer is requested before anyone signs in. The
    // supervisor already resolved the session to signed-out, so this
    // fails on the cached answer without another provider round-trip.
    info!("--- guarded route, nobody signed in ---");
    match client.ensure_session().await {
        Ok(_) => info!("unexpectedly signed in"),
        Err(err) => info!(%err, "route guard rejected the request"),
    }

    // A new technician registers. No session is issued: the portal
    // requires the confirmation link first, and the client routes to
    // sign-in.
    info!("--- registration ---");
    let registered = client
        .register(NewAccount {
            email: "chidi.okeke@example.gov.ng".into(),
            password: "Plateau-Basin-4".into(),
            name: "Chidi Okeke".into(),
            organization: Some("Federal Ministry of Water Resources".into()),
            department: None,
            phone: None,
        })
        .await?;
    info!(email = %registered.email, "account created, awaiting confirmation");

    // Signing in before clicking the confirmation link is refused.
    let denied = client
        .login(LoginRequest::new(
            "chidi.okeke@example.gov.ng",
            "Plateau-Basin-4",
        ))
        .await;
    if let Err(err) = denied {
        info!(%err, "sign-in refused before confirmation");
    }
    provider.confirm_email("chidi.okeke@example.gov.ng");
    info!("confirmation link clicked");

    // The seeded officer signs in from a deep link into the layer
    // catalogue. "Remember me" stores the email for the next visit, and
    // the redirect lands on the page she originally asked for.
    info!("--- sign-in with deep link ---");
    sleep(Duration::from_secs(2)).await; // registration redirect hold
    let session = client
        .login(
            LoginRequest::new("amina.bello@example.gov.ng", "Correct-Horse-9")
                .remember(true)
                .from_path("/map/layers?region=plateau"),
        )
        .await?;
    info!(user = %session.user.name, token = %session.access_token, "signed in");
    // The browser would now hold the auth cookie; mirror that here so
    // the visibility heuristics below see a persisted credential.
    credentials.set_cookie(AUTH_COOKIE);

    // Profile update, patched into the cached session in place.
    info!("--- profile update ---");
    let user = client
        .update_profile(UserUpdate {
            phone: Some("+234-803-555-0199".into()),
            ..Default::default()
        })
        .await?;
    info!(phone = ?user.phone, "profile updated");

    // Manual refreshes. The unforced one lands inside the post-login
    // cooldown and is skipped; forcing bypasses the cooldown and rotates
    // the tokens.
    info!("--- manual refresh ---");
    match client.refresh(false).await? {
        RefreshOutcome::Refreshed(s) => info!(token = %s.access_token, "refreshed"),
        RefreshOutcome::Skipped(reason) => {
            info!(reason = reason.label(), "unforced refresh skipped")
        }
    }
    match client.refresh(true).await? {
        RefreshOutcome::Refreshed(s) => {
            info!(token = %s.access_token, "forced refresh rotated tokens")
        }
        RefreshOutcome::Skipped(reason) => {
            info!(reason = reason.label(), "forced refresh skipped")
        }
    }

    // The officer switches tabs and comes back. The session was freshly
    // rotated moments ago, so the supervisor skips the refresh.
    info!("--- tab hidden, then visible again ---");
    client.set_visible(false);
    sleep(Duration::from_millis(200)).await;
    client.set_visible(true);
    sleep(Duration::from_millis(200)).await;

    // Cookies vanish while the tab is hidden (cleared by the browser,
    // another tab signed out, or an expired cookie jar). On the next
    // visibility edge the client notices the mismatch and re-checks with
    // the provider instead of trusting its cached session.
    info!("--- cookies cleared behind our back ---");
    credentials.clear_all_cookies();
    client.set_visible(false);
    sleep(Duration::from_millis(200)).await;
    client.set_visible(true);
    sleep(Duration::from_millis(200)).await;
    info!(status = client.status().label(), "after re-check");

    // Sign out: provider revocation, local teardown, redirect to the
    // sign-in page. The remembered email survives for the next visit.
    info!("--- sign-out ---");
    client.logout().await?;
    supervisor.shutdown().await;
    info!(
        remembered = ?client.remembered_email(),
        "signed out; supervisor stopped"
    );

    Ok(())
}
