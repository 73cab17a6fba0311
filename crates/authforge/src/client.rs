//! `AuthClient`: the portal-facing authentication surface.
//!
//! This is the entry point for embedding Authforge in an application.
//! It ties together all the layers: identity provider → session cache →
//! refresh scheduler → navigation gate, and owns the locks that make the
//! synchronous state machines in the sub-crates safe to share between
//! tasks.
//!
//! Locking discipline: every lock in [`ClientState`] is held only for
//! the state-machine call it protects and is always released before
//! provider I/O. The one exception is `fetch_gate`, which is held across
//! a provider call on purpose: holding it is how concurrent fetches
//! collapse into one request.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use authforge_identity::{
    CredentialStore, IdentityError, IdentityProvider, NewAccount,
    RegisteredUser, Session, User, UserUpdate,
};
use authforge_nav::{
    resolve_post_login_target, signin_path_with_from, NavigationGate,
    Navigator, DEFAULT_NAV_HOLD, SIGN_IN_PATH,
};
use authforge_refresh::{
    RefreshConfig, RefreshDecision, RefreshScheduler, RefreshTrigger,
    SkipReason,
};
use authforge_session::{CacheConfig, SessionCache, SessionStatus};

use crate::notify::{LogNotifier, Notice, Notifier};
use crate::AuthError;

/// Pause between a successful sign-in and the post-login redirect, so
/// the provider's credential writes land before the next page loads.
pub const DEFAULT_POST_LOGIN_DELAY: Duration = Duration::from_millis(150);

/// Notice shown when a session cannot be recovered and the user is sent
/// back to sign-in. Matches the wording of
/// [`IdentityError::Unauthorized`] so the two paths read the same.
const SESSION_EXPIRED_NOTICE: &str =
    "your session has expired, please sign in again";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for a client, grouped by the layer they feed.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Session cache staleness windows.
    pub cache: CacheConfig,
    /// Refresh scheduler guards and timer period.
    pub refresh: RefreshConfig,
    /// How long one navigation suppresses the next.
    pub nav_hold: Duration,
    /// Delay between sign-in success and the post-login redirect.
    pub post_login_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            refresh: RefreshConfig::default(),
            nav_hold: DEFAULT_NAV_HOLD,
            post_login_delay: DEFAULT_POST_LOGIN_DELAY,
        }
    }
}

/// Everything a sign-in attempt needs.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Persist the email for pre-filling the next sign-in form.
    pub remember: bool,
    /// Where the user was headed when sign-in interrupted them.
    pub from: Option<String>,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            remember: false,
            from: None,
        }
    }

    pub fn remember(mut self, remember: bool) -> Self {
        self.remember = remember;
        self
    }

    pub fn from_path(mut self, path: impl Into<String>) -> Self {
        self.from = Some(path.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

/// What a [`refresh`](AuthClient::refresh) call actually did.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The provider minted a new session.
    Refreshed(Session),
    /// A scheduler guard turned the attempt away.
    Skipped(SkipReason),
}

/// How [`handle_unauthorized`](AuthClient::handle_unauthorized) resolved
/// a rejected request.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// A forced refresh produced a live session; retry the request.
    Recovered(Session),
    /// The session is gone. The cache is cleared and the user is on
    /// their way to sign-in.
    SignedOut,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared client state behind the [`AuthClient`] handle.
///
/// Wrapped in `Arc` so handles can be cheaply cloned across tasks.
/// Interior mutability via `Mutex` where needed.
pub(crate) struct ClientState<P, N, S, T>
where
    P: IdentityProvider,
    N: Navigator,
    S: CredentialStore,
    T: Notifier,
{
    pub(crate) provider: P,
    pub(crate) navigator: N,
    pub(crate) credentials: S,
    pub(crate) notifier: T,
    pub(crate) cache: Mutex<SessionCache>,
    pub(crate) scheduler: Mutex<RefreshScheduler>,
    pub(crate) gate: Mutex<NavigationGate>,
    /// Serializes session reads and refreshes against the provider.
    /// Held across the provider call; everything else locks briefly.
    pub(crate) fetch_gate: Mutex<()>,
    pub(crate) status_tx: watch::Sender<SessionStatus>,
    pub(crate) visibility_tx: watch::Sender<bool>,
    pub(crate) config: ClientConfig,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring an [`AuthClient`].
///
/// # Example
///
/// ```rust,ignore
/// use authforge::prelude::*;
///
/// let client = AuthClient::builder(provider, navigator, credentials)
///     .config(ClientConfig::default())
///     .build();
/// let supervisor = client.spawn_supervisor();
/// ```
pub struct AuthClientBuilder<P, N, S, T = LogNotifier>
where
    P: IdentityProvider,
    N: Navigator,
    S: CredentialStore,
    T: Notifier,
{
    provider: P,
    navigator: N,
    credentials: S,
    notifier: T,
    config: ClientConfig,
}

impl<P, N, S> AuthClientBuilder<P, N, S, LogNotifier>
where
    P: IdentityProvider,
    N: Navigator,
    S: CredentialStore,
{
    /// Creates a new builder with default settings and a logging
    /// notifier.
    pub fn new(provider: P, navigator: N, credentials: S) -> Self {
        Self {
            provider,
            navigator,
            credentials,
            notifier: LogNotifier,
            config: ClientConfig::default(),
        }
    }
}

impl<P, N, S, T> AuthClientBuilder<P, N, S, T>
where
    P: IdentityProvider,
    N: Navigator,
    S: CredentialStore,
    T: Notifier,
{
    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Swaps in a different notice sink.
    pub fn notifier<T2: Notifier>(
        self,
        notifier: T2,
    ) -> AuthClientBuilder<P, N, S, T2> {
        AuthClientBuilder {
            provider: self.provider,
            navigator: self.navigator,
            credentials: self.credentials,
            notifier,
            config: self.config,
        }
    }

    /// Builds the client. The session starts in
    /// [`SessionStatus::Loading`] until the first fetch resolves it.
    pub fn build(self) -> AuthClient<P, N, S, T> {
        let config = self.config;
        let (status_tx, _) = watch::channel(SessionStatus::Loading);
        let (visibility_tx, _) = watch::channel(true);

        let state = Arc::new(ClientState {
            provider: self.provider,
            navigator: self.navigator,
            credentials: self.credentials,
            notifier: self.notifier,
            cache: Mutex::new(SessionCache::new(config.cache.clone())),
            scheduler: Mutex::new(RefreshScheduler::new(
                config.refresh.clone(),
            )),
            gate: Mutex::new(NavigationGate::new(config.nav_hold)),
            fetch_gate: Mutex::new(()),
            status_tx,
            visibility_tx,
            config,
        });

        AuthClient { state }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle to the authentication client.
///
/// Clones share the same state, so the handle can be passed to request
/// handlers, UI tasks, and the supervisor alike.
pub struct AuthClient<P, N, S, T = LogNotifier>
where
    P: IdentityProvider,
    N: Navigator,
    S: CredentialStore,
    T: Notifier,
{
    pub(crate) state: Arc<ClientState<P, N, S, T>>,
}

impl<P, N, S, T> Clone for AuthClient<P, N, S, T>
where
    P: IdentityProvider,
    N: Navigator,
    S: CredentialStore,
    T: Notifier,
{
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

// In its own block so `Self` resolves the notifier parameter to the
// default; call sites never have to name it.
impl<P, N, S> AuthClient<P, N, S>
where
    P: IdentityProvider,
    N: Navigator,
    S: CredentialStore,
{
    /// Creates a new builder.
    pub fn builder(
        provider: P,
        navigator: N,
        credentials: S,
    ) -> AuthClientBuilder<P, N, S, LogNotifier> {
        AuthClientBuilder::new(provider, navigator, credentials)
    }
}

impl<P, N, S, T> AuthClient<P, N, S, T>
where
    P: IdentityProvider,
    N: Navigator,
    S: CredentialStore,
    T: Notifier,
{
    // -- reads ------------------------------------------------------------

    /// The last published status. Never blocks.
    pub fn status(&self) -> SessionStatus {
        self.state.status_tx.borrow().clone()
    }

    /// The current session, if one is published.
    pub fn session(&self) -> Option<Session> {
        self.state.status_tx.borrow().session().cloned()
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<User> {
        self.state.status_tx.borrow().user().cloned()
    }

    /// Subscribes to status changes. The receiver immediately holds the
    /// current status; `changed()` resolves on every transition after
    /// that.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.state.status_tx.subscribe()
    }

    /// The email persisted by a "remember me" sign-in, for pre-filling
    /// the form.
    pub fn remembered_email(&self) -> Option<String> {
        self.state.credentials.remembered_email()
    }

    /// Human-readable message of the most recent fetch failure, cleared
    /// by the next success.
    pub async fn last_error(&self) -> Option<String> {
        self.state.cache.lock().await.last_error().map(String::from)
    }

    // -- session fetching -------------------------------------------------

    /// Returns the cached status, fetching from the provider first when
    /// the cache is stale.
    ///
    /// Concurrent callers collapse into a single provider request; the
    /// losers wait and read the winner's result. A fetch failure while a
    /// session is already cached is absorbed: the stale session keeps
    /// being served and the error is only recorded.
    pub async fn get_or_fetch(&self) -> Result<SessionStatus, AuthError> {
        {
            let cache = self.state.cache.lock().await;
            if !cache.is_stale() {
                return Ok(cache.status().clone());
            }
        }
        self.fetch_now().await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but only reports
    /// whether a fetch actually ran. Honors the attempt cooldown, so
    /// it is safe to call on a timer.
    pub async fn refetch_if_stale(&self) -> Result<bool, AuthError> {
        {
            let cache = self.state.cache.lock().await;
            if !cache.is_stale() || cache.cooldown_active() {
                return Ok(false);
            }
        }
        self.fetch_now().await.map(|_| true)
    }

    /// Fetches from the provider regardless of staleness or cooldown.
    /// Still deduplicated: a force that lands while another fetch is in
    /// flight waits for it and then runs its own.
    pub async fn force_refetch(&self) -> Result<SessionStatus, AuthError> {
        let _permit = self.state.fetch_gate.lock().await;
        {
            let mut cache = self.state.cache.lock().await;
            cache.begin_attempt();
        }
        self.fetch_and_apply().await
    }

    async fn fetch_now(&self) -> Result<SessionStatus, AuthError> {
        let _permit = self.state.fetch_gate.lock().await;

        // Re-check under the permit: the fetch we queued behind may have
        // already answered the question.
        {
            let mut cache = self.state.cache.lock().await;
            if !cache.is_stale() {
                return Ok(cache.status().clone());
            }
            cache.begin_attempt();
        }

        self.fetch_and_apply().await
    }

    /// Caller must hold the fetch permit and have stamped the attempt.
    async fn fetch_and_apply(&self) -> Result<SessionStatus, AuthError> {
        let fetched = self.state.provider.fetch_session().await;

        let mut cache = self.state.cache.lock().await;
        match fetched {
            Ok(Some(session)) => {
                if cache.install(session) {
                    self.publish(&cache);
                }
                Ok(cache.status().clone())
            }
            Ok(None) => {
                if cache.set_unauthenticated() {
                    self.publish(&cache);
                }
                Ok(cache.status().clone())
            }
            Err(err) => {
                if cache.record_failure(&err) {
                    self.publish(&cache);
                }
                if cache.status().is_authenticated() {
                    // Stale-while-revalidate: keep serving the session
                    // we have. The recorded error is visible through
                    // `last_error()`.
                    Ok(cache.status().clone())
                } else {
                    Err(err.into())
                }
            }
        }
    }

    // -- refresh ----------------------------------------------------------

    /// Proposes a token refresh. `force` bypasses the cooldown but never
    /// the single-flight or signed-out guards.
    pub async fn refresh(
        &self,
        force: bool,
    ) -> Result<RefreshOutcome, AuthError> {
        self.run_refresh(RefreshTrigger::Manual { force }).await
    }

    pub(crate) async fn run_refresh(
        &self,
        trigger: RefreshTrigger,
    ) -> Result<RefreshOutcome, AuthError> {
        // One lock scope for the decision; both locks released before
        // any provider I/O.
        let decision = {
            let cache = self.state.cache.lock().await;
            let mut scheduler = self.state.scheduler.lock().await;
            scheduler.try_begin(trigger, cache.status().is_authenticated())
        };
        match decision {
            RefreshDecision::Skip(reason) => {
                return Ok(RefreshOutcome::Skipped(reason));
            }
            RefreshDecision::Proceed => {}
        }

        let _permit = self.state.fetch_gate.lock().await;
        let refreshed = self.state.provider.refresh_session().await;

        match refreshed {
            Ok(session) => {
                let installed = {
                    let mut cache = self.state.cache.lock().await;
                    if cache.status().is_authenticated() {
                        if cache.install(session.clone()) {
                            self.publish(&cache);
                        }
                        true
                    } else {
                        // Last write wins: a sign-out that landed while
                        // the provider call was in flight stays final.
                        tracing::debug!(
                            "refresh result discarded; signed out mid-flight"
                        );
                        false
                    }
                };
                self.state.scheduler.lock().await.complete(true);
                if installed {
                    Ok(RefreshOutcome::Refreshed(session))
                } else {
                    Ok(RefreshOutcome::Skipped(SkipReason::NotAuthenticated))
                }
            }
            Err(err) => {
                self.state.scheduler.lock().await.complete(false);
                if matches!(err, IdentityError::Unauthorized) {
                    // The refresh credential itself is dead. Clear the
                    // session; navigation is the caller's decision.
                    let changed = {
                        let mut cache = self.state.cache.lock().await;
                        let changed = cache.set_unauthenticated();
                        if changed {
                            self.publish(&cache);
                        }
                        changed
                    };
                    if changed {
                        self.state
                            .notifier
                            .notify(Notice::warning(SESSION_EXPIRED_NOTICE));
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Recovers from a request the application's own backend rejected
    /// with an auth error: exactly one forced refresh, then either
    /// retry or teardown.
    ///
    /// `current_path` is carried to the sign-in page so the user lands
    /// back where they were after signing in again.
    pub async fn handle_unauthorized(
        &self,
        current_path: &str,
    ) -> RecoveryOutcome {
        match self.refresh(true).await {
            Ok(RefreshOutcome::Refreshed(session)) => {
                RecoveryOutcome::Recovered(session)
            }
            Ok(RefreshOutcome::Skipped(SkipReason::AlreadyRefreshing)) => {
                // Somebody else is refreshing right now. Wait for the
                // permit they hold, then read what they produced.
                drop(self.state.fetch_gate.lock().await);
                match self.session() {
                    Some(session) => RecoveryOutcome::Recovered(session),
                    None => self.teardown_to_signin(current_path).await,
                }
            }
            Ok(RefreshOutcome::Skipped(_)) | Err(_) => {
                self.teardown_to_signin(current_path).await
            }
        }
    }

    /// Clears the session, tells the user, and sends them to sign-in
    /// with a return path. Safe to call when already signed out: each
    /// step is a no-op the second time.
    async fn teardown_to_signin(&self, from: &str) -> RecoveryOutcome {
        let changed = {
            let mut cache = self.state.cache.lock().await;
            let changed = cache.set_unauthenticated();
            if changed {
                self.publish(&cache);
            }
            changed
        };
        if changed {
            self.state
                .notifier
                .notify(Notice::warning(SESSION_EXPIRED_NOTICE));
        }

        let target = signin_path_with_from(Some(from));
        if !self.gated_navigate(&target).await {
            tracing::debug!(%target, "teardown redirect suppressed");
        }
        RecoveryOutcome::SignedOut
    }

    // -- account operations -----------------------------------------------

    /// Signs in and, on success, installs the session and redirects to
    /// where the user was originally headed.
    pub async fn login(
        &self,
        request: LoginRequest,
    ) -> Result<Session, AuthError> {
        // --- Step 1: credentials → session ---
        let session = match self
            .state
            .provider
            .sign_in(&request.email, &request.password)
            .await
        {
            Ok(session) => session,
            Err(err) => {
                self.state.notifier.notify(Notice::error(err.to_string()));
                return Err(err.into());
            }
        };

        // --- Step 2: install and publish before any navigation ---
        // Subscribers must observe Authenticated before the redirect
        // fires, or route guards race the page change.
        {
            let mut cache = self.state.cache.lock().await;
            if cache.install(session.clone()) {
                self.publish(&cache);
            }
        }
        self.state.scheduler.lock().await.mark_fresh();

        // --- Step 3: remember-me bookkeeping ---
        if request.remember {
            self.state.credentials.remember_email(&request.email);
        } else {
            self.state.credentials.forget_email();
        }
        self.state.notifier.notify(Notice::success("signed in"));

        // --- Step 4: gated redirect after a settling delay ---
        tokio::time::sleep(self.state.config.post_login_delay).await;
        let target = resolve_post_login_target(request.from.as_deref());
        if !self.gated_navigate(&target).await {
            tracing::debug!(%target, "post-login redirect suppressed");
        }

        Ok(session)
    }

    /// Signs out. Local teardown always completes, even when the
    /// provider cannot be reached.
    pub async fn logout(&self) -> Result<(), AuthError> {
        // --- Step 1: claim the gate before anything async ---
        // If another navigation just fired, we skip our redirect but
        // still clear the session.
        let acquired = { self.state.gate.lock().await.try_acquire() };

        // --- Step 2: revoke at the provider, best effort ---
        if let Err(err) = self.state.provider.sign_out().await {
            tracing::warn!(
                error = %err,
                "provider sign-out failed; clearing local session anyway"
            );
        }

        // --- Step 3: clear and publish ---
        {
            let mut cache = self.state.cache.lock().await;
            if cache.set_unauthenticated() {
                self.publish(&cache);
            }
        }
        self.state.notifier.notify(Notice::info("signed out"));

        // --- Step 4: redirect only if we won the gate ---
        if acquired {
            // Restart the hold so the redirect itself is protected.
            self.state.gate.lock().await.touch();
            self.state.navigator.navigate(SIGN_IN_PATH);
        }

        Ok(())
    }

    /// Creates an account. Never installs a session: the user verifies
    /// their email and then signs in through the normal flow.
    pub async fn register(
        &self,
        account: NewAccount,
    ) -> Result<RegisteredUser, AuthError> {
        let registered = match self.state.provider.sign_up(account).await {
            Ok(registered) => registered,
            Err(err) => {
                self.state.notifier.notify(Notice::error(err.to_string()));
                return Err(err.into());
            }
        };

        self.state.notifier.notify(Notice::info(
            "account created, check your inbox to verify your email address",
        ));
        if !self.gated_navigate(SIGN_IN_PATH).await {
            tracing::debug!("post-registration redirect suppressed");
        }

        Ok(registered)
    }

    /// Applies a partial profile update. A rejected session gets exactly
    /// one forced refresh and one retry before the error surfaces.
    pub async fn update_profile(
        &self,
        update: UserUpdate,
    ) -> Result<User, AuthError> {
        if update.is_empty() {
            // Nothing to send; report the current profile.
            return self.current_user().ok_or(AuthError::NotAuthenticated);
        }

        let user = match self.state.provider.update_user(update.clone()).await
        {
            Ok(user) => user,
            Err(IdentityError::Unauthorized) => {
                match self.refresh(true).await {
                    Ok(RefreshOutcome::Refreshed(_)) => {
                        match self.state.provider.update_user(update).await {
                            Ok(user) => user,
                            Err(err) => {
                                self.state
                                    .notifier
                                    .notify(Notice::error(err.to_string()));
                                return Err(err.into());
                            }
                        }
                    }
                    _ => {
                        let err = IdentityError::Unauthorized;
                        self.state
                            .notifier
                            .notify(Notice::error(err.to_string()));
                        return Err(err.into());
                    }
                }
            }
            Err(err) => {
                self.state.notifier.notify(Notice::error(err.to_string()));
                return Err(err.into());
            }
        };

        {
            let mut cache = self.state.cache.lock().await;
            if cache.patch_user(user.clone()) {
                self.publish(&cache);
            }
        }
        self.state.notifier.notify(Notice::success("profile updated"));
        Ok(user)
    }

    /// Resolves the session, fetching if needed, and errors when nobody
    /// is signed in. The call route guards make.
    pub async fn ensure_session(&self) -> Result<Session, AuthError> {
        match self.get_or_fetch().await? {
            SessionStatus::Authenticated(session) => Ok(session),
            _ => Err(AuthError::NotAuthenticated),
        }
    }

    // -- navigation and visibility ----------------------------------------

    /// Navigates through the gate. Returns `false` when a recent
    /// navigation suppressed this one.
    pub async fn navigate(&self, path: &str) -> bool {
        self.gated_navigate(path).await
    }

    /// Reports a visibility change (e.g. the browser tab was focused).
    /// The supervisor reacts to the hidden → visible edge; without a
    /// running supervisor this is a no-op.
    pub fn set_visible(&self, visible: bool) {
        self.state.visibility_tx.send_replace(visible);
    }

    pub(crate) async fn on_visible(&self) {
        // Credential anomaly: a session in memory with nothing persisted
        // means another tab signed out or the browser dropped the
        // cookies. Re-check with the provider immediately.
        let anomalous = self.status().is_authenticated()
            && !self.state.credentials.has_persisted_credentials();
        if anomalous {
            tracing::warn!(
                "session in memory but no persisted credentials; re-checking"
            );
            if let Err(err) = self.force_refetch().await {
                tracing::warn!(error = %err, "credential re-check failed");
            }
            return;
        }

        match self.run_refresh(RefreshTrigger::VisibilityGained).await {
            Ok(RefreshOutcome::Refreshed(_)) => {}
            Ok(RefreshOutcome::Skipped(reason)) => {
                tracing::debug!(
                    reason = reason.label(),
                    "visibility refresh skipped"
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "visibility refresh failed");
            }
        }

        if let Err(err) = self.refetch_if_stale().await {
            tracing::debug!(error = %err, "visibility refetch failed");
        }
    }

    async fn gated_navigate(&self, path: &str) -> bool {
        let allowed = { self.state.gate.lock().await.try_acquire() };
        if allowed {
            self.state.navigator.navigate(path);
        }
        allowed
    }

    /// Publishes the cache's status to subscribers. Called inside the
    /// cache lock scope so observers see transitions in order.
    fn publish(&self, cache: &SessionCache) {
        self.state.status_tx.send_replace(cache.status().clone());
    }
}
