//! Integration tests for the auth client: login, logout, refresh, and
//! recovery flows against a scripted provider.
//!
//! Every test runs on a paused clock, so staleness windows, cooldowns,
//! and the navigation hold are exercised with exact durations instead
//! of real sleeps.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use authforge::identity::AUTH_COOKIE;
use authforge::prelude::*;

const VALID_EMAIL: &str = "user@test.com";
const VALID_PASSWORD: &str = "Secret1!";
const TAKEN_EMAIL: &str = "taken@test.com";

// =========================================================================
// Mock provider and recorders
// =========================================================================

/// Scripted identity provider. Counters and failure flags let each test
/// drive exactly the provider behavior it needs.
#[derive(Clone, Default)]
struct MockProvider {
    inner: Arc<ProviderState>,
}

#[derive(Default)]
struct ProviderState {
    /// The provider's own idea of the signed-in session.
    session: Mutex<Option<Session>>,
    fetch_calls: AtomicU32,
    refresh_calls: AtomicU32,
    sign_out_calls: AtomicU32,
    update_calls: AtomicU32,
    fetch_delay_ms: AtomicU32,
    fail_fetch: AtomicBool,
    fail_refresh: AtomicBool,
    fail_sign_out: AtomicBool,
    reject_next_update: AtomicBool,
}

impl MockProvider {
    /// Makes fetches see a session without going through sign-in.
    fn seed(&self, session: Session) {
        *self.inner.session.lock().unwrap() = Some(session);
    }

    fn fetch_calls(&self) -> u32 {
        self.inner.fetch_calls.load(Ordering::SeqCst)
    }

    fn refresh_calls(&self) -> u32 {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    fn sign_out_calls(&self) -> u32 {
        self.inner.sign_out_calls.load(Ordering::SeqCst)
    }

    fn update_calls(&self) -> u32 {
        self.inner.update_calls.load(Ordering::SeqCst)
    }

    fn set_fetch_delay_ms(&self, ms: u32) {
        self.inner.fetch_delay_ms.store(ms, Ordering::SeqCst);
    }

    fn set_fail_fetch(&self, fail: bool) {
        self.inner.fail_fetch.store(fail, Ordering::SeqCst);
    }

    fn set_fail_refresh(&self, fail: bool) {
        self.inner.fail_refresh.store(fail, Ordering::SeqCst);
    }

    fn set_fail_sign_out(&self, fail: bool) {
        self.inner.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    fn reject_next_update(&self) {
        self.inner.reject_next_update.store(true, Ordering::SeqCst);
    }
}

impl IdentityProvider for MockProvider {
    async fn fetch_session(&self) -> Result<Option<Session>, IdentityError> {
        self.inner.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.inner.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            sleep(Duration::from_millis(u64::from(delay))).await;
        }
        if self.inner.fail_fetch.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("scripted outage".into()));
        }
        Ok(self.inner.session.lock().unwrap().clone())
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        if email == VALID_EMAIL && password == VALID_PASSWORD {
            let session = sample_session(email);
            *self.inner.session.lock().unwrap() = Some(session.clone());
            Ok(session)
        } else {
            Err(IdentityError::InvalidCredentials)
        }
    }

    async fn sign_up(
        &self,
        account: NewAccount,
    ) -> Result<RegisteredUser, IdentityError> {
        if account.email == TAKEN_EMAIL {
            return Err(IdentityError::EmailTaken);
        }
        Ok(RegisteredUser {
            id: UserId("new-user".into()),
            email: account.email,
            email_verified: false,
        })
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.inner.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_sign_out.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("scripted outage".into()));
        }
        *self.inner.session.lock().unwrap() = None;
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session, IdentityError> {
        let n = self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.inner.fail_refresh.load(Ordering::SeqCst) {
            return Err(IdentityError::Unauthorized);
        }
        let mut guard = self.inner.session.lock().unwrap();
        match guard.as_mut() {
            Some(session) => {
                session.access_token = format!("token-{n}");
                Ok(session.clone())
            }
            None => Err(IdentityError::Unauthorized),
        }
    }

    async fn update_user(
        &self,
        update: UserUpdate,
    ) -> Result<User, IdentityError> {
        self.inner.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.reject_next_update.swap(false, Ordering::SeqCst) {
            return Err(IdentityError::Unauthorized);
        }
        let mut guard = self.inner.session.lock().unwrap();
        let session = guard.as_mut().ok_or(IdentityError::Unauthorized)?;
        if let Some(name) = update.name {
            session.user.name = name;
        }
        if let Some(organization) = update.organization {
            session.user.organization = Some(organization);
        }
        if let Some(department) = update.department {
            session.user.department = Some(department);
        }
        if let Some(phone) = update.phone {
            session.user.phone = Some(phone);
        }
        Ok(session.user.clone())
    }
}

/// Records every navigation, along with whether subscribers could see an
/// authenticated status at that exact moment.
#[derive(Clone, Default)]
struct RecordingNavigator {
    inner: Arc<NavigatorState>,
}

#[derive(Default)]
struct NavigatorState {
    log: Mutex<Vec<(String, bool)>>,
    probe: OnceLock<watch::Receiver<SessionStatus>>,
}

impl RecordingNavigator {
    fn attach_probe(&self, rx: watch::Receiver<SessionStatus>) {
        let _ = self.inner.probe.set(rx);
    }

    fn paths(&self) -> Vec<String> {
        self.inner
            .log
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn log(&self) -> Vec<(String, bool)> {
        self.inner.log.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        let authenticated = self
            .inner
            .probe
            .get()
            .map(|rx| rx.borrow().is_authenticated())
            .unwrap_or(false);
        self.inner
            .log
            .lock()
            .unwrap()
            .push((path.to_string(), authenticated));
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    fn contains(&self, kind: NoticeKind, needle: &str) -> bool {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.kind == kind && n.message.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

// =========================================================================
// Helpers
// =========================================================================

type TestClient = AuthClient<
    MockProvider,
    RecordingNavigator,
    Arc<MemoryCredentials>,
    RecordingNotifier,
>;

struct Harness {
    client: TestClient,
    provider: MockProvider,
    navigator: RecordingNavigator,
    credentials: Arc<MemoryCredentials>,
    notifier: RecordingNotifier,
}

/// Windows are huge or zero so each test controls exactly which guard
/// fires; the navigation hold keeps its production default of 2 s.
fn test_config() -> ClientConfig {
    ClientConfig {
        cache: CacheConfig {
            stale_after: Duration::from_secs(3600),
            refetch_interval: Duration::ZERO,
            attempt_cooldown: Duration::ZERO,
        },
        refresh: RefreshConfig {
            interval: Duration::from_secs(1800),
            visibility_min_gap: Duration::ZERO,
            cooldown: Duration::ZERO,
            initial_jitter_ms: 0,
        },
        nav_hold: Duration::from_secs(2),
        post_login_delay: Duration::ZERO,
    }
}

fn harness() -> Harness {
    harness_with(test_config())
}

fn harness_with(config: ClientConfig) -> Harness {
    let provider = MockProvider::default();
    let navigator = RecordingNavigator::default();
    let credentials = Arc::new(MemoryCredentials::new());
    let notifier = RecordingNotifier::default();
    let client = AuthClient::builder(
        provider.clone(),
        navigator.clone(),
        Arc::clone(&credentials),
    )
    .notifier(notifier.clone())
    .config(config)
    .build();
    navigator.attach_probe(client.subscribe());
    Harness { client, provider, navigator, credentials, notifier }
}

fn sample_session(email: &str) -> Session {
    Session {
        user: User {
            id: UserId("user-1".into()),
            email: email.into(),
            name: "Test User".into(),
            role: UserRole::User,
            email_verified: true,
            organization: None,
            department: None,
            phone: None,
        },
        access_token: "token-0".into(),
        refresh_token: "refresh-0".into(),
        expires_at: 4_102_444_800, // far future
    }
}

async fn sign_in(h: &Harness) -> Session {
    h.client
        .login(LoginRequest::new(VALID_EMAIL, VALID_PASSWORD))
        .await
        .expect("login should succeed")
}

/// Drives one hidden → visible edge through the supervisor.
async fn toggle_visibility(h: &Harness) {
    h.client.set_visible(false);
    sleep(Duration::from_millis(10)).await;
    h.client.set_visible(true);
    sleep(Duration::from_millis(10)).await;
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_builder_defaults_to_log_notifier() {
    // The plain three-argument form, with nothing naming the notifier
    // type: the builder must land on the stock notifier by itself.
    let provider = MockProvider::default();
    let client = AuthClient::builder(
        provider.clone(),
        RecordingNavigator::default(),
        Arc::new(MemoryCredentials::new()),
    )
    .config(test_config())
    .build();

    let status = client.get_or_fetch().await.expect("initial fetch");

    assert!(!status.is_authenticated());
    assert_eq!(provider.fetch_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_login_success_redirects_home() {
    let h = harness();

    let session = sign_in(&h).await;

    assert_eq!(session.user.email, VALID_EMAIL);
    assert!(h.client.status().is_authenticated());
    assert_eq!(h.navigator.paths(), vec!["/"]);
    assert!(h.notifier.contains(NoticeKind::Success, "signed in"));
}

#[tokio::test(start_paused = true)]
async fn test_login_publishes_before_redirect() {
    let h = harness();

    sign_in(&h).await;

    // The navigator records what subscribers could see when the redirect
    // fired: the session must already have been published.
    assert_eq!(h.navigator.log(), vec![("/".to_string(), true)]);
}

#[tokio::test(start_paused = true)]
async fn test_login_failure_leaves_cache_untouched() {
    let h = harness();

    let err = h
        .client
        .login(LoginRequest::new(VALID_EMAIL, "wrong"))
        .await
        .expect_err("bad password should fail");

    assert!(matches!(
        err,
        AuthError::Identity(IdentityError::InvalidCredentials)
    ));
    assert_eq!(h.client.status(), SessionStatus::Loading);
    assert!(h.navigator.paths().is_empty());
    assert!(h.notifier.contains(NoticeKind::Error, "invalid email or password"));
}

#[tokio::test(start_paused = true)]
async fn test_login_honors_from_path() {
    let h = harness();

    h.client
        .login(
            LoginRequest::new(VALID_EMAIL, VALID_PASSWORD)
                .from_path("/reports/42?tab=2"),
        )
        .await
        .expect("login");

    assert_eq!(h.navigator.paths(), vec!["/reports/42?tab=2"]);
}

#[tokio::test(start_paused = true)]
async fn test_login_rejects_external_from_path() {
    let h = harness();

    h.client
        .login(
            LoginRequest::new(VALID_EMAIL, VALID_PASSWORD)
                .from_path("https://evil.example/phish"),
        )
        .await
        .expect("login");

    // External targets fall back to home.
    assert_eq!(h.navigator.paths(), vec!["/"]);
}

#[tokio::test(start_paused = true)]
async fn test_login_remember_controls_stored_email() {
    let h = harness();

    h.client
        .login(LoginRequest::new(VALID_EMAIL, VALID_PASSWORD).remember(true))
        .await
        .expect("login");
    assert_eq!(h.client.remembered_email(), Some(VALID_EMAIL.to_string()));

    // A later sign-in without remember clears the stored email.
    sleep(Duration::from_secs(3)).await;
    h.client
        .login(LoginRequest::new(VALID_EMAIL, VALID_PASSWORD))
        .await
        .expect("login again");
    assert_eq!(h.client.remembered_email(), None);
}

#[tokio::test(start_paused = true)]
async fn test_logout_clears_and_redirects() {
    let h = harness();
    sign_in(&h).await;
    sleep(Duration::from_secs(3)).await; // let the login hold lapse

    h.client.logout().await.expect("logout");

    assert!(!h.client.status().is_authenticated());
    assert_eq!(h.provider.sign_out_calls(), 1);
    assert_eq!(h.navigator.paths(), vec!["/", "/auth/signin"]);
    assert!(h.notifier.contains(NoticeKind::Info, "signed out"));
}

#[tokio::test(start_paused = true)]
async fn test_logout_during_nav_hold_skips_redirect() {
    let h = harness();
    sign_in(&h).await; // arms the gate with the post-login redirect

    h.client.logout().await.expect("logout");

    // The redirect was suppressed but the session is still gone.
    assert_eq!(h.navigator.paths(), vec!["/"]);
    assert!(!h.client.status().is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_logout_completes_when_provider_fails() {
    let h = harness();
    sign_in(&h).await;
    sleep(Duration::from_secs(3)).await;
    h.provider.set_fail_sign_out(true);

    h.client.logout().await.expect("logout is best-effort");

    assert!(!h.client.status().is_authenticated());
    assert_eq!(h.navigator.paths(), vec!["/", "/auth/signin"]);
}

#[tokio::test(start_paused = true)]
async fn test_register_never_installs_session() {
    let h = harness();

    let registered = h
        .client
        .register(NewAccount {
            email: "new@test.com".into(),
            password: "Secret1!".into(),
            name: "New User".into(),
            organization: None,
            department: None,
            phone: None,
        })
        .await
        .expect("register");

    assert!(!registered.email_verified);
    assert!(h.client.session().is_none());
    assert!(h.notifier.contains(NoticeKind::Info, "verify your email"));
    assert_eq!(h.navigator.paths(), vec!["/auth/signin"]);
}

#[tokio::test(start_paused = true)]
async fn test_register_surfaces_email_taken() {
    let h = harness();

    let err = h
        .client
        .register(NewAccount {
            email: TAKEN_EMAIL.into(),
            password: "Secret1!".into(),
            name: "Dup".into(),
            organization: None,
            department: None,
            phone: None,
        })
        .await
        .expect_err("duplicate email should fail");

    assert!(matches!(err, AuthError::Identity(IdentityError::EmailTaken)));
    assert!(h
        .notifier
        .contains(NoticeKind::Error, "already exists"));
    assert!(h.navigator.paths().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_collapse_into_one() {
    let h = harness();
    h.provider.seed(sample_session(VALID_EMAIL));
    h.provider.set_fetch_delay_ms(50);

    let (a, b) =
        tokio::join!(h.client.get_or_fetch(), h.client.get_or_fetch());

    assert!(a.expect("first fetch").is_authenticated());
    assert!(b.expect("second fetch").is_authenticated());
    assert_eq!(h.provider.fetch_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_resolves_loading_to_signed_out() {
    let h = harness();
    h.provider.set_fail_fetch(true);

    let err = h.client.get_or_fetch().await.expect_err("fetch fails");

    assert!(matches!(err, AuthError::Identity(IdentityError::Unavailable(_))));
    assert_eq!(h.client.status(), SessionStatus::Unauthenticated);
    assert_eq!(
        h.client.last_error().await.as_deref(),
        Some("the authentication service is unreachable: scripted outage")
    );
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_keeps_cached_session() {
    let mut config = test_config();
    config.cache.stale_after = Duration::from_secs(1);
    let h = harness_with(config);
    sign_in(&h).await;

    sleep(Duration::from_secs(2)).await; // cache is now stale
    h.provider.set_fail_fetch(true);

    let status = h.client.get_or_fetch().await.expect("stale session served");

    assert!(status.is_authenticated());
    assert!(h.client.last_error().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_forced_refresh_twice_calls_provider_twice() {
    let h = harness();
    sign_in(&h).await;

    let first = h.client.refresh(true).await.expect("first refresh");
    let second = h.client.refresh(true).await.expect("second refresh");

    assert_eq!(h.provider.refresh_calls(), 2);
    match (first, second) {
        (
            RefreshOutcome::Refreshed(a),
            RefreshOutcome::Refreshed(b),
        ) => {
            assert_eq!(a.access_token, "token-1");
            assert_eq!(b.access_token, "token-2");
        }
        other => panic!("expected two refreshed sessions, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unforced_refresh_respects_cooldown() {
    let mut config = test_config();
    config.refresh.cooldown = Duration::from_secs(30);
    let h = harness_with(config);
    sign_in(&h).await;
    sleep(Duration::from_secs(31)).await; // clear the login's freshness stamp

    let first = h.client.refresh(false).await.expect("first refresh");
    let second = h.client.refresh(false).await.expect("second refresh");

    assert!(matches!(first, RefreshOutcome::Refreshed(_)));
    assert_eq!(second, RefreshOutcome::Skipped(SkipReason::CooldownActive));
    assert_eq!(h.provider.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_skipped_when_signed_out() {
    let h = harness();
    h.client.get_or_fetch().await.expect("resolves to signed out");

    let outcome = h.client.refresh(true).await.expect("skip is not an error");

    assert_eq!(
        outcome,
        RefreshOutcome::Skipped(SkipReason::NotAuthenticated)
    );
    assert_eq!(h.provider.refresh_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_unauthorized_clears_session_without_redirect() {
    let h = harness();
    sign_in(&h).await;
    h.provider.set_fail_refresh(true);

    let err = h.client.refresh(true).await.expect_err("refresh fails");

    assert!(matches!(err, AuthError::Identity(IdentityError::Unauthorized)));
    assert!(!h.client.status().is_authenticated());
    assert!(h.notifier.contains(NoticeKind::Warning, "session has expired"));
    // refresh() never navigates; that is handle_unauthorized's job.
    assert_eq!(h.navigator.paths(), vec!["/"]);
}

#[tokio::test(start_paused = true)]
async fn test_handle_unauthorized_recovers_with_one_refresh() {
    let h = harness();
    sign_in(&h).await;

    let outcome = h.client.handle_unauthorized("/reports/9").await;

    match outcome {
        RecoveryOutcome::Recovered(session) => {
            assert_eq!(session.access_token, "token-1");
        }
        other => panic!("expected recovery, got {other:?}"),
    }
    assert_eq!(h.provider.refresh_calls(), 1);
    assert_eq!(h.navigator.paths(), vec!["/"]); // no extra navigation
}

#[tokio::test(start_paused = true)]
async fn test_handle_unauthorized_teardown_redirects_with_from() {
    let h = harness();
    sign_in(&h).await;
    sleep(Duration::from_secs(3)).await; // let the login hold lapse
    h.provider.set_fail_refresh(true);

    let outcome = h.client.handle_unauthorized("/dashboard/maps").await;

    assert_eq!(outcome, RecoveryOutcome::SignedOut);
    assert!(!h.client.status().is_authenticated());
    assert_eq!(
        h.navigator.paths().last().map(String::as_str),
        Some("/auth/signin?from=%2Fdashboard%2Fmaps")
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_profile_patches_cached_user() {
    let h = harness();
    sign_in(&h).await;

    let user = h
        .client
        .update_profile(UserUpdate {
            name: Some("Renamed".into()),
            ..Default::default()
        })
        .await
        .expect("update");

    assert_eq!(user.name, "Renamed");
    assert_eq!(
        h.client.current_user().map(|u| u.name),
        Some("Renamed".to_string())
    );
    assert!(h.notifier.contains(NoticeKind::Success, "profile updated"));
}

#[tokio::test(start_paused = true)]
async fn test_update_profile_retries_once_after_unauthorized() {
    let h = harness();
    sign_in(&h).await;
    h.provider.reject_next_update();

    let user = h
        .client
        .update_profile(UserUpdate {
            name: Some("Second Try".into()),
            ..Default::default()
        })
        .await
        .expect("retry should succeed");

    assert_eq!(user.name, "Second Try");
    assert_eq!(h.provider.update_calls(), 2);
    assert_eq!(h.provider.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_update_profile_empty_update_skips_provider() {
    let h = harness();
    sign_in(&h).await;

    let user = h
        .client
        .update_profile(UserUpdate::default())
        .await
        .expect("no-op update");

    assert_eq!(user.email, VALID_EMAIL);
    assert_eq!(h.provider.update_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ensure_session_errors_when_signed_out() {
    let h = harness();

    let err = h.client.ensure_session().await.expect_err("nobody signed in");

    assert!(matches!(err, AuthError::NotAuthenticated));
}

#[tokio::test(start_paused = true)]
async fn test_visibility_edge_triggers_refresh() {
    let h = harness();
    h.provider.seed(sample_session(VALID_EMAIL));
    h.credentials.set_cookie(AUTH_COOKIE);

    let supervisor = h.client.spawn_supervisor();
    sleep(Duration::from_millis(10)).await;
    assert!(h.client.status().is_authenticated());
    assert_eq!(h.provider.fetch_calls(), 1);

    toggle_visibility(&h).await;

    assert_eq!(h.provider.refresh_calls(), 1);
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_visibility_refresh_respects_min_gap() {
    let mut config = test_config();
    config.refresh.visibility_min_gap = Duration::from_secs(300);
    let h = harness_with(config);
    h.provider.seed(sample_session(VALID_EMAIL));
    h.credentials.set_cookie(AUTH_COOKIE);

    let supervisor = h.client.spawn_supervisor();
    sleep(Duration::from_millis(10)).await;

    toggle_visibility(&h).await;
    assert_eq!(h.provider.refresh_calls(), 1);

    // Within the gap: the edge is observed but the refresh is skipped.
    toggle_visibility(&h).await;
    assert_eq!(h.provider.refresh_calls(), 1);

    sleep(Duration::from_secs(301)).await;
    toggle_visibility(&h).await;
    assert_eq!(h.provider.refresh_calls(), 2);

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_visibility_anomaly_forces_refetch() {
    let h = harness();
    h.provider.seed(sample_session(VALID_EMAIL));
    // No cookies set: the store reports nothing persisted, so an
    // authenticated status is an anomaly.

    let supervisor = h.client.spawn_supervisor();
    sleep(Duration::from_millis(10)).await;
    assert!(h.client.status().is_authenticated());

    toggle_visibility(&h).await;

    assert_eq!(h.provider.fetch_calls(), 2);
    assert_eq!(h.provider.refresh_calls(), 0);
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_interval_refresh_fires_on_schedule() {
    let h = harness();
    h.provider.seed(sample_session(VALID_EMAIL));
    h.credentials.set_cookie(AUTH_COOKIE);

    let supervisor = h.client.spawn_supervisor();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.provider.refresh_calls(), 0);

    sleep(Duration::from_secs(1801)).await;

    assert_eq!(h.provider.refresh_calls(), 1);
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_supervisor_shutdown_is_orderly() {
    let h = harness();
    h.provider.seed(sample_session(VALID_EMAIL));

    let supervisor = h.client.spawn_supervisor();
    sleep(Duration::from_millis(10)).await;

    supervisor.shutdown().await;

    // The client keeps working without its supervisor.
    assert!(h.client.status().is_authenticated());
}
