//! Background supervisor: the client's single long-lived task.
//!
//! The flow is:
//!   1. Resolve the initial session (one fetch at startup)
//!   2. Loop: interval refresh timer, periodic re-validation timer,
//!      visibility edges, shutdown signal
//!
//! All timer state lives in the task; the shared client state is only
//! locked through the same `AuthClient` methods foreground callers use,
//! so the scheduler guards apply to background work too.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use authforge_identity::{CredentialStore, IdentityProvider};
use authforge_nav::Navigator;
use authforge_refresh::{RefreshTimer, RefreshTrigger};

use crate::client::{AuthClient, RefreshOutcome};
use crate::notify::Notifier;

/// Handle to a running supervisor task.
///
/// Dropping the handle does NOT stop the task; call
/// [`shutdown`](Self::shutdown) for an orderly stop. A dropped handle
/// leaves the supervisor running for the life of the runtime, which is
/// the right default for an application shell.
pub struct SupervisorHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Signals the supervisor to stop and waits for it to finish its
    /// final accounting.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

impl<P, N, S, T> AuthClient<P, N, S, T>
where
    P: IdentityProvider,
    N: Navigator,
    S: CredentialStore,
    T: Notifier,
{
    /// Spawns the background supervisor for this client.
    ///
    /// One per client is enough; a second supervisor would double every
    /// timer. The task holds a clone of the client handle.
    pub fn spawn_supervisor(&self) -> SupervisorHandle {
        let client = self.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(client, shutdown_rx));
        SupervisorHandle { shutdown_tx, task }
    }
}

async fn run<P, N, S, T>(
    client: AuthClient<P, N, S, T>,
    mut shutdown_rx: oneshot::Receiver<()>,
) where
    P: IdentityProvider,
    N: Navigator,
    S: CredentialStore,
    T: Notifier,
{
    tracing::debug!("session supervisor started");

    // --- Step 1: resolve the initial status ---
    // A failure here is not fatal: the cache records it, resolves to
    // signed-out if nothing was cached, and the timers below retry.
    if let Err(err) = client.get_or_fetch().await {
        tracing::debug!(error = %err, "initial session fetch failed");
    }

    let jitter =
        Duration::from_millis(client.state.config.refresh.initial_jitter_ms);
    let mut refresh_timer =
        RefreshTimer::new(client.state.config.refresh.interval, jitter);
    let mut refetch_timer =
        RefreshTimer::new(client.state.config.cache.refetch_interval, jitter);

    let mut visibility_rx = client.state.visibility_tx.subscribe();
    let mut was_visible = *visibility_rx.borrow();

    // --- Step 2: event loop ---
    loop {
        tokio::select! {
            _ = refresh_timer.wait_for_due() => {
                match client.run_refresh(RefreshTrigger::Interval).await {
                    Ok(RefreshOutcome::Refreshed(_)) => {
                        tracing::debug!("interval refresh completed");
                    }
                    Ok(RefreshOutcome::Skipped(reason)) => {
                        tracing::debug!(
                            reason = reason.label(),
                            "interval refresh skipped"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            "interval refresh failed"
                        );
                    }
                }
            }

            _ = refetch_timer.wait_for_due() => {
                match client.refetch_if_stale().await {
                    Ok(true) => {
                        tracing::debug!("periodic re-validation completed");
                    }
                    Ok(false) => {}
                    Err(err) => {
                        tracing::debug!(
                            error = %err,
                            "periodic re-validation failed"
                        );
                    }
                }
            }

            changed = visibility_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let visible = *visibility_rx.borrow_and_update();
                if visible && !was_visible {
                    client.on_visible().await;
                }
                was_visible = visible;
            }

            _ = &mut shutdown_rx => {
                break;
            }
        }
    }

    // --- Step 3: final accounting ---
    let stats = client.state.scheduler.lock().await.stats().clone();
    let suppressed = client.state.gate.lock().await.suppressed();
    tracing::info!(
        attempts = stats.attempts,
        successes = stats.successes,
        failures = stats.failures,
        skips = stats.total_skips(),
        navigations_suppressed = suppressed,
        "session supervisor stopped"
    );
}
