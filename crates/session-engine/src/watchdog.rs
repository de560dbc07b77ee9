//! Credential watchdog.
//!
//! The login and signup flows write the vault from outside the engine. The
//! watchdog polls the stored credential and triggers a revalidation whenever
//! it changes, so an external write becomes a published session without the
//! writer needing a handle to the reconciler. Polls fast for a short window
//! after every session change, then settles to a slow cadence.

use crate::{IdentityProvider, SessionReconciler};
use credential_store::Credential;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Poll interval right after a session change.
    pub fast_interval: Duration,
    /// How many fast polls before settling down.
    pub fast_polls: u32,
    /// Steady-state poll interval.
    pub slow_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_millis(300),
            fast_polls: 10,
            slow_interval: Duration::from_secs(2),
        }
    }
}

/// Handle to the polling task. Dropping it stops the watchdog.
pub struct SessionWatchdog {
    task: JoinHandle<()>,
}

impl SessionWatchdog {
    pub fn spawn<I: IdentityProvider>(
        reconciler: Arc<SessionReconciler<I>>,
        config: WatchdogConfig,
    ) -> Self {
        // Baseline taken before the task is scheduled, so a credential
        // written in between still registers as a change.
        let baseline = reconciler.cached_credential().unwrap_or_default();
        let task = tokio::spawn(run(reconciler, config, baseline));
        Self { task }
    }
}

impl Drop for SessionWatchdog {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<I: IdentityProvider>(
    reconciler: Arc<SessionReconciler<I>>,
    config: WatchdogConfig,
    mut last_seen: Option<Credential>,
) {
    let mut sessions = reconciler.subscribe();
    let mut fast_remaining = config.fast_polls;

    loop {
        let interval = if fast_remaining > 0 {
            config.fast_interval
        } else {
            config.slow_interval
        };

        tokio::select! {
            changed = sessions.changed() => {
                if changed.is_err() {
                    debug!("session channel closed, watchdog stopping");
                    return;
                }
                // Something just happened; watch closely for a follow-up
                // external write (e.g. login right after logout).
                fast_remaining = config.fast_polls;
                last_seen = reconciler.cached_credential().unwrap_or(last_seen);
            }
            _ = tokio::time::sleep(interval) => {
                fast_remaining = fast_remaining.saturating_sub(1);

                let current = match reconciler.cached_credential() {
                    Ok(current) => current,
                    Err(error) => {
                        warn!(%error, "watchdog could not read stored credential");
                        continue;
                    }
                };

                if current != last_seen {
                    debug!("stored credential changed externally, revalidating");
                    last_seen = current;
                    fast_remaining = config.fast_polls;
                    if let Err(error) = reconciler.revalidate().await {
                        warn!(%error, "watchdog revalidation failed");
                    }
                }
            }
        }
    }
}
