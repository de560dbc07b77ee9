//! Session reconciliation.
//!
//! The reconciler merges the cached credential with what the identity and
//! permission endpoints report, decides how much to trust the result, and
//! republishes a canonical current [`Session`] over a watch channel. It is
//! the only producer of Session values and the only writer of the vault.

use crate::reconcile_fsm::{ReconcileInput, ReconcileMachine, ReconcilePhase};
use crate::{EngineError, EngineResult, IdentityProvider, Session};
use credential_store::{Credential, CredentialVault, RoleId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Tunable delays for reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Delay before the single retry after a network failure.
    pub retry_delay: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Outcome of one verification pass.
enum PassOutcome {
    /// Reached a publishable answer.
    Settled,
    /// The vault changed while the identity call was in flight; the result
    /// was discarded on arrival.
    Superseded,
    /// No response from the identity endpoint.
    NetworkFailed,
}

/// The session reconciliation engine.
///
/// Consumers subscribe to the published session; the login flow writes the
/// vault externally and triggers `revalidate` (directly or through the
/// watchdog). All remote failures are resolved into Session values here and
/// never propagate to subscribers.
pub struct SessionReconciler<I: IdentityProvider> {
    vault: CredentialVault,
    identity: Arc<I>,
    fsm: Mutex<ReconcileMachine>,
    sessions: watch::Sender<Session>,
    /// At most one identity call in flight.
    inflight: AtomicBool,
    /// A reconciliation was requested while one was in flight.
    rerun: AtomicBool,
    config: ReconcileConfig,
}

impl<I: IdentityProvider> SessionReconciler<I> {
    pub fn new(vault: CredentialVault, identity: I, config: ReconcileConfig) -> Arc<Self> {
        let (sessions, _) = watch::channel(Session::AwaitingSession);
        Arc::new(Self {
            vault,
            identity: Arc::new(identity),
            fsm: Mutex::new(ReconcileMachine::new()),
            sessions,
            inflight: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
            config,
        })
    }

    /// Subscribe to published sessions. The receiver immediately holds the
    /// current value.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.sessions.subscribe()
    }

    /// Clone of the currently published session.
    pub fn current(&self) -> Session {
        self.sessions.borrow().clone()
    }

    /// Current reconciler phase.
    pub fn phase(&self) -> ReconcilePhase {
        let fsm = self.fsm.lock().unwrap();
        ReconcilePhase::from(fsm.state())
    }

    /// The cached credential as the vault currently holds it.
    pub fn cached_credential(&self) -> EngineResult<Option<Credential>> {
        Ok(self.vault.load()?)
    }

    /// Cold start: publish a trusted-enough session from cache without any
    /// network round trip, then silently revalidate in the background.
    pub fn bootstrap(self: &Arc<Self>) -> EngineResult<()> {
        let cached = self.vault.load()?;

        match &cached {
            Some(credential) => {
                self.transition(&ReconcileInput::CredentialCached)?;
                if !credential.verified {
                    let email = self.vault.pending_verification()?.unwrap_or_default();
                    self.publish(Session::NeedsVerification { email });
                } else if !credential.permissions.is_empty() {
                    info!(role = %credential.role, "publishing cached session before revalidation");
                    self.publish(Session::Authenticated {
                        role: credential.role,
                        permissions: credential.permissions.iter().cloned().collect(),
                        trusted: false,
                    });
                }
                // A credential without permissions is not enough to show a
                // screen; verification decides.
            }
            None => {
                debug!("no cached credential at startup");
                self.transition(&ReconcileInput::NoCredential)?;
            }
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(error) = this.revalidate().await {
                warn!(%error, "startup revalidation failed");
            }
        });

        Ok(())
    }

    /// Reconcile against the identity endpoint.
    ///
    /// Coalesced: while a pass is in flight a second request only records
    /// that another run is wanted; the in-flight result is compared against
    /// the vault by value on arrival and the latest credential wins.
    pub async fn revalidate(self: &Arc<Self>) -> EngineResult<()> {
        if self.inflight.swap(true, Ordering::SeqCst) {
            self.rerun.store(true, Ordering::SeqCst);
            debug!("revalidation already in flight, coalescing");
            return Ok(());
        }

        loop {
            let result = self.revalidate_inner().await;
            self.inflight.store(false, Ordering::SeqCst);

            // A request recorded between the inner loop's last rerun check
            // and the flag reset above must not wait for the next trigger.
            if !self.rerun.swap(false, Ordering::SeqCst) {
                return result;
            }
            if self.inflight.swap(true, Ordering::SeqCst) {
                // A newer caller already owns the follow-up.
                return result;
            }
            result?;
        }
    }

    async fn revalidate_inner(self: &Arc<Self>) -> EngineResult<()> {
        let mut retried = false;
        loop {
            match self.verify_pass().await? {
                PassOutcome::Settled => {
                    if self.rerun.swap(false, Ordering::SeqCst) {
                        continue;
                    }
                    return Ok(());
                }
                PassOutcome::Superseded => {
                    self.rerun.store(false, Ordering::SeqCst);
                    continue;
                }
                PassOutcome::NetworkFailed => {
                    if retried {
                        // Exactly one retry; no retry storms. With nothing
                        // cached there is nothing to keep showing.
                        self.rerun.store(false, Ordering::SeqCst);
                        if self.vault.load()?.is_none() {
                            self.publish(Session::Unauthenticated);
                        }
                        return Ok(());
                    }
                    retried = true;
                    debug!(delay_ms = self.config.retry_delay.as_millis() as u64, "network failure, scheduling single retry");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// One identity round trip and the trust decision it leads to.
    async fn verify_pass(self: &Arc<Self>) -> EngineResult<PassOutcome> {
        let cached = self.vault.load()?;
        match self.phase() {
            ReconcilePhase::Verifying => {}
            // Revalidation requested without a bootstrap (watchdog-driven
            // login): seed the machine from the cache first.
            ReconcilePhase::Cold => {
                if cached.is_some() {
                    self.transition(&ReconcileInput::CredentialCached)?;
                    self.transition(&ReconcileInput::Revalidate)?;
                } else {
                    self.transition(&ReconcileInput::NoCredential)?;
                }
            }
            ReconcilePhase::Rejected if cached.is_none() => {
                // Confirmed logged out and still nothing cached; a retry
                // would just re-ask the same question with no token.
                return Ok(PassOutcome::Settled);
            }
            _ => {
                self.transition(&ReconcileInput::Revalidate)?;
            }
        }

        let token = cached
            .as_ref()
            .map(|c| c.token.clone())
            .unwrap_or_default();

        let outcome = self.identity.fetch_identity(&token).await;

        // Latest-wins: a credential written or cleared while the call was in
        // flight supersedes this result, by value comparison not ordering.
        let now_cached = self.vault.load()?;
        if now_cached.as_ref().map(|c| &c.token) != cached.as_ref().map(|c| &c.token) {
            debug!("discarding identity result superseded by a newer credential");
            return Ok(PassOutcome::Superseded);
        }

        match outcome {
            Ok(identity) => {
                self.apply_identity(cached, token, identity)?;
                Ok(PassOutcome::Settled)
            }
            Err(error) if error.is_rejection() => {
                if cached.is_none() {
                    info!("rejection with empty cache, confirmed logged out");
                    self.vault.clear()?;
                    self.transition(&ReconcileInput::IdentityRejected)?;
                    self.publish(Session::Unauthenticated);
                } else {
                    // Could be a stale-token race during rotation. Wrongly
                    // logging someone out is worse than a short trust window.
                    warn!("identity endpoint rejected a cached credential, keeping session");
                    self.transition(&ReconcileInput::RejectionSoftened)?;
                    // The session stays, but any earlier confirmation no
                    // longer holds; subscribers see the downgrade.
                    if let Some(credential) = cached.filter(|c| c.verified) {
                        self.publish(Session::Authenticated {
                            role: credential.role,
                            permissions: credential.permissions.iter().cloned().collect(),
                            trusted: false,
                        });
                    }
                }
                Ok(PassOutcome::Settled)
            }
            Err(error) if error.is_transient() => {
                warn!(%error, "identity endpoint unreachable, cached session stays ground truth");
                self.transition(&ReconcileInput::NetworkDown)?;
                Ok(PassOutcome::NetworkFailed)
            }
            Err(error) => {
                // Malformed response, unknown role id and the like: not a
                // rejection, so never destructive, but retrying will not
                // change the answer either.
                warn!(%error, "identity endpoint gave an unusable answer, keeping cached session");
                self.transition(&ReconcileInput::NetworkDown)?;
                if cached.is_none() {
                    // Nothing cached to keep showing.
                    self.publish(Session::Unauthenticated);
                }
                Ok(PassOutcome::Settled)
            }
        }
    }

    fn apply_identity(
        self: &Arc<Self>,
        cached: Option<Credential>,
        token: String,
        identity: crate::IdentitySnapshot,
    ) -> EngineResult<()> {
        if !identity.verified {
            let email = identity.email.unwrap_or_default();
            self.vault.set_pending_verification(&email)?;
            self.transition(&ReconcileInput::IdentityConfirmed)?;
            info!("account awaits email verification");
            self.publish(Session::NeedsVerification { email });
            return Ok(());
        }

        self.vault.clear_pending_verification()?;

        match cached {
            Some(credential) if credential.role == identity.role => {
                self.transition(&ReconcileInput::IdentityConfirmed)?;
                self.publish(Session::Authenticated {
                    role: credential.role,
                    permissions: credential.permissions.iter().cloned().collect(),
                    trusted: true,
                });
                self.spawn_permission_refresh(token, credential.role);
            }
            Some(credential) => {
                // Role change takes priority over permission staleness; the
                // stale set rides along untrusted until the fetch lands.
                info!(old_role = %credential.role, new_role = %identity.role, "role changed server-side");
                self.vault.set_role(identity.role)?;
                self.transition(&ReconcileInput::IdentityConfirmed)?;
                self.publish(Session::Authenticated {
                    role: identity.role,
                    permissions: credential.permissions.iter().cloned().collect(),
                    trusted: false,
                });
                self.spawn_permission_refresh(token, identity.role);
            }
            None => {
                let credential = Credential {
                    token: token.clone(),
                    role: identity.role,
                    permissions: Vec::new(),
                    verified: true,
                };
                self.vault.save(&credential)?;
                self.transition(&ReconcileInput::IdentityConfirmed)?;
                self.publish(Session::Authenticated {
                    role: identity.role,
                    permissions: Default::default(),
                    trusted: true,
                });
                self.spawn_permission_refresh(token, identity.role);
            }
        }

        Ok(())
    }

    fn spawn_permission_refresh(self: &Arc<Self>, token: String, role: RoleId) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(error) = this.refresh_permissions(token, role).await {
                warn!(%error, "background permission refresh failed");
            }
        });
    }

    /// Re-fetch permissions under a confirmed identity. A failure here must
    /// never invalidate the identity; permission freshness is tracked
    /// independently.
    async fn refresh_permissions(self: Arc<Self>, token: String, role: RoleId) -> EngineResult<()> {
        let fetched = match self.identity.fetch_permissions(&token).await {
            Ok(permissions) => permissions,
            Err(error) => {
                warn!(%error, "permission fetch failed, keeping previous permissions");
                return Ok(());
            }
        };

        if fetched.is_empty() {
            // Likely a race against role assignment; the gate owns the
            // one-shot re-check for this case.
            debug!("permission fetch returned an empty set, keeping previous permissions");
            return Ok(());
        }

        let current = match self.vault.load()? {
            Some(credential) => credential,
            None => return Ok(()), // logged out while the fetch was in flight
        };
        if current.token != token || current.role != role {
            debug!("discarding permission result superseded by a newer credential");
            return Ok(());
        }

        self.vault.set_permissions(&fetched)?;
        debug!(count = fetched.len(), role = %role, "permissions refreshed");
        self.publish(Session::Authenticated {
            role,
            permissions: fetched.into_iter().collect(),
            trusted: true,
        });
        Ok(())
    }

    /// Clear everything and publish `Unauthenticated`.
    ///
    /// A revalidation resolving after this point cannot resurrect the old
    /// credential: its result is discarded by the value comparison in
    /// `verify_pass`.
    pub fn sign_out(&self) -> EngineResult<()> {
        self.vault.clear()?;
        // From Cold or Rejected there is nothing to tear down.
        let _ = self.transition(&ReconcileInput::SignedOut);
        self.publish(Session::Unauthenticated);
        info!("signed out");
        Ok(())
    }

    /// Transition the FSM, logging state changes.
    fn transition(&self, input: &ReconcileInput) -> EngineResult<ReconcilePhase> {
        let mut fsm = self.fsm.lock().unwrap();
        let old_phase = ReconcilePhase::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            EngineError::InvalidTransition(format!(
                "cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_phase = ReconcilePhase::from(fsm.state());
        drop(fsm);

        if old_phase != new_phase {
            debug!(old_phase = ?old_phase, new_phase = ?new_phase, "reconciler transition");
        }

        Ok(new_phase)
    }

    /// Publish only on value change, so structurally identical sessions do
    /// not wake subscribers.
    fn publish(&self, session: Session) {
        self.sessions.send_if_modified(|current| {
            if *current == session {
                false
            } else {
                debug!(session = ?session, "publishing session");
                *current = session;
                true
            }
        });
    }
}
