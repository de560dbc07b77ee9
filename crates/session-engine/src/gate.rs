//! Screen-level permission gating.
//!
//! A guarded screen asks the gate whether the current session carries a
//! required permission. The gate never blocks on the network itself; it only
//! waits on session publications, plus one bounded re-check for the
//! empty-permission-set race right after signup.

use crate::nav::{NavigationIntent, Navigator, RouteCoordinator};
use crate::Session;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Session still settling; show a placeholder, never content.
    Pending,
    Granted,
    Denied,
}

/// Gate timing knobs.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// How long to wait before the single re-check when a logged-in session
    /// carries an empty permission set.
    pub recheck_delay: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            recheck_delay: Duration::from_secs(1),
        }
    }
}

/// Permission gate over the published session stream.
pub struct PermissionGate<N: Navigator> {
    sessions: watch::Receiver<Session>,
    routes: Arc<RouteCoordinator<N>>,
    config: GateConfig,
}

impl<N: Navigator> PermissionGate<N> {
    pub fn new(
        sessions: watch::Receiver<Session>,
        routes: Arc<RouteCoordinator<N>>,
        config: GateConfig,
    ) -> Self {
        Self {
            sessions,
            routes,
            config,
        }
    }

    /// Pure snapshot evaluation, no waiting and no side effects.
    pub fn evaluate(session: &Session, required: &str) -> Decision {
        match session {
            Session::AwaitingSession => Decision::Pending,
            Session::Unauthenticated | Session::NeedsVerification { .. } => Decision::Denied,
            Session::Authenticated { permissions, .. } => {
                if permissions.contains(required) {
                    Decision::Granted
                } else {
                    Decision::Denied
                }
            }
        }
    }

    /// Resolve a required permission to a terminal decision.
    ///
    /// Waits out `AwaitingSession`, and for a logged-in session with an empty
    /// permission set allows one delayed re-check before denying, covering
    /// the window where signup completed but role permissions are still being
    /// assigned server-side. A denial redirects through the coordinator.
    pub async fn resolve(&mut self, required: &str) -> Decision {
        let mut rechecked = false;
        loop {
            let session = self.sessions.borrow_and_update().clone();
            match &session {
                Session::AwaitingSession => {
                    if self.sessions.changed().await.is_err() {
                        return Decision::Pending;
                    }
                }
                Session::Unauthenticated | Session::NeedsVerification { .. } => {
                    debug!(required = %required, "denied: not logged in");
                    self.routes.apply(NavigationIntent::from(&session));
                    return Decision::Denied;
                }
                Session::Authenticated { permissions, .. } => {
                    if permissions.contains(required) {
                        return Decision::Granted;
                    }
                    if permissions.is_empty() && !rechecked {
                        rechecked = true;
                        debug!(required = %required, "empty permission set, waiting for one re-check");
                        tokio::select! {
                            _ = tokio::time::sleep(self.config.recheck_delay) => {}
                            result = self.sessions.changed() => {
                                if result.is_err() {
                                    return Decision::Denied;
                                }
                            }
                        }
                        continue;
                    }
                    warn!(required = %required, "permission missing, redirecting to login");
                    self.routes.apply(NavigationIntent::Unauthenticated);
                    return Decision::Denied;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::tests::RecordingNavigator;
    use credential_store::RoleId;
    use std::collections::BTreeSet;

    fn authenticated(permissions: &[&str]) -> Session {
        Session::Authenticated {
            role: RoleId::Investor,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            trusted: true,
        }
    }

    fn gate(
        initial: Session,
    ) -> (
        PermissionGate<Arc<RecordingNavigator>>,
        watch::Sender<Session>,
        Arc<RecordingNavigator>,
    ) {
        let (tx, rx) = watch::channel(initial);
        let navigator = Arc::new(RecordingNavigator::default());
        let routes = Arc::new(RouteCoordinator::new(navigator.clone()));
        let gate = PermissionGate::new(
            rx,
            routes,
            GateConfig {
                recheck_delay: Duration::from_millis(20),
            },
        );
        (gate, tx, navigator)
    }

    #[test]
    fn test_evaluate_snapshot() {
        assert_eq!(
            PermissionGate::<Arc<RecordingNavigator>>::evaluate(
                &Session::AwaitingSession,
                "view_feed"
            ),
            Decision::Pending
        );
        assert_eq!(
            PermissionGate::<Arc<RecordingNavigator>>::evaluate(
                &Session::Unauthenticated,
                "view_feed"
            ),
            Decision::Denied
        );
        assert_eq!(
            PermissionGate::<Arc<RecordingNavigator>>::evaluate(
                &authenticated(&["view_feed"]),
                "view_feed"
            ),
            Decision::Granted
        );
        assert_eq!(
            PermissionGate::<Arc<RecordingNavigator>>::evaluate(
                &authenticated(&["view_feed"]),
                "manage_users"
            ),
            Decision::Denied
        );
    }

    #[tokio::test]
    async fn test_grants_when_permission_present() {
        let (mut gate, _tx, navigator) = gate(authenticated(&["view_feed"]));
        assert_eq!(gate.resolve("view_feed").await, Decision::Granted);
        assert!(navigator.resets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_denies_and_redirects_when_logged_out() {
        let (mut gate, _tx, navigator) = gate(Session::Unauthenticated);
        assert_eq!(gate.resolve("view_feed").await, Decision::Denied);
        assert_eq!(
            navigator.resets.lock().unwrap()[0].0,
            crate::nav::DestinationId::Login
        );
    }

    #[tokio::test]
    async fn test_waits_out_awaiting_session() {
        let (mut gate, tx, _navigator) = gate(Session::AwaitingSession);

        let resolve = gate.resolve("view_feed");
        let publish = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(authenticated(&["view_feed"])).unwrap();
        };
        let (decision, ()) = tokio::join!(resolve, publish);
        assert_eq!(decision, Decision::Granted);
    }

    #[tokio::test]
    async fn test_empty_set_rechecks_once_then_grants() {
        let (mut gate, tx, _navigator) = gate(authenticated(&[]));

        // Permissions land server-side while the gate sits out its re-check.
        let resolve = gate.resolve("view_feed");
        let publish = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            tx.send(authenticated(&["view_feed"])).unwrap();
        };
        let (decision, ()) = tokio::join!(resolve, publish);
        assert_eq!(decision, Decision::Granted);
    }

    #[tokio::test]
    async fn test_empty_set_denies_after_single_recheck() {
        let (mut gate, _tx, navigator) = gate(authenticated(&[]));

        let started = std::time::Instant::now();
        assert_eq!(gate.resolve("view_feed").await, Decision::Denied);
        // One bounded wait, not a retry loop.
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(
            navigator.resets.lock().unwrap()[0].0,
            crate::nav::DestinationId::Login
        );
    }

    #[tokio::test]
    async fn test_nonempty_set_missing_permission_denies_immediately() {
        let (mut gate, _tx, navigator) = gate(authenticated(&["view_feed"]));

        let started = std::time::Instant::now();
        assert_eq!(gate.resolve("manage_users").await, Decision::Denied);
        // The re-check only covers the empty-set race; a populated set that
        // lacks the permission is answered at once.
        assert!(started.elapsed() < Duration::from_millis(10));
        assert!(!navigator.resets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permissions_are_a_set() {
        let permissions: BTreeSet<String> =
            ["a", "b", "a"].iter().map(|p| p.to_string()).collect();
        assert_eq!(permissions.len(), 2);
    }
}
