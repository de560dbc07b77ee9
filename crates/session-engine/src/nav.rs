//! Navigation glue.
//!
//! Translates published sessions into navigation intents and applies them to
//! a platform navigator, deduplicating on intent value so subscribers can be
//! re-notified without the stack being torn down and rebuilt.

use crate::Session;
use credential_store::RoleId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

/// A navigable screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationId {
    Login,
    Register,
    Verify,
    InvestorFeed,
    InvestorDashboard,
    InvestorHistory,
    InvestorTransactions,
    EntrepreneurDashboard,
    EntrepreneurProfile,
    Investments,
    InvestmentDetails,
    Notifications,
}

/// Parameters carried alongside a destination.
pub type NavParams = HashMap<String, String>;

/// Platform navigation surface.
///
/// `reset_to` replaces the whole stack; `navigate_to` pushes. The coordinator
/// only ever resets, pushes belong to in-app flows.
pub trait Navigator: Send + Sync + 'static {
    fn current_destination(&self) -> Option<DestinationId>;
    fn reset_to(&self, destination: DestinationId, params: NavParams);
    fn navigate_to(&self, destination: DestinationId, params: NavParams);
}

// Lets the coordinator and an observer share one navigator.
impl<T: Navigator> Navigator for std::sync::Arc<T> {
    fn current_destination(&self) -> Option<DestinationId> {
        (**self).current_destination()
    }

    fn reset_to(&self, destination: DestinationId, params: NavParams) {
        (**self).reset_to(destination, params)
    }

    fn navigate_to(&self, destination: DestinationId, params: NavParams) {
        (**self).navigate_to(destination, params)
    }
}

/// What a session means for navigation, stripped of everything that does not
/// affect which stack should be shown. Two sessions that differ only in
/// permission contents map to equal intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationIntent {
    AwaitingSession,
    NeedsVerification(String),
    Authenticated(RoleId),
    Unauthenticated,
}

impl From<&Session> for NavigationIntent {
    fn from(session: &Session) -> Self {
        match session {
            Session::AwaitingSession => NavigationIntent::AwaitingSession,
            Session::NeedsVerification { email } => {
                NavigationIntent::NeedsVerification(email.clone())
            }
            Session::Authenticated { role, .. } => NavigationIntent::Authenticated(*role),
            Session::Unauthenticated => NavigationIntent::Unauthenticated,
        }
    }
}

impl NavigationIntent {
    /// Destinations already consistent with this intent. Standing anywhere
    /// in the list means no reset is needed.
    fn allowed_destinations(&self) -> &'static [DestinationId] {
        use DestinationId::*;
        match self {
            NavigationIntent::AwaitingSession => &[],
            NavigationIntent::Unauthenticated => &[Login, Register],
            NavigationIntent::NeedsVerification(_) => &[Verify],
            NavigationIntent::Authenticated(RoleId::Investor) => &[
                InvestorFeed,
                InvestorDashboard,
                InvestorHistory,
                InvestorTransactions,
                Investments,
                InvestmentDetails,
                Notifications,
                EntrepreneurProfile,
            ],
            NavigationIntent::Authenticated(RoleId::Entrepreneur) => &[
                EntrepreneurDashboard,
                EntrepreneurProfile,
                Investments,
                InvestmentDetails,
                Notifications,
            ],
            NavigationIntent::Authenticated(RoleId::Admin) => &[
                InvestorFeed,
                InvestorDashboard,
                InvestorHistory,
                InvestorTransactions,
                EntrepreneurDashboard,
                EntrepreneurProfile,
                Investments,
                InvestmentDetails,
                Notifications,
            ],
        }
    }

    /// Where a reset lands when one is needed.
    fn reset_target(&self) -> Option<(DestinationId, NavParams)> {
        match self {
            NavigationIntent::AwaitingSession => None,
            NavigationIntent::Unauthenticated => Some((DestinationId::Login, NavParams::new())),
            NavigationIntent::NeedsVerification(email) => {
                let mut params = NavParams::new();
                params.insert("email".to_string(), email.clone());
                Some((DestinationId::Verify, params))
            }
            NavigationIntent::Authenticated(RoleId::Investor) => {
                Some((DestinationId::InvestorFeed, NavParams::new()))
            }
            NavigationIntent::Authenticated(RoleId::Entrepreneur) => {
                Some((DestinationId::EntrepreneurDashboard, NavParams::new()))
            }
            NavigationIntent::Authenticated(RoleId::Admin) => {
                Some((DestinationId::InvestorFeed, NavParams::new()))
            }
        }
    }
}

/// Applies session-derived intents to the navigator exactly once each.
pub struct RouteCoordinator<N: Navigator> {
    navigator: N,
    last_applied: Mutex<Option<NavigationIntent>>,
}

impl<N: Navigator> RouteCoordinator<N> {
    pub fn new(navigator: N) -> Self {
        Self {
            navigator,
            last_applied: Mutex::new(None),
        }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Apply an intent. Resets the stack only when the intent actually
    /// changed by value and the user is not already on a consistent screen.
    pub fn apply(&self, intent: NavigationIntent) {
        let mut last_applied = self.last_applied.lock().unwrap();
        if last_applied.as_ref() == Some(&intent) {
            debug!(intent = ?intent, "navigation intent unchanged, skipping");
            return;
        }

        // AwaitingSession is recorded but never navigates; the splash stays
        // up until the reconciler publishes something real.
        if let Some((destination, params)) = intent.reset_target() {
            let current = self.navigator.current_destination();
            if current.is_some_and(|d| intent.allowed_destinations().contains(&d)) {
                debug!(current = ?current, "already on a consistent screen, no reset");
            } else {
                info!(destination = ?destination, "resetting navigation stack");
                self.navigator.reset_to(destination, params);
            }
        }

        *last_applied = Some(intent);
    }

    /// Mirror published sessions into navigation until the channel closes.
    pub async fn drive(&self, mut sessions: watch::Receiver<Session>) {
        loop {
            let intent = NavigationIntent::from(&*sessions.borrow_and_update());
            self.apply(intent);
            if sessions.changed().await.is_err() {
                debug!("session channel closed, navigation driver stopping");
                return;
            }
        }
    }
}
