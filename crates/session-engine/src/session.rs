//! Session value types.
//!
//! A [`Session`] is the in-memory, reconciled, authoritative view of "who is
//! logged in and with what rights." It is produced only by the reconciler and
//! distributed by value; a new Session replaces the old one atomically.

use credential_store::RoleId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The published session value.
///
/// Modeled as a tagged variant rather than a bag of nullable fields, so
/// "role is set but permissions belong to someone else" states cannot be
/// represented at all — except through the explicit `trusted: false` escape
/// hatch on `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Session {
    /// Cold start; nothing known yet.
    AwaitingSession,
    /// Identity confirmed but the account's email is unverified. Terminal
    /// until an external re-login.
    NeedsVerification { email: String },
    /// Logged in. `trusted` is false while the value is derived from cache
    /// only (or carries a permission set fetched under a previous role).
    Authenticated {
        role: RoleId,
        permissions: BTreeSet<String>,
        trusted: bool,
    },
    /// Confirmed logged out.
    Unauthenticated,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    pub fn role(&self) -> Option<RoleId> {
        match self {
            Session::Authenticated { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn permissions(&self) -> Option<&BTreeSet<String>> {
        match self {
            Session::Authenticated { permissions, .. } => Some(permissions),
            _ => None,
        }
    }

    /// True once the session has been confirmed against the identity
    /// endpoint in this process lifetime.
    pub fn is_trusted(&self) -> bool {
        matches!(self, Session::Authenticated { trusted: true, .. })
    }
}
