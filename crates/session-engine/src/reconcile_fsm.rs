//! Reconciliation state machine using rust-fsm.
//!
//! Explicit finite state machine for session reconciliation, so trust
//! decisions are a matter of which transition fired rather than ad hoc
//! nullable-field checks.
//!
//! ## State Diagram
//!
//! ```text
//! ┌──────────┐ CredentialCached  ┌──────────────┐
//! │   Cold   │ ────────────────► │ CacheTrusted │ ◄───────────────┐
//! └────┬─────┘                   └──────┬───────┘                 │
//!      │ NoCredential                   │ Revalidate              │
//!      ▼                                ▼                         │
//! ┌───────────┐ IdentityConfirmed ┌───────────┐  NetworkDown /    │
//! │ Verifying │ ────────────────► │ Verified  │  RejectionSoftened│
//! └────┬──────┘                   └─────┬─────┘ ──────────────────┘
//!      │ IdentityRejected / SignedOut   │ Revalidate (back to Verifying)
//!      ▼                                │
//! ┌──────────┐  Revalidate              │
//! │ Rejected │ ◄────────────────────────┘ (SignedOut)
//! └──────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates a module `reconcile_machine` with State, Input, StateMachine.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub reconcile_machine(Cold)

    Cold => {
        CredentialCached => CacheTrusted,
        NoCredential => Verifying
    },
    CacheTrusted => {
        Revalidate => Verifying,
        SignedOut => Rejected
    },
    Verifying => {
        // Identity endpoint answered authoritatively
        IdentityConfirmed => Verified,
        // Rejection with no cached credential backing it
        IdentityRejected => Rejected,
        // Rejection while a cached credential exists: ambiguous, downgraded
        RejectionSoftened => CacheTrusted,
        // No response received; cache stays ground truth
        NetworkDown => CacheTrusted,
        SignedOut => Rejected
    },
    Verified => {
        Revalidate => Verifying,
        SignedOut => Rejected
    },
    Rejected => {
        Revalidate => Verifying,
        CredentialCached => CacheTrusted
    }
}

// Re-export the generated types with clearer names
pub use reconcile_machine::Input as ReconcileInput;
pub use reconcile_machine::State as ReconcileState;
pub use reconcile_machine::StateMachine as ReconcileMachine;

/// Observer-friendly view of the reconciler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    /// Process start; storage not read yet.
    Cold,
    /// Running on the cached credential without fresh confirmation.
    CacheTrusted,
    /// An identity call is in flight.
    Verifying,
    /// Identity confirmed in this process lifetime.
    Verified,
    /// Confirmed logged out (or never logged in).
    Rejected,
}

impl ReconcilePhase {
    /// True while the reconciler may still change its answer on its own.
    pub fn is_settling(&self) -> bool {
        matches!(self, ReconcilePhase::Cold | ReconcilePhase::Verifying)
    }
}

impl From<&ReconcileState> for ReconcilePhase {
    fn from(state: &ReconcileState) -> Self {
        match state {
            ReconcileState::Cold => ReconcilePhase::Cold,
            ReconcileState::CacheTrusted => ReconcilePhase::CacheTrusted,
            ReconcileState::Verifying => ReconcilePhase::Verifying,
            ReconcileState::Verified => ReconcilePhase::Verified,
            ReconcileState::Rejected => ReconcilePhase::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_cold() {
        let machine = ReconcileMachine::new();
        assert_eq!(*machine.state(), ReconcileState::Cold);
    }

    #[test]
    fn test_cold_start_with_cache() {
        let mut machine = ReconcileMachine::new();

        machine
            .consume(&ReconcileInput::CredentialCached)
            .unwrap();
        assert_eq!(*machine.state(), ReconcileState::CacheTrusted);

        machine.consume(&ReconcileInput::Revalidate).unwrap();
        assert_eq!(*machine.state(), ReconcileState::Verifying);

        machine.consume(&ReconcileInput::IdentityConfirmed).unwrap();
        assert_eq!(*machine.state(), ReconcileState::Verified);
    }

    #[test]
    fn test_cold_start_without_cache_goes_straight_to_verifying() {
        let mut machine = ReconcileMachine::new();

        machine.consume(&ReconcileInput::NoCredential).unwrap();
        assert_eq!(*machine.state(), ReconcileState::Verifying);

        machine.consume(&ReconcileInput::IdentityRejected).unwrap();
        assert_eq!(*machine.state(), ReconcileState::Rejected);
    }

    #[test]
    fn test_rejection_with_cache_softens_to_cache_trusted() {
        let mut machine = ReconcileMachine::new();

        machine
            .consume(&ReconcileInput::CredentialCached)
            .unwrap();
        machine.consume(&ReconcileInput::Revalidate).unwrap();

        machine.consume(&ReconcileInput::RejectionSoftened).unwrap();
        assert_eq!(*machine.state(), ReconcileState::CacheTrusted);
    }

    #[test]
    fn test_network_failure_returns_to_cache_trusted() {
        let mut machine = ReconcileMachine::new();

        machine
            .consume(&ReconcileInput::CredentialCached)
            .unwrap();
        machine.consume(&ReconcileInput::Revalidate).unwrap();

        machine.consume(&ReconcileInput::NetworkDown).unwrap();
        assert_eq!(*machine.state(), ReconcileState::CacheTrusted);

        // Single retry re-enters Verifying from the same state.
        machine.consume(&ReconcileInput::Revalidate).unwrap();
        assert_eq!(*machine.state(), ReconcileState::Verifying);
    }

    #[test]
    fn test_sign_out_from_verified() {
        let mut machine = ReconcileMachine::new();

        machine
            .consume(&ReconcileInput::CredentialCached)
            .unwrap();
        machine.consume(&ReconcileInput::Revalidate).unwrap();
        machine.consume(&ReconcileInput::IdentityConfirmed).unwrap();

        machine.consume(&ReconcileInput::SignedOut).unwrap();
        assert_eq!(*machine.state(), ReconcileState::Rejected);
    }

    #[test]
    fn test_new_login_revalidates_from_rejected() {
        let mut machine = ReconcileMachine::new();

        machine.consume(&ReconcileInput::NoCredential).unwrap();
        machine.consume(&ReconcileInput::IdentityRejected).unwrap();
        assert_eq!(*machine.state(), ReconcileState::Rejected);

        machine.consume(&ReconcileInput::Revalidate).unwrap();
        assert_eq!(*machine.state(), ReconcileState::Verifying);
        machine.consume(&ReconcileInput::IdentityConfirmed).unwrap();
        assert_eq!(*machine.state(), ReconcileState::Verified);
    }

    #[test]
    fn test_cold_happens_only_once() {
        let mut machine = ReconcileMachine::new();
        machine
            .consume(&ReconcileInput::CredentialCached)
            .unwrap();

        // Nothing leads back to Cold.
        assert!(machine.consume(&ReconcileInput::NoCredential).is_err());
    }

    #[test]
    fn test_invalid_transition_returns_error() {
        let mut machine = ReconcileMachine::new();

        // Cannot confirm identity before verification started.
        assert!(machine
            .consume(&ReconcileInput::IdentityConfirmed)
            .is_err());
        assert_eq!(*machine.state(), ReconcileState::Cold);
    }

    #[test]
    fn test_phase_conversion() {
        assert_eq!(
            ReconcilePhase::from(&ReconcileState::Cold),
            ReconcilePhase::Cold
        );
        assert_eq!(
            ReconcilePhase::from(&ReconcileState::CacheTrusted),
            ReconcilePhase::CacheTrusted
        );
        assert_eq!(
            ReconcilePhase::from(&ReconcileState::Verifying),
            ReconcilePhase::Verifying
        );
        assert_eq!(
            ReconcilePhase::from(&ReconcileState::Verified),
            ReconcilePhase::Verified
        );
        assert_eq!(
            ReconcilePhase::from(&ReconcileState::Rejected),
            ReconcilePhase::Rejected
        );
    }

    #[test]
    fn test_is_settling() {
        assert!(ReconcilePhase::Cold.is_settling());
        assert!(ReconcilePhase::Verifying.is_settling());
        assert!(!ReconcilePhase::CacheTrusted.is_settling());
        assert!(!ReconcilePhase::Verified.is_settling());
        assert!(!ReconcilePhase::Rejected.is_settling());
    }
}
