//! Session and authorization reconciliation for the CrowdCash client.
//!
//! The engine keeps three sources of truth coherent:
//!
//! - the durable credential vault (token, role, permissions),
//! - the identity backend (`/me`, `/auth/permissions`),
//! - the in-memory [`Session`] the rest of the app consumes.
//!
//! On a cold start the cached credential is published immediately (marked
//! untrusted) so returning users see content without a network round trip,
//! then revalidated in the background. Only an authoritative rejection with
//! nothing cached behind it logs a user out; network silence never does.
//!
//! ```no_run
//! use session_engine::{
//!     HttpIdentityProvider, ReconcileConfig, SessionReconciler,
//! };
//! use credential_store::{CredentialVault, FileStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let vault = CredentialVault::new(Box::new(FileStore::new(FileStore::default_path()?)));
//! let identity = HttpIdentityProvider::new("https://api.crowdcash.example");
//! let reconciler = SessionReconciler::new(vault, identity, ReconcileConfig::default());
//!
//! let sessions = reconciler.subscribe();
//! reconciler.bootstrap()?;
//! # Ok(())
//! # }
//! ```

mod error;
mod gate;
mod http;
mod identity;
pub mod nav;
mod reconcile_fsm;
mod reconciler;
mod session;
mod watchdog;

pub use error::{EngineError, EngineResult};
pub use gate::{Decision, GateConfig, PermissionGate};
pub use http::HttpIdentityProvider;
pub use identity::{IdentityProvider, IdentitySnapshot};
pub use nav::{DestinationId, NavParams, NavigationIntent, Navigator, RouteCoordinator};
pub use reconcile_fsm::{ReconcileInput, ReconcileMachine, ReconcilePhase, ReconcileState};
pub use reconciler::{ReconcileConfig, SessionReconciler};
pub use session::Session;
pub use watchdog::{SessionWatchdog, WatchdogConfig};
