//! Identity endpoint interface.

use crate::EngineResult;
use credential_store::RoleId;
use std::future::Future;

/// What the identity endpoint knows about the bearer of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub role: RoleId,
    pub verified: bool,
    pub email: Option<String>,
}

/// Remote identity collaborator.
///
/// Both calls may succeed, fail with `EngineError::AuthRejected`, or fail
/// with a transient error (no response, 5xx). The reconciler treats those
/// three outcomes very differently, so implementations must map status codes
/// faithfully.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Fetch the current identity for a bearer token.
    fn fetch_identity(
        &self,
        token: &str,
    ) -> impl Future<Output = EngineResult<IdentitySnapshot>> + Send;

    /// Fetch the permission names granted to the bearer's role.
    fn fetch_permissions(
        &self,
        token: &str,
    ) -> impl Future<Output = EngineResult<Vec<String>>> + Send;
}

// Lets the engine and a test harness (or another engine) share one provider.
impl<T: IdentityProvider> IdentityProvider for std::sync::Arc<T> {
    fn fetch_identity(
        &self,
        token: &str,
    ) -> impl Future<Output = EngineResult<IdentitySnapshot>> + Send {
        (**self).fetch_identity(token)
    }

    fn fetch_permissions(
        &self,
        token: &str,
    ) -> impl Future<Output = EngineResult<Vec<String>>> + Send {
        (**self).fetch_permissions(token)
    }
}
