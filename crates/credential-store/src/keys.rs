//! Storage key constants.

/// Storage keys used by the session core.
///
/// The key names are part of the on-device wire format shared with the
/// login and registration flows, which write them directly.
pub struct StorageKeys;

impl StorageKeys {
    /// Bearer token for the identity and permission endpoints
    pub const AUTH_TOKEN: &'static str = "authToken";

    /// Role name string ("investor", "entrepreneur", "admin")
    pub const USER_ROLE: &'static str = "userRole";

    /// Permission names (JSON string array)
    pub const USER_PERMISSIONS: &'static str = "userPermissions";

    /// Email awaiting verification; present only while the account is
    /// unverified
    pub const PENDING_VERIFICATION_EMAIL: &'static str = "pendingVerificationEmail";
}
