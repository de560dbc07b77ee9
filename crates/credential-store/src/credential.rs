//! High-level API for the durable login record.

use crate::{KeyValueStore, RoleId, StorageKeys, StorageResult};

/// The durable login record.
///
/// Created by the login flow, read and written through [`CredentialVault`],
/// invalidated by the reconciler on a confirmed rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Opaque bearer token
    pub token: String,
    /// Role the permissions were fetched under
    pub role: RoleId,
    /// Permission names, in backend order
    pub permissions: Vec<String>,
    /// False while the account's email is still awaiting verification
    pub verified: bool,
}

/// Assembles and persists the [`Credential`] record from its individual
/// storage keys.
pub struct CredentialVault {
    store: Box<dyn KeyValueStore>,
}

impl CredentialVault {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the cached credential.
    ///
    /// A missing record returns `Ok(None)`. So does a malformed one — an
    /// unknown role name or an unparseable permission list is logged and
    /// treated as no cached credential, never an error.
    pub fn load(&self) -> StorageResult<Option<Credential>> {
        let token = match self.store.get(StorageKeys::AUTH_TOKEN)? {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(None),
        };

        let role = match self.store.get(StorageKeys::USER_ROLE)? {
            Some(raw) => match raw.parse::<RoleId>() {
                Ok(role) => role,
                Err(()) => {
                    tracing::warn!(role = %raw, "unknown role in store, treating record as absent");
                    return Ok(None);
                }
            },
            None => return Ok(None),
        };

        let permissions = match self.store.get(StorageKeys::USER_PERMISSIONS)? {
            Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(perms) => perms,
                Err(error) => {
                    tracing::warn!(%error, "permission list in store is malformed, treating record as absent");
                    return Ok(None);
                }
            },
            None => Vec::new(),
        };

        let verified = !self.store.has(StorageKeys::PENDING_VERIFICATION_EMAIL)?;

        Ok(Some(Credential {
            token,
            role,
            permissions,
            verified,
        }))
    }

    /// Persist a complete credential, overwriting any previous record.
    pub fn save(&self, credential: &Credential) -> StorageResult<()> {
        self.store
            .set(StorageKeys::AUTH_TOKEN, &credential.token)?;
        self.store
            .set(StorageKeys::USER_ROLE, credential.role.as_str())?;
        self.set_permissions(&credential.permissions)?;
        if credential.verified {
            let _ = self.store.delete(StorageKeys::PENDING_VERIFICATION_EMAIL);
        }
        tracing::info!(role = %credential.role, "credential persisted");
        Ok(())
    }

    /// Delete the whole record. Idempotent.
    pub fn clear(&self) -> StorageResult<()> {
        let _ = self.store.delete(StorageKeys::AUTH_TOKEN);
        let _ = self.store.delete(StorageKeys::USER_ROLE);
        let _ = self.store.delete(StorageKeys::USER_PERMISSIONS);
        let _ = self.store.delete(StorageKeys::PENDING_VERIFICATION_EMAIL);
        Ok(())
    }

    /// Bearer token, if one is stored.
    pub fn token(&self) -> StorageResult<Option<String>> {
        self.store.get(StorageKeys::AUTH_TOKEN)
    }

    /// Overwrite the stored role name.
    pub fn set_role(&self, role: RoleId) -> StorageResult<()> {
        self.store.set(StorageKeys::USER_ROLE, role.as_str())
    }

    /// Overwrite the stored permission list.
    pub fn set_permissions(&self, permissions: &[String]) -> StorageResult<()> {
        let json = serde_json::to_string(permissions)
            .map_err(|e| crate::StorageError::Encoding(e.to_string()))?;
        self.store.set(StorageKeys::USER_PERMISSIONS, &json)
    }

    /// Record the email awaiting verification.
    pub fn set_pending_verification(&self, email: &str) -> StorageResult<()> {
        self.store
            .set(StorageKeys::PENDING_VERIFICATION_EMAIL, email)
    }

    /// Email awaiting verification, if any.
    pub fn pending_verification(&self) -> StorageResult<Option<String>> {
        self.store.get(StorageKeys::PENDING_VERIFICATION_EMAIL)
    }

    /// Drop the pending-verification marker. Idempotent.
    pub fn clear_pending_verification(&self) -> StorageResult<()> {
        let _ = self.store.delete(StorageKeys::PENDING_VERIFICATION_EMAIL)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn vault() -> CredentialVault {
        CredentialVault::new(Box::new(MemoryStore::new()))
    }

    fn sample() -> Credential {
        Credential {
            token: "tok-abc".to_string(),
            role: RoleId::Investor,
            permissions: vec!["view_feed".to_string(), "view_investments".to_string()],
            verified: true,
        }
    }

    #[test]
    fn test_empty_vault_loads_none() {
        assert_eq!(vault().load().unwrap(), None);
    }

    #[test]
    fn test_save_load_round_trip() {
        let vault = vault();
        let credential = sample();
        vault.save(&credential).unwrap();
        assert_eq!(vault.load().unwrap(), Some(credential));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let vault = vault();
        vault.save(&sample()).unwrap();
        vault.clear().unwrap();
        assert_eq!(vault.load().unwrap(), None);
        vault.clear().unwrap();
        assert_eq!(vault.load().unwrap(), None);
    }

    #[test]
    fn test_unknown_role_treated_as_absent() {
        let store = MemoryStore::new();
        store.set(StorageKeys::AUTH_TOKEN, "tok").unwrap();
        store.set(StorageKeys::USER_ROLE, "moderator").unwrap();
        let vault = CredentialVault::new(Box::new(store));
        assert_eq!(vault.load().unwrap(), None);
    }

    #[test]
    fn test_malformed_permission_list_treated_as_absent() {
        let store = MemoryStore::new();
        store.set(StorageKeys::AUTH_TOKEN, "tok").unwrap();
        store.set(StorageKeys::USER_ROLE, "investor").unwrap();
        store.set(StorageKeys::USER_PERMISSIONS, "{oops").unwrap();
        let vault = CredentialVault::new(Box::new(store));
        assert_eq!(vault.load().unwrap(), None);
    }

    #[test]
    fn test_missing_permissions_key_loads_empty_list() {
        let store = MemoryStore::new();
        store.set(StorageKeys::AUTH_TOKEN, "tok").unwrap();
        store.set(StorageKeys::USER_ROLE, "entrepreneur").unwrap();
        let vault = CredentialVault::new(Box::new(store));
        let credential = vault.load().unwrap().unwrap();
        assert!(credential.permissions.is_empty());
        assert!(credential.verified);
    }

    #[test]
    fn test_pending_verification_marks_unverified() {
        let vault = vault();
        vault.save(&sample()).unwrap();
        vault.set_pending_verification("user@example.com").unwrap();

        let credential = vault.load().unwrap().unwrap();
        assert!(!credential.verified);
        assert_eq!(
            vault.pending_verification().unwrap(),
            Some("user@example.com".to_string())
        );

        // Saving a verified credential clears the marker.
        vault.save(&sample()).unwrap();
        assert!(vault.load().unwrap().unwrap().verified);
        assert_eq!(vault.pending_verification().unwrap(), None);
    }

    #[test]
    fn test_role_change_overwrites() {
        let vault = vault();
        vault.save(&sample()).unwrap();
        vault.set_role(RoleId::Entrepreneur).unwrap();
        assert_eq!(vault.load().unwrap().unwrap().role, RoleId::Entrepreneur);
    }
}
