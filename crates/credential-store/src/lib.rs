//! Durable credential persistence for the CrowdCash client core.
//!
//! This crate provides:
//! - A string-keyed `KeyValueStore` abstraction over whatever persistence
//!   the embedding app supplies
//! - A JSON-file-backed store and an in-memory store
//! - The `CredentialVault` high-level API that assembles the durable
//!   login record from its individual keys

mod credential;
mod file;
mod keys;
mod memory;
mod role;
mod traits;

pub use credential::{Credential, CredentialVault};
pub use file::FileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use role::RoleId;
pub use traits::KeyValueStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
