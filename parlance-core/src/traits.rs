//! Trait definitions for Parlance.
//!
//! This module defines the seam to the external secure credential store.

use crate::error::StoreError;

/// Key/value secret vault addressed by namespaced string keys.
///
/// The store is an external collaborator (system keychain in production,
/// in-memory in tests) and is assumed to serialize its own operations.
/// Keys follow the `parlance.provider.<id>.<slot>` scheme from
/// [`crate::keys`].
pub trait CredentialStore: Send + Sync {
    /// Saves a secret, overwriting any existing value.
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Reads a secret. Returns `Ok(None)` when nothing is stored.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Deletes a secret. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Returns true if a non-empty secret is stored under the key.
    fn exists(&self, key: &str) -> bool {
        matches!(self.read(key), Ok(Some(v)) if !v.is_empty())
    }
}
