//! In-memory credential store.
//!
//! A process-local [`CredentialStore`] for tests and ephemeral sessions
//! where nothing should touch the platform keychain.

use std::collections::HashMap;
use std::sync::Mutex;

use parlance_core::{CredentialStore, StoreError};

/// Volatile credential store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of stored secrets.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl CredentialStore for MemoryStore {
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let store = MemoryStore::new();
        store.save("parlance.provider.p.apikey", "sk-x").unwrap();

        assert_eq!(
            store.read("parlance.provider.p.apikey").unwrap().as_deref(),
            Some("sk-x")
        );
        assert!(store.exists("parlance.provider.p.apikey"));

        store.delete("parlance.provider.p.apikey").unwrap();
        assert_eq!(store.read("parlance.provider.p.apikey").unwrap(), None);
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let store = MemoryStore::new();
        assert!(store.delete("nope").is_ok());
    }

    #[test]
    fn test_exists_false_for_empty_value() {
        let store = MemoryStore::new();
        store.save("k", "").unwrap();
        assert!(!store.exists("k"));
    }
}
