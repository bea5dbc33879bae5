//! Credential rotation across multiple stored keys.
//!
//! A provider may hold several API keys in the credential store, stored
//! as one JSON list under its rotation slot. When rotation is enabled,
//! each request uses the key with the lowest cumulative token counter
//! (ties broken by stored order), and the counter is bumped after the
//! exchange completes. The manager invalidates its adapter cache after
//! every bump so the next request re-resolves the active key.

use std::sync::Arc;

use parlance_core::{CredentialStore, StoreError, keys};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Key Entry
// ============================================================================

/// One stored API key with its rotation bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeyEntry {
    /// Opaque identifier for this key.
    pub id: String,
    /// Human-readable label ("work", "personal").
    pub label: String,
    /// The secret itself.
    pub secret: String,
    /// Cumulative tokens routed through this key.
    #[serde(default)]
    pub tokens_used: u64,
    /// Whether this key participates in rotation.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ApiKeyEntry {
    /// Creates a new active entry with a zeroed counter.
    pub fn new(id: impl Into<String>, label: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            secret: secret.into(),
            tokens_used: 0,
            active: true,
        }
    }
}

// ============================================================================
// Rotation
// ============================================================================

/// Least-used key selection over the credential store.
pub struct KeyRotation {
    store: Arc<dyn CredentialStore>,
}

impl KeyRotation {
    /// Creates a rotation policy over the given store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Loads the key list for a provider. Missing list means no keys.
    pub fn load(&self, provider_id: &str) -> Result<Vec<ApiKeyEntry>, StoreError> {
        match self.store.read(&keys::rotation(provider_id))? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Persists the key list for a provider.
    pub fn save(&self, provider_id: &str, entries: &[ApiKeyEntry]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(entries)?;
        self.store.save(&keys::rotation(provider_id), &raw)
    }

    /// Selects the key for the next request: the active entry with the
    /// lowest cumulative counter, ties broken by stored order.
    pub fn select_active(&self, provider_id: &str) -> Result<Option<ApiKeyEntry>, StoreError> {
        let entries = self.load(provider_id)?;
        Ok(select_from(&entries).cloned())
    }

    /// Adds the exchange's tokens to a key's counter and persists.
    ///
    /// An unknown key id is a no-op: the key may have been removed while
    /// the exchange was in flight.
    pub fn record_usage(
        &self,
        provider_id: &str,
        key_id: &str,
        tokens: u64,
    ) -> Result<(), StoreError> {
        let mut entries = self.load(provider_id)?;
        let Some(entry) = entries.iter_mut().find(|e| e.id == key_id) else {
            debug!(provider = provider_id, key = key_id, "Rotation key vanished, skipping count");
            return Ok(());
        };

        entry.tokens_used = entry.tokens_used.saturating_add(tokens);
        debug!(
            provider = provider_id,
            key = key_id,
            total = entry.tokens_used,
            "Recorded rotation usage"
        );
        self.save(provider_id, &entries)
    }
}

/// Pure selection rule, split out for testing.
fn select_from(entries: &[ApiKeyEntry]) -> Option<&ApiKeyEntry> {
    entries
        .iter()
        .filter(|e| e.active)
        .min_by_key(|e| e.tokens_used)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapStore(Mutex<HashMap<String, String>>);

    impl MapStore {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(HashMap::new())))
        }
    }

    impl CredentialStore for MapStore {
        fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.0.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn seeded(counters: &[u64]) -> (KeyRotation, &'static str) {
        let rotation = KeyRotation::new(MapStore::new());
        let entries: Vec<ApiKeyEntry> = counters
            .iter()
            .enumerate()
            .map(|(i, &used)| {
                let mut entry = ApiKeyEntry::new(format!("k{i}"), format!("key {i}"), format!("sk-{i}"));
                entry.tokens_used = used;
                entry
            })
            .collect();
        rotation.save("p1", &entries).unwrap();
        (rotation, "p1")
    }

    #[test]
    fn test_least_used_key_selected() {
        let (rotation, id) = seeded(&[50, 10, 30]);
        let selected = rotation.select_active(id).unwrap().unwrap();
        assert_eq!(selected.id, "k1");
        assert_eq!(selected.tokens_used, 10);
    }

    #[test]
    fn test_counter_updated_after_exchange() {
        let (rotation, id) = seeded(&[50, 10, 30]);
        rotation.record_usage(id, "k1", 40).unwrap();

        let entries = rotation.load(id).unwrap();
        assert_eq!(entries[1].tokens_used, 50);

        // With 50/50/30, the third key is now least used.
        let next = rotation.select_active(id).unwrap().unwrap();
        assert_eq!(next.id, "k2");
    }

    #[test]
    fn test_ties_break_by_stored_order() {
        let (rotation, id) = seeded(&[20, 20, 20]);
        let selected = rotation.select_active(id).unwrap().unwrap();
        assert_eq!(selected.id, "k0");
    }

    #[test]
    fn test_inactive_keys_skipped() {
        let rotation = KeyRotation::new(MapStore::new());
        let mut low = ApiKeyEntry::new("k0", "low", "sk-0");
        low.active = false;
        let mut high = ApiKeyEntry::new("k1", "high", "sk-1");
        high.tokens_used = 999;
        rotation.save("p1", &[low, high]).unwrap();

        let selected = rotation.select_active("p1").unwrap().unwrap();
        assert_eq!(selected.id, "k1");
    }

    #[test]
    fn test_empty_store_selects_nothing() {
        let rotation = KeyRotation::new(MapStore::new());
        assert_eq!(rotation.select_active("p1").unwrap(), None);
    }

    #[test]
    fn test_vanished_key_is_noop() {
        let (rotation, id) = seeded(&[10]);
        rotation.record_usage(id, "gone", 40).unwrap();
        assert_eq!(rotation.load(id).unwrap()[0].tokens_used, 10);
    }
}
