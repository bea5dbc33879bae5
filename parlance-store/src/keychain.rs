//! Secure secret storage using the system keychain.
//!
//! Implements [`CredentialStore`] over the platform's secret service:
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)
//!
//! Each Parlance key (`parlance.provider.<id>.<slot>`) maps to one
//! keychain entry under the shared service name, with the key as the
//! account.

use keyring::Entry;
use parlance_core::{CredentialStore, StoreError};
use tracing::debug;

/// Keychain service name for all Parlance credentials.
const SERVICE: &str = "Parlance";

/// System-keychain-backed credential store.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeychainStore;

impl KeychainStore {
    /// Creates a keychain store.
    pub fn new() -> Self {
        Self
    }

    fn entry(key: &str) -> Result<Entry, StoreError> {
        Entry::new(SERVICE, key).map_err(map_keyring_error)
    }
}

impl CredentialStore for KeychainStore {
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Self::entry(key)?
            .set_password(value)
            .map_err(map_keyring_error)?;
        debug!(key = %key, "Secret stored in keychain");
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match Self::entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(map_keyring_error(err)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match Self::entry(key)?.delete_credential() {
            Ok(()) => {
                debug!(key = %key, "Secret deleted from keychain");
                Ok(())
            }
            // Already gone, that's fine
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(map_keyring_error(err)),
        }
    }
}

fn map_keyring_error(err: keyring::Error) -> StoreError {
    match err {
        keyring::Error::NoEntry => StoreError::NotFound(String::new()),
        keyring::Error::NoStorageAccess(_) => StoreError::AccessDenied,
        keyring::Error::PlatformFailure(e) => StoreError::Platform(e.to_string()),
        keyring::Error::Ambiguous(_) => {
            StoreError::Other("Ambiguous credential entry".to_string())
        }
        other => StoreError::Other(other.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
