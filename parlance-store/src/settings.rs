//! Provider configuration persistence.
//!
//! Configurations (never secrets) are stored as pretty-printed JSON in
//! the user's config directory. Writes go through a temp file and an
//! atomic rename so a crash mid-write cannot leave a truncated file.

use std::fs;
use std::path::{Path, PathBuf};

use parlance_core::{ProviderConfig, StoreError};
use tracing::{debug, info};

/// Directory name under the platform config dir.
const CONFIG_DIR: &str = "parlance";

/// File holding the provider list.
const PROVIDERS_FILE: &str = "providers.json";

/// JSON-file-backed store for provider configurations.
#[derive(Debug, Clone)]
pub struct ProviderConfigStore {
    path: PathBuf,
}

impl ProviderConfigStore {
    /// Creates a store at the platform-default location.
    ///
    /// # Errors
    ///
    /// Fails when the platform config directory cannot be determined.
    pub fn at_default_location() -> Result<Self, StoreError> {
        let base = dirs::config_dir()
            .ok_or_else(|| StoreError::Unavailable("no config directory".to_string()))?;
        Ok(Self {
            path: base.join(CONFIG_DIR).join(PROVIDERS_FILE),
        })
    }

    /// Creates a store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the provider list. A missing file is an empty list.
    pub fn load(&self) -> Result<Vec<ProviderConfig>, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No provider file yet");
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path)?;
        let providers = serde_json::from_str(&raw)?;
        Ok(providers)
    }

    /// Saves the provider list atomically.
    pub fn save(&self, providers: &[ProviderConfig]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let raw = serde_json::to_string_pretty(providers)?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, raw)?;
        fs::rename(&temp, &self.path)?;

        info!(
            path = %self.path.display(),
            count = providers.len(),
            "Provider configurations saved"
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
