//! Provider manager: registry, factory, and adapter cache.
//!
//! The manager owns the ordered list of provider configurations and is
//! the only component that mutates it. It resolves secrets, takes
//! immutable snapshots, factory-builds adapters by backend family, and
//! caches them per provider id. Cache invalidation is the load-bearing
//! correctness property: a cached adapter holding a stale secret must
//! never outlive a credential change.
//!
//! Managers are explicitly constructed and injected: there is no global
//! instance, and tests run several side by side.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use parlance_core::{
    AuthMethod, BackendFamily, CredentialStore, ProviderConfig, ProviderError, UsageRecord,
    keys, models::cost,
};
use tracing::{debug, info, warn};

use crate::adapter::ChatAdapter;
use crate::anthropic::AnthropicAdapter;
use crate::custom::CustomAdapter;
use crate::ollama::OllamaAdapter;
use crate::openai::OpenAiCompatAdapter;
use crate::rotation::KeyRotation;

// ============================================================================
// State
// ============================================================================

#[derive(Default)]
struct ManagerState {
    providers: Vec<ProviderConfig>,
    adapters: HashMap<String, Arc<dyn ChatAdapter>>,
    /// Rotation key id active for each cached adapter.
    active_keys: HashMap<String, String>,
}

// ============================================================================
// Manager
// ============================================================================

/// Owns provider configurations and builds adapters from them.
pub struct ProviderManager {
    store: Arc<dyn CredentialStore>,
    rotation: KeyRotation,
    client: reqwest::Client,
    state: RwLock<ManagerState>,
}

impl ProviderManager {
    /// Creates an empty manager over the given credential store.
    ///
    /// # Errors
    ///
    /// Fails if the shared HTTP client cannot be built.
    pub fn new(store: Arc<dyn CredentialStore>) -> Result<Self, ProviderError> {
        Ok(Self {
            rotation: KeyRotation::new(store.clone()),
            store,
            client: parlance_wire::build_client()?,
            state: RwLock::new(ManagerState::default()),
        })
    }

    /// Creates a manager pre-populated with configurations.
    pub fn with_providers(
        store: Arc<dyn CredentialStore>,
        providers: Vec<ProviderConfig>,
    ) -> Result<Self, ProviderError> {
        let manager = Self::new(store)?;
        {
            let mut state = manager.write();
            state.providers = providers;
        }
        manager.ensure_single_default();
        Ok(manager)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ManagerState> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ManagerState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------------

    /// Returns all configurations in list order.
    pub fn providers(&self) -> Vec<ProviderConfig> {
        self.read().providers.clone()
    }

    /// Returns one configuration by id.
    pub fn get(&self, provider_id: &str) -> Option<ProviderConfig> {
        self.read()
            .providers
            .iter()
            .find(|p| p.id == provider_id)
            .cloned()
    }

    /// Appends a new provider configuration.
    ///
    /// # Errors
    ///
    /// Fails when a provider with the same id already exists.
    pub fn add_provider(&self, config: ProviderConfig) -> Result<(), ProviderError> {
        let make_default = config.is_default;
        {
            let mut state = self.write();
            if state.providers.iter().any(|p| p.id == config.id) {
                return Err(ProviderError::Provider {
                    message: format!("provider '{}' already exists", config.id),
                    code: None,
                });
            }
            if make_default {
                for provider in &mut state.providers {
                    provider.is_default = false;
                }
            }
            info!(provider = %config.id, kind = ?config.kind, "Provider added");
            state.providers.push(config);
        }
        Ok(())
    }

    /// Replaces a provider's configuration.
    ///
    /// Bumps the revision timestamp and evicts the cached adapter so the
    /// next request rebuilds with fresh config and secret.
    ///
    /// # Errors
    ///
    /// Fails when no provider with the id exists.
    pub fn update_provider(&self, mut config: ProviderConfig) -> Result<(), ProviderError> {
        config.updated_at = chrono::Utc::now();
        let make_default = config.is_default;

        let mut state = self.write();
        if !state.providers.iter().any(|p| p.id == config.id) {
            return Err(ProviderError::Provider {
                message: format!("provider '{}' not found", config.id),
                code: None,
            });
        }
        let id = config.id.clone();
        for provider in &mut state.providers {
            if provider.id == id {
                *provider = config.clone();
            } else if make_default {
                provider.is_default = false;
            }
        }
        state.adapters.remove(&id);
        state.active_keys.remove(&id);
        debug!(provider = %id, "Provider updated, adapter evicted");
        Ok(())
    }

    /// Removes a provider, its cache entry, and every stored secret.
    ///
    /// Secrets are deleted first so a failure partway leaves no orphaned
    /// credentials behind a missing configuration.
    pub fn remove_provider(&self, provider_id: &str) -> Result<(), ProviderError> {
        for key in keys::all_for(provider_id) {
            if let Err(err) = self.store.delete(&key) {
                warn!(key = %key, error = %err, "Failed to delete stored secret");
            }
        }

        let mut state = self.write();
        state.providers.retain(|p| p.id != provider_id);
        state.adapters.remove(provider_id);
        state.active_keys.remove(provider_id);
        info!(provider = %provider_id, "Provider removed");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Default Provider
    // ------------------------------------------------------------------------

    /// Returns the default provider: the flagged one, else the first in
    /// list order, else `None`.
    pub fn default_provider(&self) -> Option<ProviderConfig> {
        let state = self.read();
        state
            .providers
            .iter()
            .find(|p| p.is_default)
            .or_else(|| state.providers.first())
            .cloned()
    }

    /// Flags one provider as default, clearing the flag everywhere else.
    ///
    /// # Errors
    ///
    /// Fails when no provider with the id exists.
    pub fn set_default(&self, provider_id: &str) -> Result<(), ProviderError> {
        let mut state = self.write();
        if !state.providers.iter().any(|p| p.id == provider_id) {
            return Err(ProviderError::Provider {
                message: format!("provider '{provider_id}' not found"),
                code: None,
            });
        }
        for provider in &mut state.providers {
            provider.is_default = provider.id == provider_id;
        }
        Ok(())
    }

    /// Drops extra default flags, keeping the first.
    fn ensure_single_default(&self) {
        let mut state = self.write();
        let mut seen = false;
        for provider in &mut state.providers {
            if provider.is_default {
                if seen {
                    provider.is_default = false;
                } else {
                    seen = true;
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Secrets
    // ------------------------------------------------------------------------

    /// Stores a provider's API key and evicts its cached adapter.
    pub fn set_secret(&self, provider_id: &str, value: &str) -> Result<(), ProviderError> {
        self.store
            .save(&keys::api_key(provider_id), value)
            .map_err(|e| ProviderError::Provider {
                message: format!("failed to store secret: {e}"),
                code: None,
            })?;
        self.invalidate(provider_id);
        Ok(())
    }

    /// Deletes a provider's API key and evicts its cached adapter.
    pub fn delete_secret(&self, provider_id: &str) -> Result<(), ProviderError> {
        self.store
            .delete(&keys::api_key(provider_id))
            .map_err(|e| ProviderError::Provider {
                message: format!("failed to delete secret: {e}"),
                code: None,
            })?;
        self.invalidate(provider_id);
        Ok(())
    }

    /// Resolves the secret for a snapshot, plus the rotation key id when
    /// rotation picked it.
    ///
    /// A missing secret is logged, not fatal: free-tier and local
    /// backends work without one, and a paid backend will answer 401
    /// visibly. An OAuth token known to be expired is fatal here;
    /// surfacing it synchronously beats burying it in the stream.
    fn resolve_secret(
        &self,
        config: &ProviderConfig,
    ) -> Result<(Option<String>, Option<String>), ProviderError> {
        if config.rotation_enabled {
            match self.rotation.select_active(&config.id) {
                Ok(Some(entry)) => {
                    debug!(provider = %config.id, key = %entry.label, "Rotation selected key");
                    return Ok((Some(entry.secret), Some(entry.id)));
                }
                Ok(None) => {
                    debug!(provider = %config.id, "Rotation enabled but no keys stored");
                }
                Err(err) => {
                    warn!(provider = %config.id, error = %err, "Rotation lookup failed");
                }
            }
        }

        let key = match config.auth {
            AuthMethod::ApiKey | AuthMethod::Bearer => keys::api_key(&config.id),
            AuthMethod::OAuth => {
                if self.oauth_token_expired(&config.id) {
                    return Err(ProviderError::TokenExpired);
                }
                keys::oauth_access(&config.id)
            }
            AuthMethod::None => return Ok((None, None)),
        };

        match self.store.read(&key) {
            Ok(Some(raw)) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    warn!(provider = %config.id, "Stored secret is empty");
                    Ok((None, None))
                } else {
                    Ok((Some(trimmed.to_string()), None))
                }
            }
            Ok(None) => {
                warn!(provider = %config.id, "No secret stored; adapter built without auth");
                Ok((None, None))
            }
            Err(err) => {
                warn!(provider = %config.id, error = %err, "Secret lookup failed");
                Ok((None, None))
            }
        }
    }

    /// True when a stored OAuth expiry timestamp is in the past.
    ///
    /// The refresh flow lives outside this core; all the manager does is
    /// refuse to hand out a token it knows is dead.
    fn oauth_token_expired(&self, provider_id: &str) -> bool {
        let Ok(Some(raw)) = self.store.read(&keys::oauth_expiry(provider_id)) else {
            return false;
        };
        match chrono::DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(expiry) => expiry < chrono::Utc::now(),
            Err(_) => false,
        }
    }

    // ------------------------------------------------------------------------
    // Adapter Factory
    // ------------------------------------------------------------------------

    /// Returns the adapter for a provider, building and caching it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Fails synchronously for unknown ids and unusable configurations;
    /// network problems surface later, on the adapter's own operations.
    pub fn adapter_for(&self, provider_id: &str) -> Result<Arc<dyn ChatAdapter>, ProviderError> {
        if let Some(adapter) = self.read().adapters.get(provider_id) {
            return Ok(adapter.clone());
        }

        let config = self.get(provider_id).ok_or_else(|| ProviderError::Provider {
            message: format!("provider '{provider_id}' not found"),
            code: None,
        })?;

        let (secret, rotation_key) = self.resolve_secret(&config)?;
        let snapshot = Arc::new(config.snapshot(secret));

        let adapter: Arc<dyn ChatAdapter> = match config.kind.family() {
            BackendFamily::Anthropic => {
                Arc::new(AnthropicAdapter::new(snapshot, self.client.clone()))
            }
            BackendFamily::OpenAiCompatible => {
                Arc::new(OpenAiCompatAdapter::new(snapshot, self.client.clone()))
            }
            BackendFamily::Ollama => Arc::new(OllamaAdapter::new(snapshot, self.client.clone())),
            BackendFamily::Custom => {
                Arc::new(CustomAdapter::new(snapshot, self.client.clone())?)
            }
        };

        let mut state = self.write();
        state.adapters.insert(provider_id.to_string(), adapter.clone());
        match rotation_key {
            Some(key_id) => {
                state.active_keys.insert(provider_id.to_string(), key_id);
            }
            None => {
                state.active_keys.remove(provider_id);
            }
        }
        debug!(provider = %provider_id, "Adapter built and cached");
        Ok(adapter)
    }

    /// Evicts a provider's cached adapter.
    pub fn invalidate(&self, provider_id: &str) {
        let mut state = self.write();
        state.adapters.remove(provider_id);
        state.active_keys.remove(provider_id);
    }

    /// Evicts every cached adapter.
    pub fn invalidate_all(&self) {
        let mut state = self.write();
        state.adapters.clear();
        state.active_keys.clear();
    }

    // ------------------------------------------------------------------------
    // Accounting
    // ------------------------------------------------------------------------

    /// Records one completed exchange: computes its cost and, when
    /// rotation is enabled, bumps the active key's counter and evicts
    /// the adapter so the next request re-selects.
    ///
    /// # Errors
    ///
    /// Fails when the provider no longer exists.
    pub fn record_exchange(
        &self,
        provider_id: &str,
        model_id: &str,
        conversation_id: &str,
        message_id: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<UsageRecord, ProviderError> {
        let config = self.get(provider_id).ok_or_else(|| ProviderError::Provider {
            message: format!("provider '{provider_id}' not found"),
            code: None,
        })?;

        let override_cost = config.cost_overrides.get(model_id).copied().or_else(|| {
            config
                .models
                .iter()
                .find(|m| m.id == model_id)
                .and_then(|m| m.cost)
        });
        let cost_usd = cost::exchange_cost(
            config.billing,
            model_id,
            input_tokens,
            output_tokens,
            override_cost,
        );

        if config.rotation_enabled {
            let active_key = self.read().active_keys.get(provider_id).cloned();
            if let Some(key_id) = active_key {
                if let Err(err) =
                    self.rotation
                        .record_usage(provider_id, &key_id, input_tokens + output_tokens)
                {
                    warn!(provider = %provider_id, error = %err, "Failed to persist rotation counter");
                }
                self.invalidate(provider_id);
            }
        }

        Ok(UsageRecord::new(
            provider_id,
            model_id,
            conversation_id,
            message_id,
            input_tokens,
            output_tokens,
            cost_usd,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
