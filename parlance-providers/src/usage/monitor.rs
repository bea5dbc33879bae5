//! Timer-driven quota monitoring.
//!
//! The monitor polls provider quota endpoints, normalizes each response
//! through the provider-specific parsers (or the generic extractor), and
//! caches the latest snapshot per provider for display. An in-flight set
//! prevents overlapping fetches for the same provider; the poll loop and
//! a foreground-triggered immediate refresh share the same path.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use parlance_core::{ProviderError, ProviderKind, ProviderSnapshot, UsageSnapshot};
use parlance_wire::{check_status, map_transport_error};
use tracing::{debug, instrument, warn};

use super::{anthropic, deepseek, generic, openrouter};

/// Default refresh interval.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

// ============================================================================
// Monitor
// ============================================================================

/// Cached, deduplicated quota fetching across providers.
pub struct UsageMonitor {
    client: reqwest::Client,
    cache: RwLock<HashMap<String, UsageSnapshot>>,
    in_flight: Mutex<HashSet<String>>,
    refresh_interval: Duration,
}

impl UsageMonitor {
    /// Creates a monitor with the default refresh interval.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_interval(DEFAULT_REFRESH_INTERVAL)
    }

    /// Creates a monitor with a custom refresh interval.
    pub fn with_interval(refresh_interval: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: parlance_wire::build_client()?,
            cache: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            refresh_interval,
        })
    }

    /// Returns the cached snapshot for a provider, if any.
    pub fn cached(&self, provider_id: &str) -> Option<UsageSnapshot> {
        self.cache
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(provider_id)
            .cloned()
    }

    /// The configured refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    fn begin_fetch(&self, provider_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(provider_id.to_string())
    }

    fn end_fetch(&self, provider_id: &str) {
        self.in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(provider_id);
    }

    fn store(&self, provider_id: &str, snapshot: &UsageSnapshot) {
        self.cache
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(provider_id.to_string(), snapshot.clone());
    }

    /// Fetches quota for a known backend kind with the given credential.
    ///
    /// This is the raw, uncached entry point; [`UsageMonitor::refresh`]
    /// layers caching and deduplication on top.
    ///
    /// # Errors
    ///
    /// `NotSupported` for kinds without a known quota endpoint.
    #[instrument(skip(self, credential))]
    pub async fn fetch(
        &self,
        kind: ProviderKind,
        credential: &str,
    ) -> Result<UsageSnapshot, ProviderError> {
        match kind {
            ProviderKind::Anthropic => {
                let url = format!("{}{}", kind.default_base_url(), anthropic::USAGE_ENDPOINT);
                let body = self.get_text(&url, Some(credential)).await?;
                anthropic::parse_usage(&body)
            }
            ProviderKind::OpenRouter => {
                let url = format!("{}{}", kind.default_base_url(), openrouter::KEY_ENDPOINT);
                let body = self.get_text(&url, Some(credential)).await?;
                openrouter::parse_usage(&body)
            }
            ProviderKind::DeepSeek => {
                let url = format!("{}{}", kind.default_base_url(), deepseek::BALANCE_ENDPOINT);
                let body = self.get_text(&url, Some(credential)).await?;
                deepseek::parse_usage(&body)
            }
            other => Err(ProviderError::NotSupported(format!(
                "no quota endpoint known for {}",
                other.display_name()
            ))),
        }
    }

    /// Refreshes a provider's snapshot, deduplicating concurrent calls.
    ///
    /// When a fetch for the same provider is already running, the cached
    /// snapshot is returned instead of issuing a second request.
    pub async fn refresh(
        &self,
        snapshot: &ProviderSnapshot,
    ) -> Result<UsageSnapshot, ProviderError> {
        if !self.begin_fetch(&snapshot.id) {
            debug!(provider = %snapshot.id, "Usage fetch already in flight");
            return self.cached(&snapshot.id).ok_or_else(|| ProviderError::Provider {
                message: "usage fetch already in flight".to_string(),
                code: None,
            });
        }

        let result = self.refresh_inner(snapshot).await;
        self.end_fetch(&snapshot.id);

        if let Ok(usage) = &result {
            self.store(&snapshot.id, usage);
        }
        result
    }

    async fn refresh_inner(
        &self,
        snapshot: &ProviderSnapshot,
    ) -> Result<UsageSnapshot, ProviderError> {
        // A custom provider with a configured usage path goes through the
        // generic extractor; everything else needs a known integration.
        if let Some(custom) = &snapshot.custom {
            if let Some(path) = &custom.usage_path {
                let url = format!("{}{}", snapshot.base_url, path);
                let body = self.get_text(&url, snapshot.secret.as_deref()).await?;
                let value: serde_json::Value = serde_json::from_str(&body)
                    .map_err(|e| ProviderError::InvalidResponse(format!("usage body: {e}")))?;
                return generic::extract_usage(&value);
            }
        }

        let credential = snapshot
            .secret
            .as_deref()
            .ok_or(ProviderError::InvalidApiKey)?;
        self.fetch(snapshot.kind, credential).await
    }

    async fn get_text(&self, url: &str, bearer: Option<&str>) -> Result<String, ProviderError> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| map_transport_error(&e))?;
        let response = check_status(response).await?;
        response
            .text()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// Spawns the poll loop: an immediate refresh of every target, then
    /// one sweep per interval. Targets are fixed at spawn time; respawn
    /// after configuration changes.
    pub fn spawn_polling(
        self: Arc<Self>,
        targets: Vec<ProviderSnapshot>,
    ) -> tokio::task::JoinHandle<()> {
        let monitor = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.refresh_interval);
            loop {
                ticker.tick().await;
                for target in &targets {
                    if let Err(err) = monitor.refresh(target).await {
                        warn!(provider = %target.id, error = %err, "Usage refresh failed");
                    }
                }
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
