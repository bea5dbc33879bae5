//! Anthropic Messages API adapter.
//!
//! Speaks the versioned Messages protocol: `x-api-key` auth, an
//! `anthropic-version` header on every call, SSE streaming with named
//! events.

mod request;
mod stream;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parlance_core::{ChatRequest, ModelDescriptor, ProviderError, ProviderSnapshot};
use parlance_wire::{check_status, map_transport_error};
use serde::Deserialize;
use tracing::debug;

use crate::adapter::{CancelState, ChatAdapter, EventStream, sse_exchange};

use request::MessagesRequest;
pub(crate) use stream::map_event;

/// Protocol version sent on every request.
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ============================================================================
// Adapter
// ============================================================================

/// Adapter for Anthropic-style backends.
pub struct AnthropicAdapter {
    snapshot: Arc<ProviderSnapshot>,
    client: reqwest::Client,
    cancel: CancelState,
}

impl AnthropicAdapter {
    /// Creates an adapter over the given snapshot.
    pub fn new(snapshot: Arc<ProviderSnapshot>, client: reqwest::Client) -> Self {
        Self {
            snapshot,
            client,
            cancel: CancelState::new(),
        }
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request.header("anthropic-version", ANTHROPIC_VERSION);
        if let Some(secret) = &self.snapshot.secret {
            request = request.header("x-api-key", secret);
        }
        for (name, value) in &self.snapshot.custom_headers {
            request = request.header(name, value);
        }
        request
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[async_trait]
impl ChatAdapter for AnthropicAdapter {
    fn snapshot(&self) -> &ProviderSnapshot {
        &self.snapshot
    }

    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let url = format!("{}/v1/models?limit=100", self.snapshot.base_url);
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;
        let response = check_status(response).await?;

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!(count = list.data.len(), "Fetched Anthropic model list");

        Ok(list
            .data
            .into_iter()
            .map(|entry| {
                let mut descriptor = ModelDescriptor::new(entry.id);
                if let Some(name) = entry.display_name {
                    descriptor.display_name = name;
                }
                // Every currently served Claude model accepts image input.
                descriptor.supports_vision = true;
                descriptor
            })
            .collect())
    }

    async fn send_message(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        let body = MessagesRequest::build(&request);
        let url = format!("{}/v1/messages", self.snapshot.base_url);

        let mut http = self.authed(self.client.post(&url)).json(&body);
        if let Some(secs) = request.options.timeout_secs {
            http = http.timeout(Duration::from_secs(secs));
        }

        let token = self.cancel.begin();
        Ok(sse_exchange(http, token, map_event))
    }

    async fn validate_credentials(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/v1/models?limit=1", self.snapshot.base_url);
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;

        match check_status(response).await {
            Ok(_) => Ok(true),
            Err(ProviderError::Unauthorized) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}
