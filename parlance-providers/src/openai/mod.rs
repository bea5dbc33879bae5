//! OpenAI-compatible Chat Completions adapter.
//!
//! One adapter serves every vendor speaking this wire format (OpenAI,
//! OpenRouter, Groq, DeepSeek, Mistral, and any compatible proxy);
//! vendor differences are confined to the snapshot: base URL, extra
//! headers, and model-listing quirks.

mod request;
mod stream;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parlance_core::{
    ChatRequest, ModelCost, ModelDescriptor, ProviderError, ProviderSnapshot,
};
use parlance_wire::{check_status, map_transport_error};
use serde::Deserialize;
use tracing::debug;

use crate::adapter::{CancelState, ChatAdapter, EventStream, sse_exchange};

pub(crate) use request::ChatCompletionsRequest;
pub use stream::ChunkMapper;

// ============================================================================
// Adapter
// ============================================================================

/// Adapter for OpenAI-compatible backends.
pub struct OpenAiCompatAdapter {
    snapshot: Arc<ProviderSnapshot>,
    client: reqwest::Client,
    cancel: CancelState,
}

impl OpenAiCompatAdapter {
    /// Creates an adapter over the given snapshot.
    pub fn new(snapshot: Arc<ProviderSnapshot>, client: reqwest::Client) -> Self {
        Self {
            snapshot,
            client,
            cancel: CancelState::new(),
        }
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request;
        if let Some(secret) = &self.snapshot.secret {
            request = request.bearer_auth(secret);
        }
        for (name, value) in &self.snapshot.custom_headers {
            request = request.header(name, value);
        }
        request
    }
}

// ============================================================================
// Model Listing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    context_length: Option<u32>,
    #[serde(default)]
    pricing: Option<ModelPricing>,
}

/// OpenRouter-style pricing block: USD per token, as strings.
#[derive(Debug, Deserialize)]
struct ModelPricing {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    completion: Option<String>,
}

impl ModelEntry {
    fn cost(&self) -> Option<ModelCost> {
        let pricing = self.pricing.as_ref()?;
        let prompt: f64 = pricing.prompt.as_deref()?.parse().ok()?;
        let completion: f64 = pricing.completion.as_deref()?.parse().ok()?;
        Some(ModelCost::new(prompt * 1_000_000.0, completion * 1_000_000.0))
    }

    fn is_free(&self) -> bool {
        self.id.ends_with(":free") || self.cost().is_some_and(|c| c.is_free())
    }
}

/// Orders descriptors free-first, then alphabetically by id.
fn sort_models(mut entries: Vec<ModelEntry>) -> Vec<ModelDescriptor> {
    entries.sort_by(|a, b| {
        b.is_free()
            .cmp(&a.is_free())
            .then_with(|| a.id.cmp(&b.id))
    });

    entries
        .into_iter()
        .map(|entry| {
            let cost = entry.cost();
            let mut descriptor = ModelDescriptor::new(entry.id);
            if let Some(name) = entry.name {
                descriptor.display_name = name;
            }
            descriptor.context_window = entry.context_length;
            descriptor.cost = cost;
            descriptor
        })
        .collect()
}

#[async_trait]
impl ChatAdapter for OpenAiCompatAdapter {
    fn snapshot(&self) -> &ProviderSnapshot {
        &self.snapshot
    }

    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let url = format!("{}/models", self.snapshot.base_url);
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

        debug!(count = list.data.len(), "Fetched model list");
        Ok(sort_models(list.data))
    }

    async fn send_message(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        let body = ChatCompletionsRequest::build(&request);
        let url = format!("{}/chat/completions", self.snapshot.base_url);

        let mut http = self.authed(self.client.post(&url)).json(&body);
        if let Some(secs) = request.options.timeout_secs {
            http = http.timeout(Duration::from_secs(secs));
        }

        let token = self.cancel.begin();
        let mut mapper = ChunkMapper::new();
        Ok(sse_exchange(http, token, move |event| {
            mapper.map_event(event)
        }))
    }

    async fn validate_credentials(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.snapshot.base_url);
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

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, pricing: Option<(&str, &str)>) -> ModelEntry {
        ModelEntry {
            id: id.to_string(),
            name: None,
            context_length: None,
            pricing: pricing.map(|(p, c)| ModelPricing {
                prompt: Some(p.to_string()),
                completion: Some(c.to_string()),
            }),
        }
    }

    #[test]
    fn test_free_models_sort_first_then_alphabetical() {
        let models = sort_models(vec![
            entry("zeta-pro", Some(("0.000001", "0.000002"))),
            entry("alpha-pro", Some(("0.000001", "0.000002"))),
            entry("mythomax:free", None),
            entry("beta-lite", Some(("0", "0"))),
        ]);

        let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["beta-lite", "mythomax:free", "alpha-pro", "zeta-pro"]);
    }

    #[test]
    fn test_pricing_converted_to_per_million() {
        let models = sort_models(vec![entry("m", Some(("0.0000025", "0.00001")))]);
        let cost = models[0].cost.unwrap();
        assert!((cost.input_per_million - 2.5).abs() < 1e-9);
        assert!((cost.output_per_million - 10.0).abs() < 1e-9);
    }
}
