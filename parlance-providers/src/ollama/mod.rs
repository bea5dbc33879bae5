//! Ollama local chat adapter.
//!
//! Talks to a local Ollama daemon: no auth, NDJSON streaming, model
//! listing via `/api/tags`.

mod stream;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parlance_core::{
    ChatRequest, ModelDescriptor, ProviderError, ProviderSnapshot, Role,
};
use parlance_wire::{check_status, map_transport_error};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::{CancelState, ChatAdapter, EventStream, ndjson_exchange};

pub use stream::RecordMapper;

// ============================================================================
// Request Body
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

fn build_body(request: &ChatRequest) -> OllamaChatRequest {
    let mut messages = Vec::new();

    if let Some(prompt) = &request.system_prompt {
        messages.push(OllamaMessage {
            role: "system",
            content: prompt.clone(),
            images: Vec::new(),
        });
    }

    for message in &request.messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        let images = message
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .map(|a| BASE64.encode(&a.data))
            .collect();
        messages.push(OllamaMessage {
            role,
            content: message.text.clone(),
            images,
        });
    }

    let options = &request.options;
    let has_options = options.temperature.is_some()
        || options.top_p.is_some()
        || options.max_tokens.is_some();

    OllamaChatRequest {
        model: request.model.clone(),
        messages,
        stream: request.options.stream,
        options: has_options.then_some(OllamaOptions {
            temperature: options.temperature,
            top_p: options.top_p,
            num_predict: options.max_tokens,
        }),
    }
}

// ============================================================================
// Model Listing
// ============================================================================

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter for a local Ollama instance.
pub struct OllamaAdapter {
    snapshot: Arc<ProviderSnapshot>,
    client: reqwest::Client,
    cancel: CancelState,
}

impl OllamaAdapter {
    /// Creates an adapter over the given snapshot.
    pub fn new(snapshot: Arc<ProviderSnapshot>, client: reqwest::Client) -> Self {
        Self {
            snapshot,
            client,
            cancel: CancelState::new(),
        }
    }
}

#[async_trait]
impl ChatAdapter for OllamaAdapter {
    fn snapshot(&self) -> &ProviderSnapshot {
        &self.snapshot
    }

    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let url = format!("{}/api/tags", self.snapshot.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;
        let response = check_status(response).await?;

        let tags: TagList = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!(count = tags.models.len(), "Fetched local model tags");

        Ok(tags
            .models
            .into_iter()
            .map(|tag| ModelDescriptor::new(tag.name))
            .collect())
    }

    async fn send_message(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        let body = build_body(&request);
        let url = format!("{}/api/chat", self.snapshot.base_url);

        let mut http = self.client.post(&url).json(&body);
        if let Some(secs) = request.options.timeout_secs {
            http = http.timeout(Duration::from_secs(secs));
        }

        let token = self.cancel.begin();
        let mut mapper = RecordMapper::new();
        Ok(ndjson_exchange(http, token, move |record| {
            mapper.map_record(record)
        }))
    }

    /// A local daemon has no credentials; reachability is the check.
    async fn validate_credentials(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.snapshot.base_url);
        let response = self
            .client
            .get(&url)
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
    use parlance_core::{ChatMessage, RequestOptions};
    use serde_json::json;

    #[test]
    fn test_body_shape() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")], "llama3.2")
            .with_system_prompt("be terse");
        let body = serde_json::to_value(build_body(&request)).unwrap();

        assert_eq!(body["model"], json!("llama3.2"));
        assert_eq!(body["stream"], json!(true));
        assert_eq!(body["messages"][0]["role"], json!("system"));
        assert_eq!(body["messages"][1]["content"], json!("hi"));
        assert!(body.get("options").is_none());
    }

    #[test]
    fn test_max_tokens_maps_to_num_predict() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")], "llama3.2").with_options(
            RequestOptions {
                max_tokens: Some(128),
                ..RequestOptions::default()
            },
        );
        let body = serde_json::to_value(build_body(&request)).unwrap();
        assert_eq!(body["options"]["num_predict"], json!(128));
        assert!(body["options"].get("temperature").is_none());
    }
}
