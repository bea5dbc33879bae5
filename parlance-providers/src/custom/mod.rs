//! Configuration-driven adapter for unrecognized endpoints.
//!
//! Every aspect (endpoint paths, auth header, wire format, and which
//! JSON fields mean what) comes from the stored [`CustomProtocol`]
//! configuration. Requests are sent in the Chat Completions convention
//! (the de-facto lingua franca for self-hosted gateways); responses are
//! interpreted through RFC 6901 pointers evaluated against each decoded
//! record.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parlance_core::{
    ChatRequest, CustomProtocol, ModelDescriptor, ProviderError, ProviderSnapshot, StreamEvent,
    WireFormat,
};
use parlance_wire::{SseEvent, check_status, map_transport_error};
use serde_json::Value;

use crate::adapter::{CancelState, ChatAdapter, EventStream, ndjson_exchange, sse_exchange};
use crate::openai::ChatCompletionsRequest;

// ============================================================================
// Record Mapping
// ============================================================================

/// Maps decoded records through the configured pointers.
#[derive(Debug, Clone)]
pub struct PointerMapper {
    protocol: CustomProtocol,
}

impl PointerMapper {
    /// Creates a mapper for the given protocol.
    pub fn new(protocol: CustomProtocol) -> Self {
        Self { protocol }
    }

    /// Maps one decoded JSON record into zero or more stream events.
    pub fn map_record(&self, record: &Value) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(text) = record
            .pointer(&self.protocol.text_pointer)
            .and_then(Value::as_str)
        {
            if !text.is_empty() {
                events.push(StreamEvent::TextDelta(text.to_string()));
            }
        }

        if let Some(pointer) = &self.protocol.input_tokens_pointer {
            if let Some(tokens) = record.pointer(pointer).and_then(Value::as_u64) {
                events.push(StreamEvent::InputTokens(tokens));
            }
        }

        if let Some(pointer) = &self.protocol.output_tokens_pointer {
            if let Some(tokens) = record.pointer(pointer).and_then(Value::as_u64) {
                events.push(StreamEvent::OutputTokens(tokens));
            }
        }

        if let Some(pointer) = &self.protocol.done_pointer {
            if record.pointer(pointer).and_then(Value::as_bool) == Some(true) {
                events.push(StreamEvent::Done);
            }
        }

        events
    }

    /// Maps one SSE event, honoring the `[DONE]` convention.
    pub fn map_sse_event(&self, event: SseEvent) -> Vec<StreamEvent> {
        let Some(data) = event.data else {
            return Vec::new();
        };

        if data.trim() == "[DONE]" {
            return vec![StreamEvent::Done];
        }

        match serde_json::from_str::<Value>(&data) {
            Ok(record) => self.map_record(&record),
            Err(_) => Vec::new(),
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter for endpoints matching no known backend family.
pub struct CustomAdapter {
    snapshot: Arc<ProviderSnapshot>,
    protocol: CustomProtocol,
    client: reqwest::Client,
    cancel: CancelState,
}

impl CustomAdapter {
    /// Creates an adapter over the given snapshot.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot carries no custom protocol section.
    pub fn new(
        snapshot: Arc<ProviderSnapshot>,
        client: reqwest::Client,
    ) -> Result<Self, ProviderError> {
        let protocol = snapshot.custom.clone().ok_or_else(|| {
            ProviderError::NotSupported("custom provider has no protocol configuration".to_string())
        })?;

        Ok(Self {
            snapshot,
            protocol,
            client,
            cancel: CancelState::new(),
        })
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request;
        if let Some(secret) = &self.snapshot.secret {
            request = request.header(
                self.protocol.auth_header.as_str(),
                format!("{}{}", self.protocol.auth_prefix, secret),
            );
        }
        for (name, value) in &self.snapshot.custom_headers {
            request = request.header(name, value);
        }
        request
    }
}

#[async_trait]
impl ChatAdapter for CustomAdapter {
    fn snapshot(&self) -> &ProviderSnapshot {
        &self.snapshot
    }

    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let Some(models_path) = &self.protocol.models_path else {
            return Err(ProviderError::NotSupported(
                "no model-listing endpoint configured".to_string(),
            ));
        };

        let url = format!("{}{}", self.snapshot.base_url, models_path);
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;
        let response = check_status(response).await?;

        let value: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        // Accept both the OpenAI `data` array and the Ollama `models` array,
        // with ids under `id` or `name`.
        let entries = value
            .get("data")
            .or_else(|| value.get("models"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("no model array in listing response".to_string())
            })?;

        Ok(entries
            .iter()
            .filter_map(|entry| {
                entry
                    .get("id")
                    .or_else(|| entry.get("name"))
                    .and_then(Value::as_str)
                    .map(ModelDescriptor::new)
            })
            .collect())
    }

    async fn send_message(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        let body = ChatCompletionsRequest::build(&request);
        let url = format!("{}{}", self.snapshot.base_url, self.protocol.chat_path);

        let mut http = self.authed(self.client.post(&url)).json(&body);
        if let Some(secs) = request.options.timeout_secs {
            http = http.timeout(Duration::from_secs(secs));
        }

        let token = self.cancel.begin();
        let mapper = PointerMapper::new(self.protocol.clone());

        Ok(match self.protocol.format {
            WireFormat::Sse => {
                sse_exchange(http, token, move |event| mapper.map_sse_event(event))
            }
            WireFormat::Ndjson => {
                ndjson_exchange(http, token, move |record| mapper.map_record(&record))
            }
        })
    }

    async fn validate_credentials(&self) -> Result<bool, ProviderError> {
        match self.fetch_models().await {
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
    use serde_json::json;

    #[test]
    fn test_default_pointers_read_completions_shape() {
        let mapper = PointerMapper::new(CustomProtocol::default());
        let events = mapper.map_record(&json!({
            "choices": [{"delta": {"content": "Hey"}}]
        }));
        assert_eq!(events, vec![StreamEvent::TextDelta("Hey".to_string())]);
    }

    #[test]
    fn test_custom_pointers() {
        let protocol = CustomProtocol {
            text_pointer: "/response/text".to_string(),
            input_tokens_pointer: Some("/stats/in".to_string()),
            output_tokens_pointer: Some("/stats/out".to_string()),
            done_pointer: Some("/finished".to_string()),
            ..CustomProtocol::default()
        };
        let mapper = PointerMapper::new(protocol);

        let events = mapper.map_record(&json!({
            "response": {"text": "hi"},
            "stats": {"in": 5, "out": 9},
            "finished": true
        }));
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("hi".to_string()),
                StreamEvent::InputTokens(5),
                StreamEvent::OutputTokens(9),
                StreamEvent::Done,
            ]
        );
    }

    #[test]
    fn test_missing_pointers_produce_nothing() {
        let mapper = PointerMapper::new(CustomProtocol::default());
        assert!(mapper.map_record(&json!({"unrelated": 1})).is_empty());
    }

    #[test]
    fn test_sse_done_sentinel_honored() {
        let mapper = PointerMapper::new(CustomProtocol::default());
        let event = SseEvent {
            data: Some("[DONE]".to_string()),
            ..SseEvent::default()
        };
        assert_eq!(mapper.map_sse_event(event), vec![StreamEvent::Done]);
    }
}
