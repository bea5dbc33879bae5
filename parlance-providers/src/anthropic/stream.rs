//! Mapping from Anthropic SSE events to the unified stream model.
//!
//! The event sequence on the wire is `message_start` (carries the input
//! token count), repeated `content_block_delta` events with `text_delta`
//! payloads, `message_delta` (carries the output token count), and
//! `message_stop`. `ping` keepalives and content-block bookkeeping events
//! are dropped.

use parlance_core::{ProviderError, StreamEvent};
use parlance_wire::SseEvent;
use serde::Deserialize;
use tracing::warn;

// ============================================================================
// Wire Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    message: Option<MessageStart>,
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<WireApiError>,
}

#[derive(Debug, Deserialize)]
struct MessageStart {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(rename = "type")]
    #[serde(default)]
    delta_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireApiError {
    #[serde(rename = "type")]
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ============================================================================
// Mapper
// ============================================================================

/// Maps one decoded SSE event into zero or more stream events.
///
/// A data payload that fails to parse is skipped; one malformed record
/// must not kill the stream.
pub fn map_event(event: SseEvent) -> Vec<StreamEvent> {
    let Some(data) = event.data else {
        return Vec::new();
    };

    let parsed: AnthropicStreamEvent = match serde_json::from_str(&data) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "Skipping undecodable Anthropic event");
            return Vec::new();
        }
    };

    match parsed.event_type.as_str() {
        "message_start" => {
            let mut events = Vec::new();
            if let Some(message) = parsed.message {
                if let Some(model) = message.model {
                    events.push(StreamEvent::ModelConfirmed(model));
                }
                if let Some(tokens) = message.usage.and_then(|u| u.input_tokens) {
                    events.push(StreamEvent::InputTokens(tokens));
                }
            }
            events
        }
        "content_block_delta" => match parsed.delta {
            Some(delta) if delta.delta_type.as_deref() == Some("text_delta") => delta
                .text
                .map(StreamEvent::TextDelta)
                .into_iter()
                .collect(),
            _ => Vec::new(),
        },
        "message_delta" => parsed
            .usage
            .and_then(|u| u.output_tokens)
            .map(StreamEvent::OutputTokens)
            .into_iter()
            .collect(),
        "message_stop" => vec![StreamEvent::Done],
        "error" => {
            let error = parsed.error.unwrap_or(WireApiError {
                error_type: None,
                message: None,
            });
            vec![StreamEvent::Error(ProviderError::Provider {
                message: error
                    .message
                    .unwrap_or_else(|| "unspecified backend error".to_string()),
                code: error.error_type,
            })]
        }
        // ping, content_block_start, content_block_stop
        _ => Vec::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
