//! Mapping from Chat Completions SSE chunks to the unified stream model.
//!
//! Each `data:` line carries one JSON chunk with `choices[0].delta.content`
//! for text; when usage reporting was requested a trailing chunk carries
//! prompt/completion token counts. The stream ends on the literal `[DONE]`
//! payload; the decoder below us hands it through untouched, and this
//! layer gives it meaning.

use parlance_core::{ProviderError, StreamEvent};
use parlance_wire::SseEvent;
use serde::Deserialize;
use tracing::warn;

/// Sentinel data payload marking end of stream.
const DONE_SENTINEL: &str = "[DONE]";

// ============================================================================
// Wire Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<WireApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

// ============================================================================
// Mapper
// ============================================================================

/// Stateful mapper for one Chat Completions exchange.
///
/// Tracks whether the serving model was already announced so
/// `ModelConfirmed` fires once even though every chunk repeats the model
/// id.
#[derive(Debug, Default)]
pub struct ChunkMapper {
    model_confirmed: bool,
}

impl ChunkMapper {
    /// Creates a fresh mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps one decoded SSE event into zero or more stream events.
    pub fn map_event(&mut self, event: SseEvent) -> Vec<StreamEvent> {
        let Some(data) = event.data else {
            return Vec::new();
        };

        if data.trim() == DONE_SENTINEL {
            return vec![StreamEvent::Done];
        }

        let chunk: ChatChunk = match serde_json::from_str(&data) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(error = %err, "Skipping undecodable completion chunk");
                return Vec::new();
            }
        };

        if let Some(error) = chunk.error {
            // `code` is a string for most vendors but a number for some.
            let code = error.code.map(|c| match c {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
            return vec![StreamEvent::Error(ProviderError::Provider {
                message: error
                    .message
                    .unwrap_or_else(|| "unspecified backend error".to_string()),
                code,
            })];
        }

        let mut events = Vec::new();

        if !self.model_confirmed {
            if let Some(model) = chunk.model {
                self.model_confirmed = true;
                events.push(StreamEvent::ModelConfirmed(model));
            }
        }

        let content = chunk
            .choices
            .first()
            .and_then(|c| c.delta.as_ref())
            .and_then(|d| d.content.as_ref());
        if let Some(content) = content {
            if !content.is_empty() {
                events.push(StreamEvent::TextDelta(content.clone()));
            }
        }

        if let Some(usage) = chunk.usage {
            if let Some(prompt) = usage.prompt_tokens {
                events.push(StreamEvent::InputTokens(prompt));
            }
            if let Some(completion) = usage.completion_tokens {
                events.push(StreamEvent::OutputTokens(completion));
            }
        }

        events
    }
}

// ============================================================================
// Tests
// ============================================================================
