//! Mapping from Ollama NDJSON records to the unified stream model.
//!
//! Every generation step is one JSON object; the terminal record is
//! flagged `done: true` and carries duration and token counts.

use parlance_core::{ProviderError, StreamEvent};
use serde::Deserialize;
use tracing::warn;

// ============================================================================
// Wire Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatRecord {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<RecordMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordMessage {
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// Mapper
// ============================================================================

/// Stateful mapper for one Ollama exchange.
#[derive(Debug, Default)]
pub struct RecordMapper {
    model_confirmed: bool,
}

impl RecordMapper {
    /// Creates a fresh mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps one decoded NDJSON record into zero or more stream events.
    pub fn map_record(&mut self, record: serde_json::Value) -> Vec<StreamEvent> {
        let record: ChatRecord = match serde_json::from_value(record) {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "Skipping undecodable Ollama record");
                return Vec::new();
            }
        };

        if let Some(message) = record.error {
            return vec![StreamEvent::Error(ProviderError::Provider {
                message,
                code: None,
            })];
        }

        let mut events = Vec::new();

        if !self.model_confirmed {
            if let Some(model) = record.model {
                self.model_confirmed = true;
                events.push(StreamEvent::ModelConfirmed(model));
            }
        }

        if let Some(content) = record.message.and_then(|m| m.content) {
            if !content.is_empty() {
                events.push(StreamEvent::TextDelta(content));
            }
        }

        if record.done {
            if let Some(prompt) = record.prompt_eval_count {
                events.push(StreamEvent::InputTokens(prompt));
            }
            if let Some(eval) = record.eval_count {
                events.push(StreamEvent::OutputTokens(eval));
            }
            events.push(StreamEvent::Done);
        }

        events
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
    fn test_generation_step() {
        let mut mapper = RecordMapper::new();
        let events = mapper.map_record(json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": "Hel"},
            "done": false
        }));
        assert_eq!(
            events,
            vec![
                StreamEvent::ModelConfirmed("llama3.2".to_string()),
                StreamEvent::TextDelta("Hel".to_string()),
            ]
        );
    }

    #[test]
    fn test_terminal_record_carries_counts() {
        let mut mapper = RecordMapper::new();
        mapper.model_confirmed = true;
        let events = mapper.map_record(json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": ""},
            "done": true,
            "total_duration": 1_200_000_000_u64,
            "prompt_eval_count": 26,
            "eval_count": 140
        }));
        assert_eq!(
            events,
            vec![
                StreamEvent::InputTokens(26),
                StreamEvent::OutputTokens(140),
                StreamEvent::Done,
            ]
        );
    }

    #[test]
    fn test_terminal_record_without_counts_still_done() {
        let mut mapper = RecordMapper::new();
        mapper.model_confirmed = true;
        let events = mapper.map_record(json!({"done": true}));
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn test_error_record() {
        let mut mapper = RecordMapper::new();
        let events = mapper.map_record(json!({"error": "model not loaded"}));
        assert_eq!(
            events,
            vec![StreamEvent::Error(ProviderError::Provider {
                message: "model not loaded".to_string(),
                code: None,
            })]
        );
    }
}
