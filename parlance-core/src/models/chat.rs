//! Chat exchange types.
//!
//! This module contains the types that cross the adapter boundary:
//! - [`ChatMessage`] / [`Role`] / [`AttachmentPayload`] - outbound request
//! - [`RequestOptions`] - per-request tuning knobs
//! - [`ChatRequest`] - the complete payload handed to an adapter
//! - [`StreamEvent`] - the unified event model every backend maps into

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

// ============================================================================
// Messages
// ============================================================================

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user.
    User,
    /// Model output.
    Assistant,
    /// System instruction.
    System,
}

/// One message in the outbound conversation transcript.
///
/// Used only to build the wire request; this core never persists messages.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Text content.
    pub text: String,
    /// Binary attachments (images) carried with this message.
    pub attachments: Vec<AttachmentPayload>,
}

impl ChatMessage {
    /// Creates a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    /// Attaches a payload to this message.
    pub fn with_attachment(mut self, attachment: AttachmentPayload) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Raw attachment bytes plus the metadata needed to encode them.
///
/// A value type: it owns its bytes for exactly the duration of the call
/// that constructs the wire request.
#[derive(Debug, Clone)]
pub struct AttachmentPayload {
    /// Raw content bytes.
    pub data: Vec<u8>,
    /// MIME type (e.g. "image/png").
    pub mime_type: String,
    /// Original file name, for display only.
    pub file_name: String,
}

impl AttachmentPayload {
    /// Creates a new attachment payload.
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    /// Returns true if this attachment is an image.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

// ============================================================================
// Request Options
// ============================================================================

/// Per-request tuning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum output tokens.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling cutoff.
    pub top_p: Option<f32>,
    /// Whether to stream the response.
    pub stream: bool,
    /// Request timeout in seconds. `None` uses the client default.
    pub timeout_secs: Option<u64>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            top_p: None,
            stream: true,
            timeout_secs: None,
        }
    }
}

/// The complete payload for one `send_message` call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation transcript, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Model id to use.
    pub model: String,
    /// Resolved system prompt, if any. Business rules about persona or
    /// prompt selection happen upstream; this is the final string.
    pub system_prompt: Option<String>,
    /// Tuning options.
    pub options: RequestOptions,
}

impl ChatRequest {
    /// Creates a request with default options.
    pub fn new(messages: Vec<ChatMessage>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
            system_prompt: None,
            options: RequestOptions::default(),
        }
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the options.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

// ============================================================================
// Stream Events
// ============================================================================

/// One event in the unified completion stream.
///
/// Every backend's wire format is mapped into this sequence. `Done` and
/// `Error` are terminal: nothing follows them.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of assistant text, in emission order.
    TextDelta(String),
    /// Input (prompt) token count reported by the backend.
    InputTokens(u64),
    /// Output (completion) token count reported by the backend.
    OutputTokens(u64),
    /// The backend confirmed which model is serving the request.
    ModelConfirmed(String),
    /// The exchange completed normally.
    Done,
    /// The exchange failed; carries the reason.
    Error(ProviderError),
}

impl StreamEvent {
    /// Returns true if this event ends the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(StreamEvent::Done.is_terminal());
        assert!(StreamEvent::Error(ProviderError::Cancelled).is_terminal());
        assert!(!StreamEvent::TextDelta("hi".into()).is_terminal());
        assert!(!StreamEvent::InputTokens(12).is_terminal());
    }

    #[test]
    fn test_attachment_is_image() {
        let png = AttachmentPayload::new(vec![1, 2, 3], "image/png", "a.png");
        assert!(png.is_image());

        let pdf = AttachmentPayload::new(vec![1], "application/pdf", "a.pdf");
        assert!(!pdf.is_image());
    }

    #[test]
    fn test_default_options_stream() {
        assert!(RequestOptions::default().stream);
    }
}
