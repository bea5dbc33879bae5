//! Typed request bodies for the Anthropic Messages API.
//!
//! The wire shape is part of the interoperability contract: `system`
//! sits outside the message array, content is a list of typed blocks,
//! and optional fields are omitted rather than sent as null.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parlance_core::{ChatRequest, Role};
use serde::Serialize;

/// Default output ceiling; the Messages API requires `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: &'static str,
    pub media_type: String,
    pub data: String,
}

impl MessagesRequest {
    /// Builds the wire request from a chat request.
    ///
    /// System-role transcript messages are folded into the top-level
    /// `system` field alongside the resolved system prompt, since the
    /// Messages API rejects `system` inside the message array.
    pub fn build(request: &ChatRequest) -> Self {
        let mut system_parts: Vec<String> = Vec::new();
        if let Some(prompt) = &request.system_prompt {
            system_parts.push(prompt.clone());
        }

        let mut messages = Vec::new();
        for message in &request.messages {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => {
                    system_parts.push(message.text.clone());
                    continue;
                }
            };

            let mut content = Vec::new();
            for attachment in &message.attachments {
                if attachment.is_image() {
                    content.push(ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: attachment.mime_type.clone(),
                            data: BASE64.encode(&attachment.data),
                        },
                    });
                }
            }
            content.push(ContentBlock::Text {
                text: message.text.clone(),
            });

            messages.push(WireMessage { role, content });
        }

        Self {
            model: request.model.clone(),
            max_tokens: request.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages,
            temperature: request.options.temperature,
            top_p: request.options.top_p,
            stream: request.options.stream,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
