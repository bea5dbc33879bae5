//! Typed request bodies for the Chat Completions wire format.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parlance_core::{ChatRequest, Role};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Debug, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: Content,
}

/// Message content: a bare string for plain text, typed parts when the
/// message carries images.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<Part>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatCompletionsRequest {
    /// Builds the wire request from a chat request.
    ///
    /// The system prompt becomes the leading `system` message; image
    /// attachments become `image_url` parts carrying data URIs.
    pub fn build(request: &ChatRequest) -> Self {
        let mut messages = Vec::new();

        if let Some(prompt) = &request.system_prompt {
            messages.push(WireMessage {
                role: "system",
                content: Content::Text(prompt.clone()),
            });
        }

        for message in &request.messages {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            };

            let images: Vec<&parlance_core::AttachmentPayload> = message
                .attachments
                .iter()
                .filter(|a| a.is_image())
                .collect();

            let content = if images.is_empty() {
                Content::Text(message.text.clone())
            } else {
                let mut parts = vec![Part::Text {
                    text: message.text.clone(),
                }];
                for image in images {
                    parts.push(Part::ImageUrl {
                        image_url: ImageUrl {
                            url: format!(
                                "data:{};base64,{}",
                                image.mime_type,
                                BASE64.encode(&image.data)
                            ),
                        },
                    });
                }
                Content::Parts(parts)
            };

            messages.push(WireMessage { role, content });
        }

        Self {
            model: request.model.clone(),
            messages,
            temperature: request.options.temperature,
            top_p: request.options.top_p,
            max_tokens: request.options.max_tokens,
            stream: request.options.stream,
            stream_options: request
                .options
                .stream
                .then_some(StreamOptions { include_usage: true }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::{AttachmentPayload, ChatMessage};
    use serde_json::json;

    #[test]
    fn test_system_prompt_leads_message_array() {
        let request =
            ChatRequest::new(vec![ChatMessage::user("hi")], "gpt-4o").with_system_prompt("brief");
        let body = serde_json::to_value(ChatCompletionsRequest::build(&request)).unwrap();

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], json!("system"));
        assert_eq!(messages[0]["content"], json!("brief"));
        assert_eq!(messages[1]["content"], json!("hi"));
    }

    #[test]
    fn test_plain_text_stays_a_string() {
        let request = ChatRequest::new(vec![ChatMessage::user("hello")], "gpt-4o");
        let body = serde_json::to_value(ChatCompletionsRequest::build(&request)).unwrap();

        assert!(body["messages"][0]["content"].is_string());
    }

    #[test]
    fn test_image_becomes_data_uri_part() {
        let message = ChatMessage::user("describe").with_attachment(AttachmentPayload::new(
            vec![1, 2, 3],
            "image/png",
            "x.png",
        ));
        let request = ChatRequest::new(vec![message], "gpt-4o");
        let body = serde_json::to_value(ChatCompletionsRequest::build(&request)).unwrap();

        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], json!("text"));
        assert_eq!(parts[1]["type"], json!("image_url"));
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_usage_requested_when_streaming() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")], "gpt-4o");
        let body = serde_json::to_value(ChatCompletionsRequest::build(&request)).unwrap();

        assert_eq!(body["stream"], json!(true));
        assert_eq!(body["stream_options"]["include_usage"], json!(true));
    }

    #[test]
    fn test_no_stream_options_when_not_streaming() {
        let mut request = ChatRequest::new(vec![ChatMessage::user("hi")], "gpt-4o");
        request.options.stream = false;
        let body = serde_json::to_value(ChatCompletionsRequest::build(&request)).unwrap();

        assert!(body.get("stream_options").is_none());
    }
}
