//! Cross-adapter edge cases: fixtures fed through the real decoders and
//! mappers, exercising the seams between wire decoding and event
//! mapping that the per-module tests cover only in isolation.

use futures_util::StreamExt;
use parlance_core::{CustomProtocol, ProviderError, StreamEvent};
use parlance_wire::{SseDecoder, SseEvent};
use tokio_util::sync::CancellationToken;

use crate::adapter::pump_sse;
use crate::anthropic::map_event as map_anthropic;
use crate::custom::PointerMapper;
use crate::ollama::RecordMapper;
use crate::openai::ChunkMapper;

fn sse(data: &str) -> SseEvent {
    SseEvent {
        data: Some(data.to_string()),
        ..SseEvent::default()
    }
}

// ============================================================================
// Anthropic
// ============================================================================

#[test]
fn anthropic_full_exchange_through_decoder() {
    let wire = concat!(
        "event: message_start\r\n",
        "data: {\"type\":\"message_start\",\"message\":{\"model\":\"claude-sonnet-4-5\",\"usage\":{\"input_tokens\":11}}}\r\n",
        "\r\n",
        "event: ping\r\n",
        "data: {\"type\":\"ping\"}\r\n",
        "\r\n",
        "event: content_block_delta\r\n",
        "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\r\n",
        "\r\n",
        "event: message_delta\r\n",
        "data: {\"type\":\"message_delta\",\"usage\":{\"output_tokens\":3}}\r\n",
        "\r\n",
        "event: message_stop\r\n",
        "data: {\"type\":\"message_stop\"}\r\n",
        "\r\n",
    );

    let mut decoder = SseDecoder::new();
    let events: Vec<StreamEvent> = decoder
        .feed(wire.as_bytes())
        .unwrap()
        .into_iter()
        .flat_map(map_anthropic)
        .collect();

    assert_eq!(
        events,
        vec![
            StreamEvent::ModelConfirmed("claude-sonnet-4-5".to_string()),
            StreamEvent::InputTokens(11),
            StreamEvent::TextDelta("Hi".to_string()),
            StreamEvent::OutputTokens(3),
            StreamEvent::Done,
        ]
    );
}

#[test]
fn anthropic_message_start_without_usage() {
    let events = map_anthropic(sse(
        r#"{"type":"message_start","message":{"model":"claude-haiku-4-5"}}"#,
    ));
    assert_eq!(
        events,
        vec![StreamEvent::ModelConfirmed("claude-haiku-4-5".to_string())]
    );
}

#[test]
fn anthropic_unknown_event_type_ignored() {
    assert!(map_anthropic(sse(r#"{"type":"content_block_start","index":0}"#)).is_empty());
    assert!(map_anthropic(sse(r#"{"type":"brand_new_event"}"#)).is_empty());
}

// ============================================================================
// OpenAI-compatible
// ============================================================================

#[test]
fn openai_done_with_surrounding_whitespace() {
    let mut mapper = ChunkMapper::new();
    assert_eq!(mapper.map_event(sse(" [DONE] ")), vec![StreamEvent::Done]);
}

#[test]
fn openai_multi_choice_reads_first() {
    let mut mapper = ChunkMapper::new();
    let events = mapper.map_event(sse(
        r#"{"choices":[{"delta":{"content":"first"}},{"delta":{"content":"second"}}]}"#,
    ));
    assert_eq!(events, vec![StreamEvent::TextDelta("first".to_string())]);
}

#[test]
fn openai_role_only_first_chunk() {
    let mut mapper = ChunkMapper::new();
    // The opening chunk typically carries only the role; no text yet.
    let events = mapper.map_event(sse(
        r#"{"model":"gpt-4o","choices":[{"delta":{"role":"assistant"}}]}"#,
    ));
    assert_eq!(
        events,
        vec![StreamEvent::ModelConfirmed("gpt-4o".to_string())]
    );
}

#[test]
fn openai_null_content_tolerated() {
    let mut mapper = ChunkMapper::new();
    mapper.map_event(sse(r#"{"model":"m","choices":[{"delta":{"role":"assistant"}}]}"#));
    let events = mapper.map_event(sse(r#"{"choices":[{"delta":{"content":null}}]}"#));
    assert!(events.is_empty());
}

// ============================================================================
// Ollama
// ============================================================================

#[test]
fn ollama_done_false_field_variants() {
    let mut mapper = RecordMapper::new();
    let events = mapper.map_record(serde_json::json!({
        "model": "llama3.2",
        "message": {"content": "x"},
        "done": false,
        "done_reason": null
    }));
    assert!(!events.iter().any(StreamEvent::is_terminal));
}

#[test]
fn ollama_record_missing_message() {
    let mut mapper = RecordMapper::new();
    let events = mapper.map_record(serde_json::json!({"model": "llama3.2", "done": false}));
    assert_eq!(
        events,
        vec![StreamEvent::ModelConfirmed("llama3.2".to_string())]
    );
}

// ============================================================================
// Custom
// ============================================================================

#[test]
fn custom_pointer_through_array() {
    let protocol = CustomProtocol {
        text_pointer: "/outputs/0/content".to_string(),
        input_tokens_pointer: None,
        output_tokens_pointer: None,
        done_pointer: Some("/outputs/0/stop".to_string()),
        ..CustomProtocol::default()
    };
    let mapper = PointerMapper::new(protocol);

    let events = mapper.map_record(&serde_json::json!({
        "outputs": [{"content": "chunk", "stop": false}]
    }));
    assert_eq!(events, vec![StreamEvent::TextDelta("chunk".to_string())]);

    let events = mapper.map_record(&serde_json::json!({
        "outputs": [{"content": "", "stop": true}]
    }));
    assert_eq!(events, vec![StreamEvent::Done]);
}

#[test]
fn custom_non_string_text_ignored() {
    let mapper = PointerMapper::new(CustomProtocol::default());
    let events = mapper.map_record(&serde_json::json!({
        "choices": [{"delta": {"content": 42}}]
    }));
    assert!(events.is_empty());
}

// ============================================================================
// Full Pipeline
// ============================================================================

#[tokio::test]
async fn openai_exchange_split_at_awkward_boundaries() {
    // Chunk boundaries fall mid-line and mid-field-name.
    let chunks: Vec<Result<&[u8], ProviderError>> = vec![
        Ok(b"data: {\"model\":\"gpt-4o\",\"choices\":[{\"del"),
        Ok(b"ta\":{\"content\":\"He\"}}]}\n\nda"),
        Ok(b"ta: {\"choices\":[{\"delta\":{\"content\":\"y\"}}]}\n\n"),
        Ok(b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":2}}\n\n"),
        Ok(b"data: [DONE]\n\n"),
    ];

    let mut mapper = ChunkMapper::new();
    let events: Vec<StreamEvent> = pump_sse(
        futures::stream::iter(chunks),
        CancellationToken::new(),
        move |event| mapper.map_event(event),
    )
    .collect()
    .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::ModelConfirmed("gpt-4o".to_string()),
            StreamEvent::TextDelta("He".to_string()),
            StreamEvent::TextDelta("y".to_string()),
            StreamEvent::InputTokens(4),
            StreamEvent::OutputTokens(2),
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn cancellation_stops_deltas_and_terminates_once() {
    let token = CancellationToken::new();
    let chunks = futures::stream::iter(vec![Ok::<&[u8], ProviderError>(
        b"data: {\"choices\":[{\"delta\":{\"content\":\"one\"}}]}\n\n",
    )])
    .chain(futures::stream::pending());

    let mut mapper = ChunkMapper::new();
    let stream = pump_sse(chunks, token.clone(), move |event| mapper.map_event(event));
    let mut stream = std::pin::pin!(stream);

    assert_eq!(
        stream.next().await,
        Some(StreamEvent::TextDelta("one".to_string()))
    );

    token.cancel();
    // Cancelling again from "another caller" must be harmless.
    token.cancel();

    assert_eq!(
        stream.next().await,
        Some(StreamEvent::Error(ProviderError::Cancelled))
    );
    assert_eq!(stream.next().await, None, "no events after the terminal");
}

#[tokio::test]
async fn malformed_record_does_not_kill_exchange() {
    let chunks: Vec<Result<&[u8], ProviderError>> = vec![
        Ok(b"data: {{{corrupt\n\n"),
        Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n"),
        Ok(b"data: [DONE]\n\n"),
    ];

    let mut mapper = ChunkMapper::new();
    let events: Vec<StreamEvent> = pump_sse(
        futures::stream::iter(chunks),
        CancellationToken::new(),
        move |event| mapper.map_event(event),
    )
    .collect()
    .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::TextDelta("ok".to_string()),
            StreamEvent::Done,
        ]
    );
}
