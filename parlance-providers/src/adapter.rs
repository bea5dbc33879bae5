//! The backend adapter contract and shared streaming plumbing.
//!
//! Every backend family implements [`ChatAdapter`]; callers obtain
//! instances through the provider manager and never construct them
//! directly. The streaming pumps in this module own the lifecycle shared
//! by all adapters: connect, decode, map, and terminate. Exactly one
//! terminal event per sequence, cancellation checked between decoded
//! events.

use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::Stream;
use futures_util::StreamExt;
use parlance_core::{ChatRequest, ModelDescriptor, ProviderError, ProviderSnapshot, StreamEvent};
use parlance_wire::{NdjsonDecoder, SseDecoder, SseEvent, WireError, check_status, map_transport_error};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A pull-based sequence of [`StreamEvent`]s with exactly one consumer.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

// ============================================================================
// Adapter Contract
// ============================================================================

/// The polymorphic capability set every backend family implements.
///
/// Adapters are immutable once constructed: they hold a
/// [`ProviderSnapshot`] and never see the mutable configuration. They
/// never retry; retryability is advertised on the error and acted on by
/// the caller.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// The snapshot this adapter was built from.
    fn snapshot(&self) -> &ProviderSnapshot;

    /// Lists the models the backend currently offers.
    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError>;

    /// Sends a completion request, returning a cancellable event stream.
    ///
    /// The stream always ends with exactly one terminal event (`Done` or
    /// `Error`); failures after the request is built are delivered
    /// in-stream, never as a silent stop.
    ///
    /// # Errors
    ///
    /// Fails synchronously only for request-construction problems
    /// (unusable configuration, unserializable payload).
    async fn send_message(&self, request: ChatRequest) -> Result<EventStream, ProviderError>;

    /// Issues one minimal authenticated request to check the credential.
    ///
    /// A 401 means the credential is bad and yields `Ok(false)`; other
    /// failures propagate as errors.
    async fn validate_credentials(&self) -> Result<bool, ProviderError>;

    /// Aborts the in-flight request, if any.
    ///
    /// Idempotent and callable from any task; the live event stream
    /// terminates with a `Cancelled` error.
    fn cancel(&self);
}

// ============================================================================
// Cancellation
// ============================================================================

/// Per-adapter cancellation state.
///
/// Each `send_message` call swaps in a fresh token; `cancel` fires the
/// current one. Firing a token twice, or with no request in flight, is
/// harmless.
#[derive(Debug, Default)]
pub struct CancelState {
    current: Mutex<Option<CancellationToken>>,
}

impl CancelState {
    /// Creates an idle cancel state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request, returning its token.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *current = Some(token.clone());
        token
    }

    /// Cancels the current request, if any.
    pub fn cancel(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(token) = current.as_ref() {
            token.cancel();
        }
    }
}

// ============================================================================
// Shared Stream Pumps
// ============================================================================

fn wire_to_provider(err: WireError) -> ProviderError {
    match err {
        WireError::BufferExceeded { limit } => {
            ProviderError::InvalidResponse(format!("record exceeded {limit} bytes"))
        }
        WireError::Transport(msg) => ProviderError::Network(msg),
    }
}

/// Sends the request, mapping cancellation and transport failures.
async fn open_stream(
    request: reqwest::RequestBuilder,
    token: &CancellationToken,
) -> Result<reqwest::Response, ProviderError> {
    let response = tokio::select! {
        () = token.cancelled() => return Err(ProviderError::Cancelled),
        result = request.send() => result.map_err(|e| map_transport_error(&e))?,
    };
    check_status(response).await
}

/// Runs one SSE exchange end to end.
///
/// Connects, decodes, feeds each event to `mapper`, and stops after the
/// first terminal event it produces. End of input without a terminal
/// event is an error, not a silent stop.
pub(crate) fn sse_exchange<M>(
    request: reqwest::RequestBuilder,
    token: CancellationToken,
    mapper: M,
) -> EventStream
where
    M: FnMut(SseEvent) -> Vec<StreamEvent> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let response = match open_stream(request, &token).await {
            Ok(response) => response,
            Err(err) => {
                yield StreamEvent::Error(err);
                return;
            }
        };

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| map_transport_error(&e)));
        let inner = pump_sse(bytes, token, mapper);
        let mut inner = std::pin::pin!(inner);
        while let Some(event) = inner.next().await {
            yield event;
        }
    })
}

/// Runs one NDJSON exchange end to end.
pub(crate) fn ndjson_exchange<M>(
    request: reqwest::RequestBuilder,
    token: CancellationToken,
    mapper: M,
) -> EventStream
where
    M: FnMut(serde_json::Value) -> Vec<StreamEvent> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let response = match open_stream(request, &token).await {
            Ok(response) => response,
            Err(err) => {
                yield StreamEvent::Error(err);
                return;
            }
        };

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| map_transport_error(&e)));
        let inner = pump_ndjson(bytes, token, mapper);
        let mut inner = std::pin::pin!(inner);
        while let Some(event) = inner.next().await {
            yield event;
        }
    })
}

/// Decode-and-map pump for SSE bodies.
///
/// Split from [`sse_exchange`] so mapping and termination semantics are
/// testable against synthetic byte streams.
pub(crate) fn pump_sse<S, B, M>(
    bytes: S,
    token: CancellationToken,
    mut mapper: M,
) -> impl Stream<Item = StreamEvent> + Send
where
    S: Stream<Item = Result<B, ProviderError>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    M: FnMut(SseEvent) -> Vec<StreamEvent> + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut bytes = std::pin::pin!(bytes);

        loop {
            let chunk = tokio::select! {
                () = token.cancelled() => {
                    debug!("Exchange cancelled mid-stream");
                    yield StreamEvent::Error(ProviderError::Cancelled);
                    return;
                }
                chunk = bytes.next() => chunk,
            };

            let Some(chunk) = chunk else {
                yield StreamEvent::Error(ProviderError::InvalidResponse(
                    "stream closed before completion".to_string(),
                ));
                return;
            };

            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield StreamEvent::Error(err);
                    return;
                }
            };

            let events = match decoder.feed(chunk.as_ref()) {
                Ok(events) => events,
                Err(err) => {
                    yield StreamEvent::Error(wire_to_provider(err));
                    return;
                }
            };

            for event in events {
                for mapped in mapper(event) {
                    let terminal = mapped.is_terminal();
                    yield mapped;
                    if terminal {
                        return;
                    }
                }
            }
        }
    }
}

/// Decode-and-map pump for NDJSON bodies.
///
/// Unlike SSE, a trailing record without a final newline is legal here
/// and gets flushed at end of input.
pub(crate) fn pump_ndjson<S, B, M>(
    bytes: S,
    token: CancellationToken,
    mut mapper: M,
) -> impl Stream<Item = StreamEvent> + Send
where
    S: Stream<Item = Result<B, ProviderError>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    M: FnMut(serde_json::Value) -> Vec<StreamEvent> + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = NdjsonDecoder::new();
        let mut bytes = std::pin::pin!(bytes);

        loop {
            let chunk = tokio::select! {
                () = token.cancelled() => {
                    debug!("Exchange cancelled mid-stream");
                    yield StreamEvent::Error(ProviderError::Cancelled);
                    return;
                }
                chunk = bytes.next() => chunk,
            };

            let Some(chunk) = chunk else {
                if let Some(record) = decoder.finish() {
                    for mapped in mapper(record) {
                        let terminal = mapped.is_terminal();
                        yield mapped;
                        if terminal {
                            return;
                        }
                    }
                }
                yield StreamEvent::Error(ProviderError::InvalidResponse(
                    "stream closed before completion".to_string(),
                ));
                return;
            };

            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield StreamEvent::Error(err);
                    return;
                }
            };

            let records = match decoder.feed(chunk.as_ref()) {
                Ok(records) => records,
                Err(err) => {
                    yield StreamEvent::Error(wire_to_provider(err));
                    return;
                }
            };

            for record in records {
                for mapped in mapper(record) {
                    let terminal = mapped.is_terminal();
                    yield mapped;
                    if terminal {
                        return;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_chunks(chunks: &[&'static str]) -> Vec<Result<&'static [u8], ProviderError>> {
        chunks.iter().map(|c| Ok(c.as_bytes())).collect()
    }

    /// Mapper that emits each data payload as a delta and `[DONE]` as Done.
    fn echo_mapper(event: SseEvent) -> Vec<StreamEvent> {
        match event.data.as_deref() {
            Some("[DONE]") => vec![StreamEvent::Done],
            Some(data) => vec![StreamEvent::TextDelta(data.to_string())],
            None => vec![],
        }
    }

    #[tokio::test]
    async fn test_pump_sse_terminates_on_done() {
        let bytes = futures::stream::iter(ok_chunks(&[
            "data: hello\n\n",
            "data: [DONE]\n\n",
            "data: after\n\n",
        ]));
        let events: Vec<_> = pump_sse(bytes, CancellationToken::new(), echo_mapper)
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("hello".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_pump_sse_eof_without_terminal_is_error() {
        let bytes = futures::stream::iter(ok_chunks(&["data: partial\n\n"]));
        let events: Vec<_> = pump_sse(bytes, CancellationToken::new(), echo_mapper)
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            StreamEvent::Error(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_pump_sse_cancellation_is_terminal() {
        let token = CancellationToken::new();
        // One chunk, then an input that never completes.
        let bytes = futures::stream::iter(ok_chunks(&["data: one\n\n"]))
            .chain(futures::stream::pending());

        let stream = pump_sse(bytes, token.clone(), echo_mapper);
        let mut stream = std::pin::pin!(stream);

        assert_eq!(
            stream.next().await,
            Some(StreamEvent::TextDelta("one".to_string()))
        );

        token.cancel();
        assert_eq!(
            stream.next().await,
            Some(StreamEvent::Error(ProviderError::Cancelled))
        );
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_cancel_state_is_idempotent() {
        let state = CancelState::new();
        // No request in flight: harmless.
        state.cancel();

        let token = state.begin();
        state.cancel();
        state.cancel();
        assert!(token.is_cancelled());

        // A new request gets a fresh, uncancelled token.
        let token2 = state.begin();
        assert!(!token2.is_cancelled());
    }

    #[tokio::test]
    async fn test_pump_sse_transport_error_is_terminal() {
        let bytes = futures::stream::iter(vec![
            Ok::<&[u8], ProviderError>(b"data: one\n\n"),
            Err(ProviderError::Timeout),
        ]);
        let events: Vec<_> = pump_sse(bytes, CancellationToken::new(), echo_mapper)
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1], StreamEvent::Error(ProviderError::Timeout));
    }

    #[tokio::test]
    async fn test_pump_ndjson_flushes_trailing_record() {
        let mapper = |record: serde_json::Value| {
            if record.get("done").and_then(serde_json::Value::as_bool) == Some(true) {
                vec![StreamEvent::Done]
            } else {
                vec![StreamEvent::TextDelta(
                    record.get("text").and_then(|t| t.as_str()).unwrap_or("").to_string(),
                )]
            }
        };

        // Terminal record arrives without a final newline.
        let bytes = futures::stream::iter(ok_chunks(&["{\"text\":\"hi\"}\n{\"done\":true}"]));
        let events: Vec<_> = pump_ndjson(bytes, CancellationToken::new(), mapper)
            .collect()
            .await;

        assert_eq!(
            events,
            vec![StreamEvent::TextDelta("hi".to_string()), StreamEvent::Done]
        );
    }
}
