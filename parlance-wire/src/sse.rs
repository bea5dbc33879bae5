//! Server-Sent Events decoding.
//!
//! Turns a byte stream into discrete SSE events. The decoder knows nothing
//! about any AI API: a `[DONE]` data payload is surfaced like any other
//! event, and interpretation belongs to the layer above.
//!
//! Parsing rules:
//! - Events are separated by a blank line.
//! - `field: value` and `field:value` both populate the field; one leading
//!   space after the colon is stripped.
//! - Multiple `data` lines are concatenated with `\n` in encounter order.
//! - A field with an empty value yields an empty string, not an omitted
//!   field.
//! - Lines beginning with `:` are comments and dropped unless the caller
//!   opts in to keep them.
//! - CRLF and bare LF are both accepted as line terminators.
//! - Unknown fields are ignored; a malformed `retry` value is ignored.

use futures::Stream;
use futures_util::StreamExt;
use tracing::trace;

use crate::error::WireError;

/// Default ceiling on the unterminated buffer.
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 1024 * 1024;

// ============================================================================
// Event
// ============================================================================

/// One decoded SSE event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseEvent {
    /// Value of the `event` field, if present.
    pub event: Option<String>,
    /// Joined value of all `data` fields, if any were present.
    pub data: Option<String>,
    /// Value of the `id` field, if present.
    pub id: Option<String>,
    /// Value of the `retry` field in milliseconds, if present and valid.
    pub retry: Option<u64>,
    /// Comment lines, populated only when comments are kept.
    pub comments: Vec<String>,
}

impl SseEvent {
    /// Returns true if no recognized field was populated.
    fn is_empty(&self) -> bool {
        self.event.is_none()
            && self.data.is_none()
            && self.id.is_none()
            && self.retry.is_none()
            && self.comments.is_empty()
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Incremental SSE decoder.
///
/// Feed raw chunks as they arrive; complete events come back in order.
/// The decoder buffers at most one unterminated line plus the fields of
/// the in-progress event.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event_name: Option<String>,
    data_lines: Vec<String>,
    id: Option<String>,
    retry: Option<u64>,
    comments: Vec<String>,
    keep_comments: bool,
    max_buffer_bytes: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    /// Creates a decoder with default settings.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            event_name: None,
            data_lines: Vec::new(),
            id: None,
            retry: None,
            comments: Vec::new(),
            keep_comments: false,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        }
    }

    /// Keeps comment lines on decoded events instead of dropping them.
    pub fn keep_comments(mut self, keep: bool) -> Self {
        self.keep_comments = keep;
        self
    }

    /// Sets the ceiling on the unterminated buffer.
    pub fn with_max_buffer(mut self, bytes: usize) -> Self {
        self.max_buffer_bytes = bytes;
        self
    }

    /// Feeds a chunk of bytes, returning any events completed by it.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BufferExceeded`] when no line terminator has
    /// appeared within the configured ceiling; the stream must then be
    /// abandoned.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, WireError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop(); // the \n itself
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.buffer.len() > self.max_buffer_bytes {
            return Err(WireError::BufferExceeded {
                limit: self.max_buffer_bytes,
            });
        }

        Ok(events)
    }

    /// Handles one complete line; returns an event on a blank separator.
    fn process_line(&mut self, line: &[u8]) -> Option<SseEvent> {
        if line.is_empty() {
            return self.take_event();
        }

        let line = String::from_utf8_lossy(line);

        if let Some(comment) = line.strip_prefix(':') {
            if self.keep_comments {
                self.comments
                    .push(comment.strip_prefix(' ').unwrap_or(comment).to_string());
            }
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(colon) => {
                let value = &line[colon + 1..];
                (&line[..colon], value.strip_prefix(' ').unwrap_or(value))
            }
            // A line with no colon is a field with an empty value.
            None => (line.as_ref(), ""),
        };

        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event_name = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(ms);
                } else {
                    trace!(value = %value, "Ignoring malformed retry field");
                }
            }
            other => trace!(field = %other, "Ignoring unknown SSE field"),
        }

        None
    }

    /// Finalizes the in-progress event, if it has any content.
    fn take_event(&mut self) -> Option<SseEvent> {
        let event = SseEvent {
            event: self.event_name.take(),
            data: if self.data_lines.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.data_lines).join("\n"))
            },
            id: self.id.take(),
            retry: self.retry.take(),
            comments: std::mem::take(&mut self.comments),
        };

        if event.is_empty() { None } else { Some(event) }
    }
}

// ============================================================================
// Stream Adapter
// ============================================================================

/// Decodes a byte stream into a lazy sequence of SSE events.
///
/// The sequence ends when the input closes or the consumer is dropped; an
/// incomplete trailing event at end of input is discarded, matching
/// browser behavior. Transport failures and the buffer ceiling surface as
/// `Err` items that terminate the sequence.
pub fn sse_stream<S, B, E>(
    bytes: S,
    decoder: SseDecoder,
) -> impl Stream<Item = Result<SseEvent, WireError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    async_stream::stream! {
        let mut decoder = decoder;
        let mut bytes = std::pin::pin!(bytes);

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => match decoder.feed(chunk.as_ref()) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                },
                Err(err) => {
                    yield Err(WireError::Transport(err.to_string()));
                    return;
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

    fn decode_all(input: &str) -> Vec<SseEvent> {
        SseDecoder::new().feed(input.as_bytes()).unwrap()
    }

    #[test]
    fn test_single_event() {
        let events = decode_all("data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.as_deref(), Some("hello"));
    }

    #[test]
    fn test_no_space_after_colon() {
        let events = decode_all("data:hello\n\n");
        assert_eq!(events[0].data.as_deref(), Some("hello"));
    }

    #[test]
    fn test_only_one_leading_space_stripped() {
        let events = decode_all("data:  padded\n\n");
        assert_eq!(events[0].data.as_deref(), Some(" padded"));
    }

    #[test]
    fn test_multi_data_joined_in_order() {
        let events = decode_all("data: first\ndata: second\ndata: third\n\n");
        assert_eq!(events[0].data.as_deref(), Some("first\nsecond\nthird"));
    }

    #[test]
    fn test_crlf_equals_lf() {
        let lf = decode_all("event: tick\ndata: a\ndata: b\n\n");
        let crlf = decode_all("event: tick\r\ndata: a\r\ndata: b\r\n\r\n");
        assert_eq!(lf, crlf);
    }

    #[test]
    fn test_all_fields_captured() {
        let events = decode_all("event: update\nid: 42\nretry: 3000\ndata: x\n\n");
        let event = &events[0];
        assert_eq!(event.event.as_deref(), Some("update"));
        assert_eq!(event.id.as_deref(), Some("42"));
        assert_eq!(event.retry, Some(3000));
        assert_eq!(event.data.as_deref(), Some("x"));
    }

    #[test]
    fn test_malformed_retry_ignored() {
        let events = decode_all("retry: soon\ndata: x\n\n");
        assert_eq!(events[0].retry, None);
    }

    #[test]
    fn test_empty_value_is_empty_string() {
        let events = decode_all("data:\n\n");
        assert_eq!(events[0].data.as_deref(), Some(""));
    }

    #[test]
    fn test_field_without_colon_has_empty_value() {
        let events = decode_all("data\n\n");
        assert_eq!(events[0].data.as_deref(), Some(""));
    }

    #[test]
    fn test_comments_dropped_by_default() {
        let events = decode_all(": keepalive\ndata: x\n\n");
        assert!(events[0].comments.is_empty());
        assert_eq!(events[0].data.as_deref(), Some("x"));
    }

    #[test]
    fn test_comment_only_block_emits_nothing() {
        let events = decode_all(": ping\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_comments_kept_on_request() {
        let mut decoder = SseDecoder::new().keep_comments(true);
        let events = decoder.feed(b": ping\ndata: x\n\n").unwrap();
        assert_eq!(events[0].comments, vec!["ping".to_string()]);
    }

    #[test]
    fn test_comment_only_block_kept_on_request() {
        let mut decoder = SseDecoder::new().keep_comments(true);
        let events = decoder.feed(b": ping\n\n").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].comments, vec!["ping".to_string()]);
        assert!(events[0].data.is_none());
    }

    #[test]
    fn test_done_passes_through() {
        let events = decode_all("data: [DONE]\n\n");
        assert_eq!(events[0].data.as_deref(), Some("[DONE]"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let events = decode_all("banana: yes\ndata: x\n\n");
        assert_eq!(events[0].data.as_deref(), Some("x"));
    }

    #[test]
    fn test_incremental_feed_across_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"da").unwrap().is_empty());
        assert!(decoder.feed(b"ta: hel").unwrap().is_empty());
        assert!(decoder.feed(b"lo\n").unwrap().is_empty());
        let events = decoder.feed(b"\n").unwrap();
        assert_eq!(events[0].data.as_deref(), Some("hello"));
    }

    #[test]
    fn test_multiple_events_one_chunk() {
        let events = decode_all("data: one\n\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data.as_deref(), Some("one"));
        assert_eq!(events[1].data.as_deref(), Some("two"));
    }

    #[test]
    fn test_last_event_name_wins() {
        let events = decode_all("event: a\nevent: b\ndata: x\n\n");
        assert_eq!(events[0].event.as_deref(), Some("b"));
    }

    #[test]
    fn test_buffer_ceiling() {
        let mut decoder = SseDecoder::new().with_max_buffer(16);
        let result = decoder.feed(&[b'x'; 64]);
        assert!(matches!(result, Err(WireError::BufferExceeded { limit: 16 })));
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let input = "event: tick\ndata: a\ndata: b\nid: 7\n\n";
        assert_eq!(decode_all(input), decode_all(input));
    }

    #[tokio::test]
    async fn test_stream_adapter() {
        use futures_util::StreamExt;

        let chunks: Vec<Result<&[u8], std::io::Error>> =
            vec![Ok(b"data: hel"), Ok(b"lo\n\ndata: bye\n\n")];
        let stream = sse_stream(futures::stream::iter(chunks), SseDecoder::new());
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].as_ref().unwrap().data.as_deref(),
            Some("hello")
        );
        assert_eq!(events[1].as_ref().unwrap().data.as_deref(), Some("bye"));
    }

    #[tokio::test]
    async fn test_stream_transport_error_terminates() {
        use futures_util::StreamExt;

        let chunks: Vec<Result<&[u8], std::io::Error>> = vec![
            Ok(b"data: x\n\n"),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let stream = sse_stream(futures::stream::iter(chunks), SseDecoder::new());
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(WireError::Transport(_))));
    }
}
