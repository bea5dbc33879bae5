//! Newline-delimited JSON decoding.
//!
//! One complete JSON document per non-empty line. Partial lines are
//! buffered until their terminator arrives. A record that fails to parse
//! is logged and skipped (a single malformed record must not kill a
//! long-lived generation stream) while the buffer ceiling is the one
//! decode failure that does terminate.

use futures::Stream;
use futures_util::StreamExt;
use tracing::warn;

use crate::error::WireError;
use crate::sse::DEFAULT_MAX_BUFFER_BYTES;

// ============================================================================
// Decoder
// ============================================================================

/// Incremental NDJSON decoder.
#[derive(Debug)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    max_buffer_bytes: usize,
}

impl Default for NdjsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NdjsonDecoder {
    /// Creates a decoder with the default buffer ceiling.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        }
    }

    /// Sets the ceiling on the unterminated buffer.
    pub fn with_max_buffer(mut self, bytes: usize) -> Self {
        self.max_buffer_bytes = bytes;
        self
    }

    /// Feeds a chunk of bytes, returning any records completed by it.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BufferExceeded`] when a single line grows past
    /// the configured ceiling.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<serde_json::Value>, WireError> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<serde_json::Value>(&line) {
                Ok(value) => records.push(value),
                Err(err) => {
                    warn!(error = %err, len = line.len(), "Skipping malformed NDJSON record");
                }
            }
        }

        if self.buffer.len() > self.max_buffer_bytes {
            return Err(WireError::BufferExceeded {
                limit: self.max_buffer_bytes,
            });
        }

        Ok(records)
    }

    /// Flushes a trailing record that arrived without a final newline.
    pub fn finish(&mut self) -> Option<serde_json::Value> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            self.buffer.clear();
            return None;
        }

        let line = std::mem::take(&mut self.buffer);
        match serde_json::from_slice(&line) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "Discarding malformed trailing NDJSON record");
                None
            }
        }
    }
}

// ============================================================================
// Stream Adapter
// ============================================================================

/// Decodes a byte stream into a lazy sequence of JSON records.
pub fn ndjson_stream<S, B, E>(
    bytes: S,
    decoder: NdjsonDecoder,
) -> impl Stream<Item = Result<serde_json::Value, WireError>> + Send
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
                    Ok(records) => {
                        for record in records {
                            yield Ok(record);
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

        if let Some(record) = decoder.finish() {
            yield Ok(record);
        }
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
    fn test_one_record_per_line() {
        let mut decoder = NdjsonDecoder::new();
        let records = decoder.feed(b"{\"a\":1}\n{\"b\":2}\n").unwrap();
        assert_eq!(records, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn test_partial_line_buffered() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.feed(b"{\"a\":").unwrap().is_empty());
        let records = decoder.feed(b"1}\n").unwrap();
        assert_eq!(records, vec![json!({"a": 1})]);
    }

    #[test]
    fn test_malformed_record_skipped() {
        let mut decoder = NdjsonDecoder::new();
        let records = decoder.feed(b"{\"a\":1}\nnot json at all\n{\"b\":2}\n").unwrap();
        assert_eq!(records, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let mut decoder = NdjsonDecoder::new();
        let records = decoder.feed(b"\n\n{\"a\":1}\n  \n").unwrap();
        assert_eq!(records, vec![json!({"a": 1})]);
    }

    #[test]
    fn test_crlf_accepted() {
        let mut decoder = NdjsonDecoder::new();
        let records = decoder.feed(b"{\"a\":1}\r\n").unwrap();
        assert_eq!(records, vec![json!({"a": 1})]);
    }

    #[test]
    fn test_buffer_ceiling() {
        let mut decoder = NdjsonDecoder::new().with_max_buffer(8);
        let result = decoder.feed(b"{\"key\": \"a very long value with no newline");
        assert!(matches!(result, Err(WireError::BufferExceeded { limit: 8 })));
    }

    #[test]
    fn test_finish_flushes_trailing_record() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.feed(b"{\"done\":true}").unwrap().is_empty());
        assert_eq!(decoder.finish(), Some(json!({"done": true})));
        assert_eq!(decoder.finish(), None);
    }

    #[tokio::test]
    async fn test_stream_adapter_continues_past_bad_record() {
        use futures_util::StreamExt;

        let chunks: Vec<Result<&[u8], std::io::Error>> =
            vec![Ok(b"{\"n\":1}\ngarbage\n"), Ok(b"{\"n\":2}\n")];
        let stream = ndjson_stream(futures::stream::iter(chunks), NdjsonDecoder::new());
        let records: Vec<_> = stream.map(Result::unwrap).collect().await;

        assert_eq!(records, vec![json!({"n": 1}), json!({"n": 2})]);
    }
}
