//! Wire decoding error types.

use thiserror::Error;

/// Error type for wire protocol decoding.
#[derive(Debug, Error)]
pub enum WireError {
    /// The unterminated buffer grew past the configured ceiling.
    ///
    /// This is the only decode-level failure that terminates a stream;
    /// malformed individual records are skipped instead.
    #[error("Buffer exceeded {limit} bytes without a complete record")]
    BufferExceeded {
        /// The configured ceiling in bytes.
        limit: usize,
    },

    /// The underlying byte stream failed mid-read.
    #[error("Transport error: {0}")]
    Transport(String),
}
