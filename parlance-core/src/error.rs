//! Error taxonomy shared by all Parlance crates.

use thiserror::Error;

/// Error type for provider operations.
///
/// Every failure that can reach a caller, synchronously from the manager
/// or as the terminal event of a chat stream, is one of these variants.
/// Retry is never performed inside the core; callers decide based on
/// [`ProviderError::is_retryable`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// The stored API key is malformed or empty.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// The backend rejected the credentials (HTTP 401).
    #[error("Unauthorized")]
    Unauthorized,

    /// An OAuth access token has expired and needs a refresh.
    #[error("Token expired")]
    TokenExpired,

    /// The backend rate-limited the request (HTTP 429).
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, from the `Retry-After` header.
        retry_after: Option<u64>,
    },

    /// Connection-level failure (DNS, TLS, reset, refused).
    #[error("Network error: {0}")]
    Network(String),

    /// The caller-configured request timeout elapsed.
    #[error("Request timed out")]
    Timeout,

    /// The backend returned a 5xx status.
    #[error("Server error {status}: {message:?}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt, if one was readable.
        message: Option<String>,
    },

    /// The request was cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,

    /// The response could not be decoded into the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The requested model is not known to the backend.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The operation is not supported by this provider.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// An error reported by the backend inside an otherwise valid response.
    #[error("Provider error: {message}")]
    Provider {
        /// Human-readable message from the backend.
        message: String,
        /// Backend-specific error code, if present.
        code: Option<String>,
    },
}

impl ProviderError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// Auth failures and not-found conditions are permanent; transient
    /// transport and capacity conditions are not. The core itself never
    /// retries; this is advisory for the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout | Self::Server { .. }
        )
    }
}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No value stored under the requested key.
    #[error("Credential not found: {0}")]
    NotFound(String),

    /// The platform denied access to the secret storage.
    #[error("Access denied to credential store")]
    AccessDenied,

    /// The secret storage backend is unavailable.
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    /// Serialization of a structured secret failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Platform-specific failure.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Filesystem failure (settings persistence).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(ProviderError::RateLimited { retry_after: Some(30) }.is_retryable());
        assert!(
            ProviderError::Server {
                status: 503,
                message: None
            }
            .is_retryable()
        );

        assert!(!ProviderError::Unauthorized.is_retryable());
        assert!(!ProviderError::InvalidApiKey.is_retryable());
        assert!(!ProviderError::ModelNotFound("x".into()).is_retryable());
        assert!(!ProviderError::Cancelled.is_retryable());
    }

    #[test]
    fn test_display_includes_status() {
        let err = ProviderError::Server {
            status: 502,
            message: Some("bad gateway".into()),
        };
        assert!(err.to_string().contains("502"));
    }
}
