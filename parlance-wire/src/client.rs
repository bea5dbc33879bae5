//! HTTP client abstractions.
//!
//! One shared `reqwest` client configured the same way for every adapter,
//! plus the canonical mapping from HTTP failures to [`ProviderError`].
//! No retry lives here: retryability is advertised on the error kind and
//! acting on it is a caller decision.

use std::time::Duration;

use parlance_core::ProviderError;
use reqwest::{Client, Response, StatusCode, header};
use tracing::warn;

/// Default request timeout in seconds.
///
/// Generous because a single streaming completion can legitimately run
/// for minutes; callers override per request via `RequestOptions`.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Client
// ============================================================================

/// Builds the shared HTTP client used by all adapters.
pub fn build_client() -> Result<Client, ProviderError> {
    build_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Builds an HTTP client with a custom default timeout.
pub fn build_client_with_timeout(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("parlance/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Maps a transport-level `reqwest` failure to a [`ProviderError`].
pub fn map_transport_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Checks a response status, consuming the response on failure.
///
/// Returns the response untouched when the status is a success. Otherwise
/// the body is read (best effort) for the error message and the status is
/// mapped: 401 unauthorized, 404 model-not-found, 429 rate-limited with
/// `Retry-After`, 5xx server error, anything else an invalid response.
pub async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        None
    } else {
        Some(truncate(&body, 512))
    };

    warn!(status = %status, "HTTP request failed");

    Err(match status {
        StatusCode::UNAUTHORIZED => ProviderError::Unauthorized,
        StatusCode::NOT_FOUND => ProviderError::ModelNotFound(message.unwrap_or_default()),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        s if s.is_server_error() => ProviderError::Server {
            status: s.as_u16(),
            message,
        },
        s => ProviderError::InvalidResponse(format!(
            "Unexpected status {}: {}",
            s,
            message.unwrap_or_default()
        )),
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.starts_with("hé") || t.starts_with('h'));

        assert_eq!(truncate("short", 512), "short");
    }
}
