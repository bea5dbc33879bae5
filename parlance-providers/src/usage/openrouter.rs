//! OpenRouter key-info endpoint parsing.
//!
//! ```text
//! GET https://openrouter.ai/api/v1/key
//! Authorization: Bearer <api_key>
//! ```
//!
//! ```json
//! {"data": {"label": "sk-or-...", "usage": 1.62, "limit": 10.0,
//!           "is_free_tier": false}}
//! ```
//!
//! `usage` and `limit` are dollars of credit; a null limit means
//! pay-as-you-go with no cap, which yields no percentage window.

use parlance_core::{ProviderError, UsageSnapshot, UsageWindow};
use serde::Deserialize;

/// Key-info endpoint path on the OpenRouter API host.
pub const KEY_ENDPOINT: &str = "/key";

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct KeyResponse {
    #[serde(default)]
    data: Option<KeyData>,
}

#[derive(Debug, Deserialize)]
struct KeyData {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    usage: Option<f64>,
    #[serde(default)]
    limit: Option<f64>,
    #[serde(default)]
    is_free_tier: Option<bool>,
}

// ============================================================================
// Parser
// ============================================================================

/// Parses the key-info body into a snapshot.
pub fn parse_usage(body: &str) -> Result<UsageSnapshot, ProviderError> {
    let response: KeyResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("key body: {e}")))?;

    let Some(data) = response.data else {
        return Ok(UsageSnapshot::default());
    };

    let mut windows = Vec::new();
    if let (Some(usage), Some(limit)) = (data.usage, data.limit) {
        if limit > 0.0 {
            windows.push(UsageWindow::new("Credits", usage / limit * 100.0));
        }
    }

    let mut snapshot = UsageSnapshot::with_windows(windows);
    snapshot.account = data.label;
    snapshot.plan = data.is_free_tier.map(|free| {
        if free {
            "Free tier".to_string()
        } else {
            "Paid".to_string()
        }
    });
    Ok(snapshot)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_over_limit_percentage() {
        let snapshot = parse_usage(
            r#"{"data": {"label": "sk-or-abc", "usage": 2.5, "limit": 10.0, "is_free_tier": false}}"#,
        )
        .unwrap();

        assert_eq!(snapshot.windows.len(), 1);
        assert_eq!(snapshot.windows[0].label, "Credits");
        assert_eq!(snapshot.windows[0].used_percent, 25.0);
        assert_eq!(snapshot.plan.as_deref(), Some("Paid"));
    }

    #[test]
    fn test_null_limit_yields_no_window() {
        let snapshot =
            parse_usage(r#"{"data": {"usage": 2.5, "limit": null, "is_free_tier": true}}"#)
                .unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.plan.as_deref(), Some("Free tier"));
    }

    #[test]
    fn test_missing_data_tolerated() {
        assert!(parse_usage("{}").unwrap().is_empty());
    }

    #[test]
    fn test_overspend_clamped() {
        let snapshot = parse_usage(r#"{"data": {"usage": 14.0, "limit": 10.0}}"#).unwrap();
        assert_eq!(snapshot.windows[0].used_percent, 100.0);
    }
}
