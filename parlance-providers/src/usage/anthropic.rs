//! Anthropic usage endpoint parsing.
//!
//! ```text
//! GET https://api.anthropic.com/v1/usage
//! Authorization: Bearer <access_token>
//! ```
//!
//! ```json
//! {
//!   "fiveHour": {"utilization": 25.0, "resetsAt": "2025-01-01T12:00:00Z"},
//!   "sevenDay": {"utilization": 45.0, "resetsAt": "2025-01-05T00:00:00Z"},
//!   "sevenDaySonnet": {"utilization": 30.0, "resetsAt": "2025-01-05T00:00:00Z"},
//!   "account": {"email": "user@example.com", "plan": "Max"}
//! }
//! ```

use chrono::{DateTime, Utc};
use parlance_core::{ProviderError, UsageSnapshot, UsageWindow};
use serde::Deserialize;
use tracing::debug;

/// Usage endpoint path on the Anthropic API host.
pub const USAGE_ENDPOINT: &str = "/v1/usage";

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageApiResponse {
    #[serde(default)]
    five_hour: Option<ApiWindow>,
    #[serde(default)]
    seven_day: Option<ApiWindow>,
    #[serde(default)]
    seven_day_sonnet: Option<ApiWindow>,
    #[serde(default)]
    account: Option<AccountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiWindow {
    #[serde(default)]
    utilization: Option<f64>,
    #[serde(default)]
    used_percent: Option<f64>,
    #[serde(default)]
    remaining: Option<f64>,
    #[serde(default)]
    resets_at: Option<String>,
}

impl ApiWindow {
    /// Used percentage, tolerating the field-name drift this endpoint
    /// has shown over time.
    fn used_percent(&self) -> f64 {
        if let Some(utilization) = self.utilization {
            return utilization;
        }
        if let Some(used) = self.used_percent {
            return used;
        }
        if let Some(remaining) = self.remaining {
            return 100.0 - remaining;
        }
        0.0
    }

    fn resets_at(&self) -> Option<DateTime<Utc>> {
        self.resets_at.as_ref().and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
    }

    fn to_window(&self, label: &str) -> UsageWindow {
        let mut window = UsageWindow::new(label, self.used_percent());
        window.resets_at = self.resets_at();
        window
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    plan: Option<String>,
}

// ============================================================================
// Parser
// ============================================================================

/// Parses the usage endpoint body into a snapshot.
///
/// Every field is optional; an entirely empty body yields an empty
/// snapshot rather than an error.
pub fn parse_usage(body: &str) -> Result<UsageSnapshot, ProviderError> {
    let response: UsageApiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("usage body: {e}")))?;

    let mut windows = Vec::new();
    if let Some(window) = &response.five_hour {
        windows.push(window.to_window("5 hours"));
    }
    if let Some(window) = &response.seven_day {
        windows.push(window.to_window("Week"));
    }
    if let Some(window) = &response.seven_day_sonnet {
        windows.push(window.to_window("Week (Sonnet)"));
    }

    let mut snapshot = UsageSnapshot::with_windows(windows);
    if let Some(account) = response.account {
        snapshot.account = account.email;
        snapshot.plan = account.plan;
    }

    debug!(windows = snapshot.windows.len(), "Parsed Anthropic usage");
    Ok(snapshot)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_response() {
        let snapshot = parse_usage(
            r#"{
                "fiveHour": {"utilization": 25.0, "resetsAt": "2025-01-01T12:00:00Z"},
                "sevenDay": {"utilization": 45.5, "resetsAt": "2025-01-05T00:00:00Z"},
                "account": {"email": "u@example.com", "plan": "Max"}
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.windows.len(), 2);
        assert_eq!(snapshot.windows[0].label, "5 hours");
        assert_eq!(snapshot.windows[0].used_percent, 25.0);
        assert!(snapshot.windows[0].resets_at.is_some());
        assert_eq!(snapshot.windows[1].used_percent, 45.5);
        assert_eq!(snapshot.account.as_deref(), Some("u@example.com"));
        assert_eq!(snapshot.plan.as_deref(), Some("Max"));
    }

    #[test]
    fn test_missing_fields_tolerated() {
        let snapshot = parse_usage("{}").unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_remaining_variant() {
        let snapshot = parse_usage(r#"{"fiveHour": {"remaining": 30.0}}"#).unwrap();
        assert_eq!(snapshot.windows[0].used_percent, 70.0);
    }

    #[test]
    fn test_out_of_range_clamped() {
        let snapshot = parse_usage(r#"{"sevenDay": {"utilization": 180.0}}"#).unwrap();
        assert_eq!(snapshot.windows[0].used_percent, 100.0);
    }

    #[test]
    fn test_bad_timestamp_tolerated() {
        let snapshot =
            parse_usage(r#"{"fiveHour": {"utilization": 10.0, "resetsAt": "soon"}}"#).unwrap();
        assert!(snapshot.windows[0].resets_at.is_none());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(parse_usage("not json").is_err());
    }
}
