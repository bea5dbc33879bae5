//! Best-effort usage extraction for unknown quota shapes.
//!
//! A last resort for endpoints nobody has written a real parser for: it
//! scans decoded JSON for common field-name variants and derives windows
//! from whatever it recognizes. The heuristics are deliberately loose and
//! can mis-read unrelated numeric fields; real integrations should get
//! their own parser. When nothing matches, the caller gets an error
//! naming what was looked for rather than a silent empty result.

use chrono::{DateTime, TimeZone, Utc};
use parlance_core::{ProviderError, UsageSnapshot, UsageWindow};
use serde_json::Value;

/// Field names read directly as a used percentage.
const PERCENT_KEYS: &[&str] = &[
    "used_percent",
    "usedPercent",
    "usage_percent",
    "usagePercent",
    "utilization",
    "percent_used",
    "percentUsed",
];

/// Field-name pairs read as (used, total) and converted to a percentage.
const PAIR_KEYS: &[(&str, &str)] = &[
    ("used", "total"),
    ("usedTokens", "totalTokens"),
    ("used_tokens", "total_tokens"),
    ("usage", "limit"),
    ("used", "limit"),
];

/// Field names read as a reset timestamp.
const RESET_KEYS: &[&str] = &[
    "resets_at",
    "resetsAt",
    "reset_at",
    "resetAt",
    "reset_time",
    "resetTime",
];

/// Objects nested deeper than this are not scanned.
const MAX_DEPTH: usize = 4;

// ============================================================================
// Extraction
// ============================================================================

/// Scans a decoded quota response for recognizable usage fields.
///
/// # Errors
///
/// Returns an explanatory [`ProviderError::InvalidResponse`] when no
/// window can be derived.
pub fn extract_usage(value: &Value) -> Result<UsageSnapshot, ProviderError> {
    let mut windows = Vec::new();
    scan(value, "Usage", 0, &mut windows);

    if windows.is_empty() {
        return Err(ProviderError::InvalidResponse(format!(
            "no recognizable usage fields; looked for {} and {} pairs",
            PERCENT_KEYS.join("/"),
            PAIR_KEYS
                .iter()
                .map(|(u, t)| format!("{u}+{t}"))
                .collect::<Vec<_>>()
                .join("/"),
        )));
    }

    Ok(UsageSnapshot::with_windows(windows))
}

fn scan(value: &Value, label: &str, depth: usize, windows: &mut Vec<UsageWindow>) {
    let Some(object) = value.as_object() else {
        return;
    };

    if let Some(percent) = window_percent(object) {
        let mut window = UsageWindow::new(label, percent);
        window.resets_at = reset_timestamp(object);
        windows.push(window);
        return;
    }

    if depth >= MAX_DEPTH {
        return;
    }

    for (key, child) in object {
        if child.is_object() {
            scan(child, key, depth + 1, windows);
        }
    }
}

fn window_percent(object: &serde_json::Map<String, Value>) -> Option<f64> {
    for key in PERCENT_KEYS {
        if let Some(percent) = object.get(*key).and_then(Value::as_f64) {
            return Some(percent);
        }
    }

    for (used_key, total_key) in PAIR_KEYS {
        let used = object.get(*used_key).and_then(Value::as_f64);
        let total = object.get(*total_key).and_then(Value::as_f64);
        if let (Some(used), Some(total)) = (used, total) {
            if total > 0.0 {
                return Some(used / total * 100.0);
            }
        }
    }

    None
}

fn reset_timestamp(object: &serde_json::Map<String, Value>) -> Option<DateTime<Utc>> {
    for key in RESET_KEYS {
        match object.get(*key) {
            Some(Value::String(raw)) => {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                    return Some(parsed.with_timezone(&Utc));
                }
            }
            Some(Value::Number(number)) => {
                let epoch = number.as_i64()?;
                // Heuristic: anything past ~2001 in millis is millis.
                let parsed = if epoch > 1_000_000_000_000 {
                    Utc.timestamp_millis_opt(epoch).single()
                } else {
                    Utc.timestamp_opt(epoch, 0).single()
                };
                if parsed.is_some() {
                    return parsed;
                }
            }
            _ => {}
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_percent() {
        let snapshot = extract_usage(&json!({"used_percent": 37.5})).unwrap();
        assert_eq!(snapshot.windows.len(), 1);
        assert_eq!(snapshot.windows[0].label, "Usage");
        assert_eq!(snapshot.windows[0].used_percent, 37.5);
    }

    #[test]
    fn test_camel_case_pair() {
        let snapshot =
            extract_usage(&json!({"usedTokens": 250, "totalTokens": 1000})).unwrap();
        assert_eq!(snapshot.windows[0].used_percent, 25.0);
    }

    #[test]
    fn test_nested_windows_labeled_by_key() {
        let snapshot = extract_usage(&json!({
            "session": {"utilization": 10.0},
            "weekly": {"used": 5, "limit": 10}
        }))
        .unwrap();

        assert_eq!(snapshot.windows.len(), 2);
        let labels: Vec<&str> = snapshot.windows.iter().map(|w| w.label.as_str()).collect();
        assert!(labels.contains(&"session"));
        assert!(labels.contains(&"weekly"));
    }

    #[test]
    fn test_iso_reset_timestamp() {
        let snapshot = extract_usage(&json!({
            "used_percent": 50.0,
            "resets_at": "2025-06-01T00:00:00Z"
        }))
        .unwrap();
        assert!(snapshot.windows[0].resets_at.is_some());
    }

    #[test]
    fn test_epoch_millis_reset_timestamp() {
        let snapshot = extract_usage(&json!({
            "used_percent": 50.0,
            "resetAt": 1_748_736_000_000_i64
        }))
        .unwrap();
        assert!(snapshot.windows[0].resets_at.is_some());
    }

    #[test]
    fn test_epoch_seconds_reset_timestamp() {
        let snapshot = extract_usage(&json!({
            "used_percent": 50.0,
            "reset_time": 1_748_736_000_i64
        }))
        .unwrap();
        assert!(snapshot.windows[0].resets_at.is_some());
    }

    #[test]
    fn test_unrecognizable_shape_is_explanatory_error() {
        let err = extract_usage(&json!({"status": "ok", "version": 3})).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("used_percent"));
    }

    #[test]
    fn test_zero_total_ignored() {
        assert!(extract_usage(&json!({"used": 5, "total": 0})).is_err());
    }

    #[test]
    fn test_out_of_range_percent_clamped() {
        let snapshot = extract_usage(&json!({"utilization": 250.0})).unwrap();
        assert_eq!(snapshot.windows[0].used_percent, 100.0);
    }
}
