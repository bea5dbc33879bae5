//! Usage-related types.
//!
//! This module contains types for quota display and per-exchange
//! accounting:
//! - [`UsageWindow`] - one time-bounded quota window
//! - [`UsageSnapshot`] - container for a provider's windows
//! - [`UsageRecord`] - append-only record of one completed exchange

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Usage Window
// ============================================================================

/// A named, time-bounded usage allowance with a used percentage.
///
/// Derived from a provider's quota API; read-only and refreshed on a
/// timer, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageWindow {
    /// Window label (e.g. "5 hours", "Week", "Credits").
    pub label: String,
    /// Percentage of quota used (0-100).
    pub used_percent: f64,
    /// When this window resets, if known.
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageWindow {
    /// Creates a window with the given label and percentage, clamped.
    pub fn new(label: impl Into<String>, used_percent: f64) -> Self {
        let mut window = Self {
            label: label.into(),
            used_percent,
            resets_at: None,
        };
        window.sanitize();
        window
    }

    /// Returns the remaining percentage (100 - used).
    pub fn remaining_percent(&self) -> f64 {
        (100.0 - self.used_percent).max(0.0)
    }

    /// Returns true if usage is approaching the limit (>80%).
    pub fn is_approaching_limit(&self) -> bool {
        self.used_percent > 80.0
    }

    /// Returns true if the window is exhausted.
    pub fn is_over_limit(&self) -> bool {
        self.used_percent >= 100.0
    }

    /// Returns time until reset, if known.
    pub fn time_until_reset(&self) -> Option<Duration> {
        self.resets_at.map(|reset| reset - Utc::now())
    }

    /// Clamps `used_percent` to [0, 100] and zeroes non-finite values.
    ///
    /// Quota APIs occasionally report values outside the valid range;
    /// display code relies on the invariant holding.
    pub fn sanitize(&mut self) {
        if !self.used_percent.is_finite() {
            self.used_percent = 0.0;
        }
        self.used_percent = self.used_percent.clamp(0.0, 100.0);
    }
}

// ============================================================================
// Usage Snapshot
// ============================================================================

/// The latest quota state known for one provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UsageSnapshot {
    /// All windows reported by the provider, in reporting order.
    pub windows: Vec<UsageWindow>,
    /// Plan or subscription label, if the quota API reports one.
    pub plan: Option<String>,
    /// Account label (email or organization), if reported.
    pub account: Option<String>,
    /// When this snapshot was fetched.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl UsageSnapshot {
    /// Creates a snapshot from windows, stamped now.
    pub fn with_windows(windows: Vec<UsageWindow>) -> Self {
        Self {
            windows,
            plan: None,
            account: None,
            fetched_at: Some(Utc::now()),
        }
    }

    /// Returns true if no window data is present.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Returns the highest used percentage across all windows.
    pub fn max_used_percent(&self) -> f64 {
        self.windows
            .iter()
            .map(|w| w.used_percent)
            .fold(0.0, f64::max)
    }

    /// Returns true if this snapshot is older than the threshold.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        match self.fetched_at {
            Some(at) => Utc::now() - at > threshold,
            None => true,
        }
    }

    /// Clamps every window to the valid range.
    pub fn sanitize(&mut self) {
        for window in &mut self.windows {
            window.sanitize();
        }
    }
}

// ============================================================================
// Usage Record
// ============================================================================

/// Append-only record of one completed exchange.
///
/// Created once per completed `send_message` call; the conversation layer
/// persists these. `cost_usd` is non-negative by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageRecord {
    /// Provider the exchange ran against.
    pub provider_id: String,
    /// Model that served the exchange.
    pub model_id: String,
    /// Conversation the exchange belongs to (caller-opaque).
    pub conversation_id: String,
    /// Message produced by the exchange (caller-opaque).
    pub message_id: String,
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens produced.
    pub output_tokens: u64,
    /// Cost in USD.
    pub cost_usd: f64,
    /// When the exchange completed.
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    /// Creates a record stamped now, forcing cost to be non-negative.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider_id: impl Into<String>,
        model_id: impl Into<String>,
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
            input_tokens,
            output_tokens,
            cost_usd: cost_usd.max(0.0),
            timestamp: Utc::now(),
        }
    }

    /// Total tokens in the exchange.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_clamps_on_construction() {
        assert_eq!(UsageWindow::new("5 hours", 150.0).used_percent, 100.0);
        assert_eq!(UsageWindow::new("5 hours", -3.0).used_percent, 0.0);
        assert_eq!(UsageWindow::new("5 hours", f64::NAN).used_percent, 0.0);
        assert_eq!(UsageWindow::new("5 hours", 42.5).used_percent, 42.5);
    }

    #[test]
    fn test_window_thresholds() {
        let window = UsageWindow::new("Week", 85.0);
        assert!(window.is_approaching_limit());
        assert!(!window.is_over_limit());
        assert_eq!(window.remaining_percent(), 15.0);

        assert!(UsageWindow::new("Week", 100.0).is_over_limit());
    }

    #[test]
    fn test_snapshot_max_percent() {
        let snapshot = UsageSnapshot::with_windows(vec![
            UsageWindow::new("5 hours", 20.0),
            UsageWindow::new("Week", 64.0),
        ]);
        assert_eq!(snapshot.max_used_percent(), 64.0);
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_snapshot_staleness() {
        let mut snapshot = UsageSnapshot::with_windows(vec![]);
        assert!(!snapshot.is_stale(Duration::minutes(5)));

        snapshot.fetched_at = Some(Utc::now() - Duration::minutes(10));
        assert!(snapshot.is_stale(Duration::minutes(5)));

        snapshot.fetched_at = None;
        assert!(snapshot.is_stale(Duration::minutes(5)));
    }

    #[test]
    fn test_record_forces_nonnegative_cost() {
        let record = UsageRecord::new("p1", "m1", "c1", "msg1", 100, 50, -0.5);
        assert_eq!(record.cost_usd, 0.0);
        assert_eq!(record.total_tokens(), 150);
    }
}
