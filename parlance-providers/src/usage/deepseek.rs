//! DeepSeek balance endpoint parsing.
//!
//! ```text
//! GET https://api.deepseek.com/user/balance
//! Authorization: Bearer <api_key>
//! ```
//!
//! ```json
//! {"is_available": true,
//!  "balance_infos": [{"currency": "USD", "total_balance": "8.40",
//!                     "granted_balance": "10.00", "topped_up_balance": "0.00"}]}
//! ```
//!
//! Balances are credit-style: used percentage is derived from remaining
//! versus granted-plus-topped-up, when those are reported. Amounts arrive
//! as strings.

use parlance_core::{ProviderError, UsageSnapshot, UsageWindow};
use serde::Deserialize;

/// Balance endpoint path on the DeepSeek API host.
pub const BALANCE_ENDPOINT: &str = "/user/balance";

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(default)]
    balance_infos: Vec<BalanceInfo>,
}

#[derive(Debug, Deserialize)]
struct BalanceInfo {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    total_balance: Option<String>,
    #[serde(default)]
    granted_balance: Option<String>,
    #[serde(default)]
    topped_up_balance: Option<String>,
}

fn amount(raw: &Option<String>) -> Option<f64> {
    raw.as_deref()?.parse().ok()
}

// ============================================================================
// Parser
// ============================================================================

/// Parses the balance body into a snapshot.
pub fn parse_usage(body: &str) -> Result<UsageSnapshot, ProviderError> {
    let response: BalanceResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("balance body: {e}")))?;

    let mut windows = Vec::new();
    for info in &response.balance_infos {
        let Some(remaining) = amount(&info.total_balance) else {
            continue;
        };
        let granted = amount(&info.granted_balance).unwrap_or(0.0);
        let topped_up = amount(&info.topped_up_balance).unwrap_or(0.0);
        let total = granted + topped_up;
        if total <= 0.0 {
            continue;
        }

        let used = ((total - remaining) / total * 100.0).clamp(0.0, 100.0);
        let label = match &info.currency {
            Some(currency) => format!("Balance ({currency})"),
            None => "Balance".to_string(),
        };
        windows.push(UsageWindow::new(label, used));
    }

    Ok(UsageSnapshot::with_windows(windows))
}

// ============================================================================
// Tests
// ============================================================================
