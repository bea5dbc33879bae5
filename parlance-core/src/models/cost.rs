//! Token cost calculation.
//!
//! A pure mapping from (model id, token counts) to USD. Lookup order:
//! exact match against the static pricing table, then a caller-supplied
//! per-model override, then a substring tier fallback, then zero (local
//! and unknown models cost nothing). Subscription-billed providers are
//! forced to zero regardless of token counts.

use super::provider::{BillingMode, ModelCost};

// ============================================================================
// Pricing Table
// ============================================================================

/// Static pricing table, USD per million tokens (input, output).
///
/// Exact model-id matches take precedence over everything else.
const PRICING: &[(&str, ModelCost)] = &[
    // Anthropic
    ("claude-opus-4-1", ModelCost::new(15.0, 75.0)),
    ("claude-opus-4-0", ModelCost::new(15.0, 75.0)),
    ("claude-sonnet-4-5", ModelCost::new(3.0, 15.0)),
    ("claude-sonnet-4-0", ModelCost::new(3.0, 15.0)),
    ("claude-3-7-sonnet-latest", ModelCost::new(3.0, 15.0)),
    ("claude-haiku-4-5", ModelCost::new(1.0, 5.0)),
    ("claude-3-5-haiku-latest", ModelCost::new(0.8, 4.0)),
    // OpenAI
    ("gpt-4o", ModelCost::new(2.5, 10.0)),
    ("gpt-4o-mini", ModelCost::new(0.15, 0.6)),
    ("gpt-4.1", ModelCost::new(2.0, 8.0)),
    ("gpt-4.1-mini", ModelCost::new(0.4, 1.6)),
    ("gpt-4.1-nano", ModelCost::new(0.1, 0.4)),
    ("o3", ModelCost::new(2.0, 8.0)),
    ("o4-mini", ModelCost::new(1.1, 4.4)),
    // DeepSeek
    ("deepseek-chat", ModelCost::new(0.27, 1.1)),
    ("deepseek-reasoner", ModelCost::new(0.55, 2.19)),
    // Mistral
    ("mistral-large-latest", ModelCost::new(2.0, 6.0)),
    ("mistral-small-latest", ModelCost::new(0.1, 0.3)),
    // Groq-hosted
    ("llama-3.3-70b-versatile", ModelCost::new(0.59, 0.79)),
    ("llama-3.1-8b-instant", ModelCost::new(0.05, 0.08)),
];

/// Substring tier fallback, checked in order.
///
/// More specific substrings must precede their prefixes (gpt-4o-mini
/// before gpt-4o), so a dated or vendor-prefixed id still lands on the
/// right tier.
const TIER_PATTERNS: &[(&str, ModelCost)] = &[
    ("opus", ModelCost::new(15.0, 75.0)),
    ("sonnet", ModelCost::new(3.0, 15.0)),
    ("haiku", ModelCost::new(0.8, 4.0)),
    ("gpt-4o-mini", ModelCost::new(0.15, 0.6)),
    ("gpt-4o", ModelCost::new(2.5, 10.0)),
    ("gpt-4.1-mini", ModelCost::new(0.4, 1.6)),
    ("gpt-4.1", ModelCost::new(2.0, 8.0)),
    ("deepseek", ModelCost::new(0.27, 1.1)),
];

// ============================================================================
// Lookup
// ============================================================================

/// Resolves the effective pricing for a model id.
///
/// Returns `None` when neither the table, the override, nor the tier
/// patterns match; such models are free.
pub fn resolve_pricing(model_id: &str, override_cost: Option<ModelCost>) -> Option<ModelCost> {
    if let Some((_, cost)) = PRICING.iter().find(|(id, _)| *id == model_id) {
        return Some(*cost);
    }

    if let Some(cost) = override_cost {
        return Some(cost);
    }

    TIER_PATTERNS
        .iter()
        .find(|(pattern, _)| model_id.contains(pattern))
        .map(|(_, cost)| *cost)
}

/// Computes the USD cost of one exchange.
pub fn cost(model_id: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    cost_with_override(model_id, input_tokens, output_tokens, None)
}

/// Computes the USD cost of one exchange, honoring a per-model override.
pub fn cost_with_override(
    model_id: &str,
    input_tokens: u64,
    output_tokens: u64,
    override_cost: Option<ModelCost>,
) -> f64 {
    let Some(pricing) = resolve_pricing(model_id, override_cost) else {
        return 0.0;
    };

    let cost = input_tokens as f64 * (pricing.input_per_million / 1_000_000.0)
        + output_tokens as f64 * (pricing.output_per_million / 1_000_000.0);
    cost.max(0.0)
}

/// Computes the cost of one exchange under a provider's billing mode.
///
/// Subscription billing zeroes the cost no matter what the model would
/// have charged per token; the flag lives on the provider, not the model.
pub fn exchange_cost(
    billing: BillingMode,
    model_id: &str,
    input_tokens: u64,
    output_tokens: u64,
    override_cost: Option<ModelCost>,
) -> f64 {
    match billing {
        BillingMode::Subscription => 0.0,
        BillingMode::Token => {
            cost_with_override(model_id, input_tokens, output_tokens, override_cost)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
