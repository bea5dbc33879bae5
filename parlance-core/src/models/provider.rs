//! Provider-related types.
//!
//! This module contains types related to chat backends:
//! - [`ProviderKind`] - Enum of supported backends
//! - [`BackendFamily`] - Wire-protocol family a backend speaks
//! - [`ProviderConfig`] - Mutable provider configuration (manager-owned)
//! - [`ProviderSnapshot`] - Immutable copy handed to adapters
//! - [`ModelDescriptor`] - Per-model capabilities and pricing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Provider Kind
// ============================================================================

/// Supported chat backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Messages API
    Anthropic,
    /// OpenAI Chat Completions
    OpenAi,
    /// OpenRouter (OpenAI-compatible)
    OpenRouter,
    /// Groq (OpenAI-compatible)
    Groq,
    /// DeepSeek (OpenAI-compatible)
    DeepSeek,
    /// Mistral (OpenAI-compatible)
    Mistral,
    /// Local Ollama instance
    Ollama,
    /// User-configured endpoint
    Custom,
}

impl ProviderKind {
    /// Returns the display name for this backend.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Anthropic => "Anthropic",
            Self::OpenAi => "OpenAI",
            Self::OpenRouter => "OpenRouter",
            Self::Groq => "Groq",
            Self::DeepSeek => "DeepSeek",
            Self::Mistral => "Mistral",
            Self::Ollama => "Ollama",
            Self::Custom => "Custom",
        }
    }

    /// Returns the slug for this backend (lowercase, no spaces).
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::Groq => "groq",
            Self::DeepSeek => "deepseek",
            Self::Mistral => "mistral",
            Self::Ollama => "ollama",
            Self::Custom => "custom",
        }
    }

    /// Returns all backend kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[
            Self::Anthropic,
            Self::OpenAi,
            Self::OpenRouter,
            Self::Groq,
            Self::DeepSeek,
            Self::Mistral,
            Self::Ollama,
            Self::Custom,
        ]
    }

    /// Parses a slug back into a kind.
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.slug() == slug)
    }

    /// Returns the wire-protocol family this backend speaks.
    ///
    /// Several vendors share the OpenAI Chat Completions wire format and
    /// differ only in base URL, headers, and listing quirks; they all map
    /// onto a single adapter parameterized by the provider snapshot.
    pub fn family(&self) -> BackendFamily {
        match self {
            Self::Anthropic => BackendFamily::Anthropic,
            Self::OpenAi | Self::OpenRouter | Self::Groq | Self::DeepSeek | Self::Mistral => {
                BackendFamily::OpenAiCompatible
            }
            Self::Ollama => BackendFamily::Ollama,
            Self::Custom => BackendFamily::Custom,
        }
    }

    /// Returns the default base URL for this backend.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::DeepSeek => "https://api.deepseek.com",
            Self::Mistral => "https://api.mistral.ai/v1",
            Self::Ollama => "http://localhost:11434",
            Self::Custom => "",
        }
    }
}

/// Wire-protocol family implemented by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendFamily {
    /// Anthropic Messages API (SSE, versioned protocol header).
    Anthropic,
    /// OpenAI Chat Completions (SSE with `[DONE]` sentinel).
    OpenAiCompatible,
    /// Ollama local chat (NDJSON).
    Ollama,
    /// Entirely configuration-driven endpoint.
    Custom,
}

// ============================================================================
// Auth
// ============================================================================

/// How requests to a backend are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Vendor API key header (e.g. `x-api-key`).
    #[default]
    ApiKey,
    /// OAuth 2.0 access token.
    OAuth,
    /// `Authorization: Bearer` with a static token.
    Bearer,
    /// No authentication (local backends).
    None,
}

/// Non-secret OAuth client metadata for a provider.
///
/// Tokens themselves live in the credential store, never here.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OAuthMetadata {
    /// OAuth client identifier.
    pub client_id: String,
    /// Authorization endpoint URL.
    pub auth_url: String,
    /// Token endpoint URL.
    pub token_url: String,
    /// Requested scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
}

// ============================================================================
// Billing
// ============================================================================

/// How a provider bills usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    /// Pay per token; costs come from the pricing table.
    #[default]
    Token,
    /// Flat subscription; per-exchange cost is always zero.
    Subscription,
}

// ============================================================================
// Model Descriptor
// ============================================================================

/// Per-million-token pricing for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    /// USD per million input tokens.
    pub input_per_million: f64,
    /// USD per million output tokens.
    pub output_per_million: f64,
}

impl ModelCost {
    /// Creates a new cost pair.
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Returns true if both rates are zero.
    pub fn is_free(&self) -> bool {
        self.input_per_million == 0.0 && self.output_per_million == 0.0
    }
}

/// Describes one model offered by a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDescriptor {
    /// Model identifier as the backend knows it.
    pub id: String,
    /// Display name for UI.
    pub display_name: String,
    /// Context window size in tokens, if known.
    pub context_window: Option<u32>,
    /// Whether the model accepts image input.
    #[serde(default)]
    pub supports_vision: bool,
    /// Whether the model supports streamed responses.
    #[serde(default = "default_true")]
    pub supports_streaming: bool,
    /// Pricing override for this model, if known.
    #[serde(default)]
    pub cost: Option<ModelCost>,
}

fn default_true() -> bool {
    true
}

impl ModelDescriptor {
    /// Creates a descriptor with the id doubling as display name.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            context_window: None,
            supports_vision: false,
            supports_streaming: true,
            cost: None,
        }
    }
}

// ============================================================================
// Custom Protocol
// ============================================================================

/// Wire format used by a custom endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// Server-Sent Events.
    #[default]
    Sse,
    /// Newline-delimited JSON.
    Ndjson,
}

/// Configuration for the fully config-driven custom adapter.
///
/// JSON pointers (RFC 6901) are evaluated against each decoded record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomProtocol {
    /// Path of the chat endpoint, appended to the base URL.
    pub chat_path: String,
    /// Path of the model-listing endpoint, if one exists.
    pub models_path: Option<String>,
    /// Header carrying the credential (e.g. "Authorization").
    pub auth_header: String,
    /// Prefix prepended to the secret (e.g. "Bearer ").
    #[serde(default)]
    pub auth_prefix: String,
    /// Streaming wire format.
    #[serde(default)]
    pub format: WireFormat,
    /// Pointer to the text delta within a record.
    pub text_pointer: String,
    /// Pointer to the input-token count, if reported.
    pub input_tokens_pointer: Option<String>,
    /// Pointer to the output-token count, if reported.
    pub output_tokens_pointer: Option<String>,
    /// Pointer to a boolean that marks the terminal record.
    pub done_pointer: Option<String>,
    /// Path of a quota endpoint, decoded by the generic usage extractor.
    #[serde(default)]
    pub usage_path: Option<String>,
}

impl Default for CustomProtocol {
    fn default() -> Self {
        Self {
            chat_path: "/chat/completions".to_string(),
            models_path: Some("/models".to_string()),
            auth_header: "Authorization".to_string(),
            auth_prefix: "Bearer ".to_string(),
            format: WireFormat::Sse,
            text_pointer: "/choices/0/delta/content".to_string(),
            input_tokens_pointer: Some("/usage/prompt_tokens".to_string()),
            output_tokens_pointer: Some("/usage/completion_tokens".to_string()),
            done_pointer: None,
            usage_path: None,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Mutable configuration for one configured provider.
///
/// Owned and mutated exclusively by the provider manager. Adapters never
/// see this type; they receive a [`ProviderSnapshot`] taken at
/// construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Opaque identifier, unique within the manager.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Backend kind.
    pub kind: ProviderKind,
    /// Whether this provider is enabled.
    pub enabled: bool,
    /// Whether this provider is the default. At most one config holds this.
    #[serde(default)]
    pub is_default: bool,
    /// Sort position in provider lists.
    #[serde(default)]
    pub sort_order: u32,
    /// Base URL override; `None` uses the kind's default.
    pub base_url: Option<String>,
    /// Authentication method.
    #[serde(default)]
    pub auth: AuthMethod,
    /// Extra headers sent on every request. Keys are unique; order is
    /// irrelevant.
    #[serde(default)]
    pub custom_headers: Vec<(String, String)>,
    /// OAuth client metadata, for providers using [`AuthMethod::OAuth`].
    pub oauth: Option<OAuthMetadata>,
    /// Known models.
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
    /// Default model id for new conversations.
    pub default_model: Option<String>,
    /// Per-model cost overrides, keyed by model id.
    #[serde(default)]
    pub cost_overrides: std::collections::HashMap<String, ModelCost>,
    /// Billing mode.
    #[serde(default)]
    pub billing: BillingMode,
    /// Whether multi-key rotation is enabled for this provider.
    #[serde(default)]
    pub rotation_enabled: bool,
    /// Custom wire protocol, for [`ProviderKind::Custom`].
    pub custom: Option<CustomProtocol>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp, bumped on every update.
    pub updated_at: DateTime<Utc>,
}

impl ProviderConfig {
    /// Creates a new provider configuration with sensible defaults.
    pub fn new(id: impl Into<String>, kind: ProviderKind) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            display_name: kind.display_name().to_string(),
            kind,
            enabled: true,
            is_default: false,
            sort_order: 0,
            base_url: None,
            auth: match kind {
                ProviderKind::Ollama => AuthMethod::None,
                _ => AuthMethod::ApiKey,
            },
            custom_headers: Vec::new(),
            oauth: None,
            models: Vec::new(),
            default_model: None,
            cost_overrides: std::collections::HashMap::new(),
            billing: BillingMode::Token,
            rotation_enabled: false,
            custom: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the effective base URL for this provider.
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }

    /// Takes an immutable snapshot with the given resolved secret.
    pub fn snapshot(&self, secret: Option<String>) -> ProviderSnapshot {
        ProviderSnapshot {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            kind: self.kind,
            base_url: self.effective_base_url().trim_end_matches('/').to_string(),
            auth: self.auth,
            custom_headers: self.custom_headers.clone(),
            default_model: self.default_model.clone(),
            cost_overrides: self.cost_overrides.clone(),
            billing: self.billing,
            custom: self.custom.clone(),
            secret,
        }
    }
}

// ============================================================================
// Provider Snapshot
// ============================================================================

/// Immutable view of a provider configuration plus its resolved secret.
///
/// Produced once at adapter construction and shared across tasks via
/// `Arc`. Never mutated afterward: a configuration or credential change
/// evicts the adapter instead.
#[derive(Debug, Clone)]
pub struct ProviderSnapshot {
    /// Provider identifier.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Backend kind.
    pub kind: ProviderKind,
    /// Effective base URL with any trailing slash removed.
    pub base_url: String,
    /// Authentication method.
    pub auth: AuthMethod,
    /// Extra headers for every request.
    pub custom_headers: Vec<(String, String)>,
    /// Default model id.
    pub default_model: Option<String>,
    /// Per-model cost overrides.
    pub cost_overrides: std::collections::HashMap<String, ModelCost>,
    /// Billing mode.
    pub billing: BillingMode,
    /// Custom wire protocol, if any.
    pub custom: Option<CustomProtocol>,
    /// Resolved secret (API key or access token). `None` for no-auth
    /// backends or when the store had nothing.
    pub secret: Option<String>,
}

impl ProviderSnapshot {
    /// Returns the cost override for a model id, if configured.
    pub fn cost_override(&self, model_id: &str) -> Option<ModelCost> {
        self.cost_overrides.get(model_id).copied()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_family_mapping() {
        assert_eq!(ProviderKind::Anthropic.family(), BackendFamily::Anthropic);
        assert_eq!(ProviderKind::OpenAi.family(), BackendFamily::OpenAiCompatible);
        assert_eq!(ProviderKind::OpenRouter.family(), BackendFamily::OpenAiCompatible);
        assert_eq!(ProviderKind::Groq.family(), BackendFamily::OpenAiCompatible);
        assert_eq!(ProviderKind::DeepSeek.family(), BackendFamily::OpenAiCompatible);
        assert_eq!(ProviderKind::Mistral.family(), BackendFamily::OpenAiCompatible);
        assert_eq!(ProviderKind::Ollama.family(), BackendFamily::Ollama);
        assert_eq!(ProviderKind::Custom.family(), BackendFamily::Custom);
    }

    #[test]
    fn test_slug_round_trip() {
        for kind in ProviderKind::all() {
            assert_eq!(ProviderKind::from_slug(kind.slug()), Some(*kind));
        }
        assert_eq!(ProviderKind::from_slug("nope"), None);
    }

    #[test]
    fn test_effective_base_url() {
        let mut config = ProviderConfig::new("p1", ProviderKind::OpenAi);
        assert_eq!(config.effective_base_url(), "https://api.openai.com/v1");

        config.base_url = Some("https://proxy.internal/v1".to_string());
        assert_eq!(config.effective_base_url(), "https://proxy.internal/v1");
    }

    #[test]
    fn test_snapshot_strips_trailing_slash() {
        let mut config = ProviderConfig::new("p1", ProviderKind::OpenAi);
        config.base_url = Some("https://proxy.internal/v1/".to_string());

        let snap = config.snapshot(Some("sk-test".into()));
        assert_eq!(snap.base_url, "https://proxy.internal/v1");
        assert_eq!(snap.secret.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_ollama_defaults_to_no_auth() {
        let config = ProviderConfig::new("local", ProviderKind::Ollama);
        assert_eq!(config.auth, AuthMethod::None);
    }

    #[test]
    fn test_custom_protocol_defaults() {
        let proto = CustomProtocol::default();
        assert_eq!(proto.format, WireFormat::Sse);
        assert_eq!(proto.text_pointer, "/choices/0/delta/content");
    }
}
