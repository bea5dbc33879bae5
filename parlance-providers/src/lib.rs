// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Parlance Providers
//!
//! Backend adapter implementations for Parlance.
//!
//! This crate contains the concrete integrations for each supported
//! backend family, plus the manager that owns configurations and builds
//! adapters from them:
//!
//! - **Adapters**: one [`ChatAdapter`] implementation per wire family
//! - **Manager**: registry, factory, and adapter cache
//! - **Usage**: quota endpoint parsers and the polling monitor
//! - **Rotation**: least-used key selection over the credential store
//!
//! ## Supported Backend Families
//!
//! | Family | Streaming | Auth | Serves |
//! |--------|-----------|------|--------|
//! | Anthropic | SSE (named events) | `x-api-key` | Anthropic |
//! | OpenAI-compatible | SSE (`[DONE]` sentinel) | Bearer | OpenAI, OpenRouter, Groq, DeepSeek, Mistral |
//! | Ollama | NDJSON | none | local Ollama |
//! | Custom | SSE or NDJSON | configured | anything else |
//!
//! ## Usage
//!
//! ```ignore
//! use parlance_providers::ProviderManager;
//! use parlance_core::{ChatMessage, ChatRequest, ProviderConfig, ProviderKind};
//!
//! let manager = ProviderManager::new(store)?;
//! manager.add_provider(ProviderConfig::new("work", ProviderKind::Anthropic))?;
//!
//! let adapter = manager.adapter_for("work")?;
//! let request = ChatRequest::new(vec![ChatMessage::user("hello")], "claude-sonnet-4-5");
//! let mut events = adapter.send_message(request).await?;
//! while let Some(event) = events.next().await { /* ... */ }
//! ```

pub mod adapter;
pub mod manager;
pub mod rotation;
pub mod usage;

// Backend family modules
pub mod anthropic;
pub mod custom;
pub mod ollama;
pub mod openai;

// Re-export key types
pub use adapter::{CancelState, ChatAdapter, EventStream};
pub use manager::ProviderManager;
pub use rotation::{ApiKeyEntry, KeyRotation};
pub use usage::{DEFAULT_REFRESH_INTERVAL, UsageMonitor};

// Re-export adapter types
pub use anthropic::AnthropicAdapter;
pub use custom::CustomAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiCompatAdapter;

#[cfg(test)]
mod edge_tests;
