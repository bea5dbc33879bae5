// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Parlance Core
//!
//! Core types, models, and traits for the Parlance chat core.
//!
//! This crate provides the foundational abstractions used across all other
//! Parlance crates, including:
//!
//! - Domain models (providers, chat exchanges, usage data)
//! - The unified stream event model
//! - Token cost calculation
//! - Error types
//! - The credential store seam
//!
//! ## Key Types
//!
//! ### Provider Types
//! - [`ProviderKind`] - Enum of supported backends
//! - [`BackendFamily`] - Wire-protocol family dispatch
//! - [`ProviderConfig`] - Mutable configuration, owned by the manager
//! - [`ProviderSnapshot`] - Immutable copy adapters operate on
//! - [`ModelDescriptor`] - Model capabilities and pricing
//!
//! ### Chat Types
//! - [`ChatRequest`] / [`ChatMessage`] / [`AttachmentPayload`]
//! - [`StreamEvent`] - the event model every backend maps into
//!
//! ### Usage Types
//! - [`UsageWindow`] / [`UsageSnapshot`] - quota display
//! - [`UsageRecord`] - per-exchange accounting
//!
//! ### Cost
//! - [`models::cost`] - pricing table with tier fallback

pub mod error;
pub mod keys;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::{ProviderError, StoreError};

// Re-export all model types
pub use models::{
    // Chat types
    AttachmentPayload,
    ChatMessage,
    ChatRequest,
    RequestOptions,
    Role,
    StreamEvent,
    // Provider types
    AuthMethod,
    BackendFamily,
    BillingMode,
    CustomProtocol,
    ModelCost,
    ModelDescriptor,
    OAuthMetadata,
    ProviderConfig,
    ProviderKind,
    ProviderSnapshot,
    WireFormat,
    // Usage types
    UsageRecord,
    UsageSnapshot,
    UsageWindow,
};

// Re-export traits
pub use traits::CredentialStore;
