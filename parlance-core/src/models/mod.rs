//! Domain models for Parlance.

pub mod chat;
pub mod cost;
pub mod provider;
pub mod usage;

pub use chat::{AttachmentPayload, ChatMessage, ChatRequest, RequestOptions, Role, StreamEvent};
pub use provider::{
    AuthMethod, BackendFamily, BillingMode, CustomProtocol, ModelCost, ModelDescriptor,
    OAuthMetadata, ProviderConfig, ProviderKind, ProviderSnapshot, WireFormat,
};
pub use usage::{UsageRecord, UsageSnapshot, UsageWindow};
