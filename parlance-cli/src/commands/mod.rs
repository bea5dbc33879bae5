//! CLI command implementations.

pub mod chat;
pub mod models;
pub mod providers;
pub mod usage;

use anyhow::{Result, anyhow};
use parlance_core::ProviderConfig;

use crate::App;

/// Resolves the target provider: the named one, else the default.
pub fn resolve_provider(app: &App, id: Option<&str>) -> Result<ProviderConfig> {
    match id {
        Some(id) => app
            .manager
            .get(id)
            .ok_or_else(|| anyhow!("provider '{id}' is not configured")),
        None => app
            .manager
            .default_provider()
            .ok_or_else(|| anyhow!("no providers configured; run `parlance providers add` first")),
    }
}
