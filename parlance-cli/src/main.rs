// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Parlance CLI - chat with any configured AI backend.
//!
//! # Examples
//!
//! ```bash
//! # Add providers
//! parlance providers add work anthropic
//! parlance providers set-key work
//! parlance providers set-default work
//!
//! # Chat (streams to stdout, Ctrl-C cancels)
//! parlance chat "explain borrowing in one paragraph"
//! parlance chat --provider local --model llama3.2 "hello"
//!
//! # Inspect
//! parlance providers list
//! parlance models work
//! parlance usage work
//! parlance validate work
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use parlance_providers::ProviderManager;
use parlance_store::{KeychainStore, ProviderConfigStore};

use commands::{chat, models, providers, usage};

// ============================================================================
// CLI Definition
// ============================================================================

/// Parlance CLI - multi-provider AI chat.
#[derive(Parser)]
#[command(name = "parlance")]
#[command(about = "Chat with any configured AI backend from the command line")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (show debug logs).
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Send a message and stream the reply.
    #[command(visible_alias = "c")]
    Chat(chat::ChatArgs),
    /// List the models a provider offers.
    #[command(visible_alias = "m")]
    Models(models::ModelsArgs),
    /// Manage configured providers.
    #[command(subcommand, visible_alias = "p")]
    Providers(providers::ProvidersCommand),
    /// Show quota usage for a provider.
    #[command(visible_alias = "u")]
    Usage(usage::UsageArgs),
    /// Check whether a provider's stored credential works.
    Validate(providers::ValidateArgs),
}

// ============================================================================
// Entry Point
// ============================================================================

/// Shared handles every command receives.
pub struct App {
    pub manager: ProviderManager,
    pub config_store: ProviderConfigStore,
}

impl App {
    fn load() -> Result<Self> {
        let config_store = ProviderConfigStore::at_default_location()?;
        let providers = config_store.load()?;
        let manager = ProviderManager::with_providers(Arc::new(KeychainStore::new()), providers)?;
        Ok(Self {
            manager,
            config_store,
        })
    }

    /// Persists the manager's provider list back to disk.
    pub fn save(&self) -> Result<()> {
        self.config_store.save(&self.manager.providers())?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let app = App::load()?;

    match cli.command {
        Commands::Chat(args) => chat::run(&app, args).await,
        Commands::Models(args) => models::run(&app, args).await,
        Commands::Providers(command) => providers::run(&app, command).await,
        Commands::Usage(args) => usage::run(&app, args).await,
        Commands::Validate(args) => providers::validate(&app, args).await,
    }
}
