//! Provider management commands.

use anyhow::{Result, anyhow, bail};
use clap::{Args, Subcommand};
use parlance_core::{ProviderConfig, ProviderKind};

use super::resolve_provider;
use crate::App;

/// Provider management subcommands.
#[derive(Subcommand)]
pub enum ProvidersCommand {
    /// List configured providers.
    #[command(visible_alias = "ls")]
    List,
    /// Add a provider.
    Add(AddArgs),
    /// Remove a provider and its stored secrets.
    #[command(visible_alias = "rm")]
    Remove(RemoveArgs),
    /// Make a provider the default.
    SetDefault(SetDefaultArgs),
    /// Store a provider's API key in the system keychain.
    SetKey(SetKeyArgs),
}

/// Arguments for adding a provider.
#[derive(Args)]
pub struct AddArgs {
    /// Identifier for the new provider (e.g. "work").
    pub id: String,
    /// Backend kind: anthropic, openai, openrouter, groq, deepseek,
    /// mistral, ollama, or custom.
    pub kind: String,
    /// Base URL override.
    #[arg(long)]
    pub base_url: Option<String>,
    /// Default model id.
    #[arg(long)]
    pub model: Option<String>,
    /// Make this the default provider.
    #[arg(long)]
    pub default: bool,
}

/// Arguments naming an existing provider.
#[derive(Args)]
pub struct RemoveArgs {
    /// Provider to remove.
    pub id: String,
}

/// Arguments for set-default.
#[derive(Args)]
pub struct SetDefaultArgs {
    /// Provider to make default.
    pub id: String,
}

/// Arguments for set-key.
#[derive(Args)]
pub struct SetKeyArgs {
    /// Provider to store a key for.
    pub id: String,
}

/// Arguments for validate.
#[derive(Args)]
pub struct ValidateArgs {
    /// Provider to validate (defaults to the default provider).
    pub provider: Option<String>,
}

/// Dispatches a provider management subcommand.
pub async fn run(app: &App, command: ProvidersCommand) -> Result<()> {
    match command {
        ProvidersCommand::List => list(app),
        ProvidersCommand::Add(args) => add(app, args),
        ProvidersCommand::Remove(args) => remove(app, args),
        ProvidersCommand::SetDefault(args) => set_default(app, args),
        ProvidersCommand::SetKey(args) => set_key(app, args),
    }
}

fn list(app: &App) -> Result<()> {
    let providers = app.manager.providers();
    if providers.is_empty() {
        println!("No providers configured. Add one with `parlance providers add <id> <kind>`.");
        return Ok(());
    }

    let default_id = app.manager.default_provider().map(|p| p.id);
    for provider in providers {
        let marker = if default_id.as_deref() == Some(provider.id.as_str()) {
            "*"
        } else {
            " "
        };
        let enabled = if provider.enabled { "" } else { " (disabled)" };
        println!(
            "{marker} {}  [{}]{enabled}  {}",
            provider.id,
            provider.kind.slug(),
            provider.effective_base_url(),
        );
    }
    Ok(())
}

fn add(app: &App, args: AddArgs) -> Result<()> {
    let kind = ProviderKind::from_slug(&args.kind)
        .ok_or_else(|| anyhow!("unknown backend kind '{}'", args.kind))?;

    let mut config = ProviderConfig::new(args.id.clone(), kind);
    config.base_url = args.base_url;
    config.default_model = args.model;
    config.is_default = args.default;
    if kind == ProviderKind::Custom {
        config.custom = Some(parlance_core::CustomProtocol::default());
    }

    app.manager.add_provider(config)?;
    app.save()?;
    println!("Added provider '{}'", args.id);
    Ok(())
}

fn remove(app: &App, args: RemoveArgs) -> Result<()> {
    if app.manager.get(&args.id).is_none() {
        bail!("provider '{}' is not configured", args.id);
    }
    app.manager.remove_provider(&args.id)?;
    app.save()?;
    println!("Removed provider '{}' and its stored secrets", args.id);
    Ok(())
}

fn set_default(app: &App, args: SetDefaultArgs) -> Result<()> {
    app.manager.set_default(&args.id)?;
    app.save()?;
    println!("'{}' is now the default provider", args.id);
    Ok(())
}

fn set_key(app: &App, args: SetKeyArgs) -> Result<()> {
    if app.manager.get(&args.id).is_none() {
        bail!("provider '{}' is not configured", args.id);
    }

    let key = prompt_line(&format!("API key for '{}': ", args.id))?;
    if key.trim().is_empty() {
        bail!("empty key, nothing stored");
    }

    app.manager.set_secret(&args.id, key.trim())?;
    println!("Key stored in the system keychain");
    Ok(())
}

/// Reads a key from stdin so it never lands in shell history.
///
/// Plain line read; the terminal still echoes. Piping the key in works
/// for scripts: `echo "$KEY" | parlance providers set-key work`.
fn prompt_line(prompt: &str) -> Result<String> {
    use std::io::{BufRead, Write};

    print!("{prompt}");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Checks whether a provider's stored credential is accepted.
pub async fn validate(app: &App, args: ValidateArgs) -> Result<()> {
    let config = resolve_provider(app, args.provider.as_deref())?;
    let adapter = app.manager.adapter_for(&config.id)?;

    if adapter.validate_credentials().await? {
        println!("Credential for '{}' is valid", config.id);
        Ok(())
    } else {
        bail!("credential for '{}' was rejected (401)", config.id);
    }
}
