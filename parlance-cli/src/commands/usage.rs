//! Quota usage command.

use anyhow::Result;
use clap::Args;
use parlance_providers::UsageMonitor;

use super::resolve_provider;
use crate::App;

/// Arguments for the usage command.
#[derive(Args)]
pub struct UsageArgs {
    /// Provider to query (defaults to the default provider).
    pub provider: Option<String>,
}

/// Fetches and prints a provider's quota windows.
pub async fn run(app: &App, args: UsageArgs) -> Result<()> {
    let config = resolve_provider(app, args.provider.as_deref())?;
    let adapter = app.manager.adapter_for(&config.id)?;

    let monitor = UsageMonitor::new()?;
    let snapshot = monitor.refresh(adapter.snapshot()).await?;

    if let Some(account) = &snapshot.account {
        match &snapshot.plan {
            Some(plan) => println!("{} - {account} ({plan})", config.display_name),
            None => println!("{} - {account}", config.display_name),
        }
    } else {
        println!("{}", config.display_name);
    }

    if snapshot.is_empty() {
        println!("  no usage windows reported");
        return Ok(());
    }

    for window in &snapshot.windows {
        let bar = usage_bar(window.used_percent);
        let reset = window
            .resets_at
            .map(|at| format!("  resets {}", at.format("%Y-%m-%d %H:%M UTC")))
            .unwrap_or_default();
        println!(
            "  {:<14} {bar} {:>5.1}%{reset}",
            window.label, window.used_percent
        );
    }
    Ok(())
}

/// Renders a 20-cell usage bar.
fn usage_bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * 20.0).round() as usize;
    let filled = filled.min(20);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(20 - filled))
}

// ============================================================================
// Tests
// ============================================================================
