//! Model listing command.

use anyhow::Result;
use clap::Args;

use super::resolve_provider;
use crate::App;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    /// Provider to query (defaults to the default provider).
    pub provider: Option<String>,
}

/// Lists the models a provider currently offers.
pub async fn run(app: &App, args: ModelsArgs) -> Result<()> {
    let config = resolve_provider(app, args.provider.as_deref())?;
    let adapter = app.manager.adapter_for(&config.id)?;
    let models = adapter.fetch_models().await?;

    if models.is_empty() {
        println!("{} offers no models", config.display_name);
        return Ok(());
    }

    for model in models {
        let mut notes = Vec::new();
        if let Some(window) = model.context_window {
            notes.push(format!("{window} ctx"));
        }
        if model.supports_vision {
            notes.push("vision".to_string());
        }
        if let Some(cost) = model.cost {
            if cost.is_free() {
                notes.push("free".to_string());
            } else {
                notes.push(format!(
                    "${}/{} per M",
                    cost.input_per_million, cost.output_per_million
                ));
            }
        }

        let default_marker = if config.default_model.as_deref() == Some(model.id.as_str()) {
            "*"
        } else {
            " "
        };

        if notes.is_empty() {
            println!("{default_marker} {}", model.id);
        } else {
            println!("{default_marker} {}  ({})", model.id, notes.join(", "));
        }
    }
    Ok(())
}
