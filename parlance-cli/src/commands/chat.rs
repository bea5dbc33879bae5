//! Streaming chat command.

use std::io::Write as _;

use anyhow::{Result, anyhow, bail};
use clap::Args;
use futures_util::StreamExt;
use parlance_core::{ChatMessage, ChatRequest, RequestOptions, StreamEvent};

use super::resolve_provider;
use crate::App;

/// Arguments for the chat command.
#[derive(Args)]
pub struct ChatArgs {
    /// Provider to use (defaults to the default provider).
    #[arg(long, short)]
    pub provider: Option<String>,

    /// Model id (defaults to the provider's default model).
    #[arg(long, short)]
    pub model: Option<String>,

    /// System prompt.
    #[arg(long, short)]
    pub system: Option<String>,

    /// Sampling temperature.
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum output tokens.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// The message to send.
    #[arg(required = true)]
    pub prompt: Vec<String>,
}

/// Runs one streaming exchange, printing deltas as they arrive.
pub async fn run(app: &App, args: ChatArgs) -> Result<()> {
    let config = resolve_provider(app, args.provider.as_deref())?;
    let model = args
        .model
        .or_else(|| config.default_model.clone())
        .ok_or_else(|| anyhow!("no model given and provider '{}' has no default", config.id))?;

    let mut request = ChatRequest::new(
        vec![ChatMessage::user(args.prompt.join(" "))],
        model.clone(),
    )
    .with_options(RequestOptions {
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        timeout_secs: args.timeout,
        ..RequestOptions::default()
    });
    if let Some(system) = args.system {
        request = request.with_system_prompt(system);
    }

    let adapter = app.manager.adapter_for(&config.id)?;
    let mut events = adapter.send_message(request).await?;

    // Ctrl-C aborts the exchange; the stream then terminates with a
    // Cancelled event on its own.
    let cancel_adapter = adapter.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_adapter.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    let mut input_tokens = 0_u64;
    let mut output_tokens = 0_u64;
    let mut outcome = Ok(());

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::TextDelta(text) => {
                print!("{text}");
                stdout.flush()?;
            }
            StreamEvent::InputTokens(count) => input_tokens = count,
            StreamEvent::OutputTokens(count) => output_tokens = count,
            StreamEvent::ModelConfirmed(served) => {
                tracing::debug!(model = %served, "Backend confirmed model");
            }
            StreamEvent::Done => break,
            StreamEvent::Error(err) => {
                outcome = Err(err);
                break;
            }
        }
    }
    ctrl_c.abort();
    println!();

    match outcome {
        Ok(()) => {
            let stamp = chrono::Utc::now().timestamp_millis();
            let record = app.manager.record_exchange(
                &config.id,
                &model,
                &format!("cli-session-{stamp}"),
                &format!("cli-msg-{stamp}"),
                input_tokens,
                output_tokens,
            )?;
            eprintln!(
                "[{} in / {} out tokens · ${:.4}]",
                record.input_tokens, record.output_tokens, record.cost_usd
            );
            Ok(())
        }
        Err(err) => {
            if err.is_retryable() {
                bail!("exchange failed ({err}); safe to retry");
            }
            bail!("exchange failed: {err}");
        }
    }
}
