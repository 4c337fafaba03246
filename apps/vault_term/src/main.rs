use std::{io::IsTerminal, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    config::{load_settings_from, API_URL_ENV, SETTINGS_FILE},
    SessionController,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tokio_stream::wrappers::LinesStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod render;
mod shell;

#[derive(Parser, Debug)]
#[command(about = "Terminal front end for the TOTP password vault")]
struct Args {
    /// Vault backend base URL; overrides the settings file and VAULT_API_URL.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long, default_value = SETTINGS_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings_from(&args.config, std::env::var(API_URL_ENV).ok())
        .context("failed to load client settings")?;
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    let controller = Arc::new(
        SessionController::from_settings(&settings).context("failed to start vault session")?,
    );

    let mut changes = controller.subscribe();
    let render = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    if let Some(text) = render::describe_change(&change) {
                        println!("{text}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "render: fell behind session updates");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("{}", render::render_state(&controller.snapshot().await));
    println!("type 'help' for commands");

    let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    shell::run(&controller, lines, std::io::stdin().is_terminal()).await?;

    // Dropping the last controller closes the change channel, which lets the
    // render task print what is left and stop.
    drop(controller);
    render.await.context("render task failed")?;

    Ok(())
}
