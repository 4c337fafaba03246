//! The prompt loop: reads command lines and drives the session controller.

use std::{io, sync::Arc};

use anyhow::{Context, Result};
use client_core::SessionController;
use tokio::task::{JoinError, JoinSet};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::{
    commands::{self, Command},
    render,
};

async fn run_command(controller: &SessionController, command: Command) {
    match command {
        Command::ShowRegister => controller.show_register().await,
        Command::BackToLogin => controller.back_to_login().await,
        Command::Register { username } => controller.register(&username).await,
        Command::Login { username, code } => controller.verify_code(&username, &code).await,
        Command::Search { query } => controller.search_entries(&query).await,
        Command::Add(draft) => {
            controller.edit_draft(draft.clone()).await;
            controller.add_entry(draft).await;
        }
        Command::SubmitDraft => controller.submit_draft().await,
        Command::Show | Command::Help | Command::Quit => {}
    }
}

fn log_join_failure(done: Result<(), JoinError>) {
    if let Err(err) = done {
        warn!(error = %err, "prompt command task failed");
    }
}

/// Runs commands until the input ends or `quit`, then waits for every
/// command still in flight.
///
/// With `interactive` set each command runs detached so a slow backend never
/// blocks the prompt; otherwise commands run one after another in input order.
pub async fn run<S>(
    controller: &Arc<SessionController>,
    mut lines: S,
    interactive: bool,
) -> Result<()>
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    let mut in_flight = JoinSet::new();

    while let Some(line) = lines.next().await {
        let line = line.context("failed to read input")?;
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", render::HELP),
            Command::Show => println!("{}", render::render_state(&controller.snapshot().await)),
            command if interactive => {
                debug!(command = command.name(), "queued prompt command");
                let controller = Arc::clone(controller);
                in_flight.spawn(async move { run_command(&controller, command).await });
                while let Some(done) = in_flight.try_join_next() {
                    log_join_failure(done);
                }
            }
            command => {
                debug!(command = command.name(), "running piped command");
                run_command(controller, command).await;
            }
        }
    }

    if !in_flight.is_empty() {
        debug!(remaining = in_flight.len(), "waiting for in-flight commands");
    }
    while let Some(done) = in_flight.join_next().await {
        log_join_failure(done);
    }
    Ok(())
}
