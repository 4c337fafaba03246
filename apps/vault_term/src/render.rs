//! Plain-text rendering of session state.

use std::fmt::Write as _;

use client_core::{session::Operation, SessionChange, SessionEvent, SessionState};
use shared::domain::{AuthState, RegistrationMaterial, VaultEntry, ViewMode};

pub const HELP: &str = "\
commands:
  view register | view login    switch the unauthenticated form
  register <username>           enroll and receive a TOTP secret
  login <username> <code>       verify an authenticator code
  search <term>                 search your vault by service name
  add <service> <user> <secret> store a new entry
  add                           resubmit the entry kept after a failed add
  show                          print the current session state
  help                          this text
  quit                          leave";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn render_entry(entry: &VaultEntry) -> String {
    let rotated = match entry.last_rotated_at() {
        Some(at) => at.format(TIMESTAMP_FORMAT).to_string(),
        None => entry
            .last_rotated
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
    };
    format!(
        "  service: {}\n  username: {}\n  password: {}\n  last rotated: {}",
        entry.service, entry.username, entry.password, rotated
    )
}

pub fn render_results(entries: &[VaultEntry]) -> String {
    if entries.is_empty() {
        return "no results".to_string();
    }
    let mut out = format!("results ({}):", entries.len());
    for entry in entries {
        let _ = write!(out, "\n{}\n", render_entry(entry));
    }
    out.trim_end().to_string()
}

pub fn render_registration(material: &RegistrationMaterial) -> String {
    let qr = match material.qr_png_bytes() {
        Ok(png) => format!(
            "QR code ({} byte PNG), open in a browser to scan:\n  {}",
            png.len(),
            material.qr_data_uri()
        ),
        Err(err) => format!("QR code unavailable: {err}"),
    };
    format!(
        "scan the QR code with your authenticator app\n{qr}\nsecret key (if needed): {}",
        material.shared_secret
    )
}

pub fn render_state(state: &SessionState) -> String {
    let mut out = String::from("== Password Manager ==\n");
    match state.auth {
        AuthState::Authenticated => {
            let _ = writeln!(
                out,
                "signed in as {}",
                state.username.as_deref().unwrap_or("?")
            );
            if !state.active_query.is_empty() {
                let _ = writeln!(out, "search: {}", state.active_query);
            }
            let _ = writeln!(out, "{}", render_results(&state.results));
            if !state.draft.is_empty() {
                let _ = writeln!(
                    out,
                    "unsaved entry: {} / {}",
                    state.draft.service, state.draft.service_username
                );
            }
        }
        AuthState::Unauthenticated => match state.view {
            ViewMode::Login => out.push_str("login: enter your username and authenticator code\n"),
            ViewMode::Register => {
                out.push_str("register: choose a username\n");
                if let Some(material) = &state.registration {
                    let _ = writeln!(out, "{}", render_registration(material));
                }
            }
        },
    }

    let busy = [
        Operation::Register,
        Operation::VerifyCode,
        Operation::SearchEntries,
        Operation::AddEntry,
    ]
    .into_iter()
    .filter(|op| state.pending.is_pending(*op))
    .map(Operation::as_str)
    .collect::<Vec<_>>();
    if !busy.is_empty() {
        let _ = writeln!(out, "pending: {}", busy.join(", "));
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "error: {error}");
    }
    out.trim_end().to_string()
}

/// One line (or block) describing what just happened, or `None` when the
/// change is not worth printing on its own.
pub fn describe_change(change: &SessionChange) -> Option<String> {
    let state = &change.state;
    match &change.event {
        SessionEvent::ShowRegister => Some("register: choose a username".into()),
        SessionEvent::BackToLogin => Some("login: enter your username and code".into()),
        SessionEvent::RegisterStarted { username } => Some(format!("registering {username}...")),
        SessionEvent::Registered(_) => state.registration.as_ref().map(render_registration),
        SessionEvent::VerifyStarted { .. } => Some("verifying code...".into()),
        SessionEvent::Verified { .. } => Some(format!(
            "signed in as {}",
            state.username.as_deref().unwrap_or("?")
        )),
        SessionEvent::SearchStarted { query } => Some(format!("searching for '{query}'...")),
        SessionEvent::SearchCompleted(_) | SessionEvent::SearchCleared => {
            Some(render_results(&state.results))
        }
        SessionEvent::AddStarted { draft } => Some(format!("saving {}...", draft.service)),
        SessionEvent::EntryAdded { draft } => Some(format!("saved {}", draft.service)),
        SessionEvent::Invalid(message) | SessionEvent::Failed { message, .. } => {
            Some(format!("error: {message}"))
        }
        SessionEvent::DraftEdited(_) => None,
    }
}
