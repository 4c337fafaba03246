//! Commands typed at the prompt, forwarded to the session controller.

use shared::domain::VaultEntryDraft;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ShowRegister,
    BackToLogin,
    Register { username: String },
    Login { username: String, code: String },
    Search { query: String },
    Add(VaultEntryDraft),
    /// Bare `add`: submit the draft the session already holds.
    SubmitDraft,
    Show,
    Help,
    Quit,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShowRegister => "show_register",
            Self::BackToLogin => "back_to_login",
            Self::Register { .. } => "register",
            Self::Login { .. } => "login",
            Self::Search { .. } => "search",
            Self::Add(_) => "add",
            Self::SubmitDraft => "submit_draft",
            Self::Show => "show",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

/// Splits off the next whitespace separated word.
fn next_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(end) => (&input[..end], input[end..].trim_start()),
        None => (input, ""),
    }
}

/// Parses one input line. Blank lines yield `Ok(None)`.
///
/// Missing arguments are passed through as empty strings so the controller's
/// own required-field checks report them.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let (verb, rest) = next_word(line);
    let command = match verb.to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "view" => match next_word(rest).0 {
            "register" => Command::ShowRegister,
            "login" => Command::BackToLogin,
            other => return Err(format!("unknown view '{other}'; use 'register' or 'login'")),
        },
        "back" => Command::BackToLogin,
        "register" => Command::Register {
            username: next_word(rest).0.to_string(),
        },
        "login" => {
            let (username, rest) = next_word(rest);
            Command::Login {
                username: username.to_string(),
                code: next_word(rest).0.to_string(),
            }
        }
        "search" => Command::Search {
            query: rest.trim_end().to_string(),
        },
        "add" if rest.trim().is_empty() => Command::SubmitDraft,
        "add" => {
            let (service, rest) = next_word(rest);
            let (service_username, secret) = next_word(rest);
            Command::Add(VaultEntryDraft::new(
                service,
                service_username,
                secret.trim_end(),
            ))
        }
        "show" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}'; type 'help'")),
    };
    Ok(Some(command))
}
