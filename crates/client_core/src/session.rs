//! Session state record and the reducer that moves it between states.
//!
//! Every change to a session goes through [`SessionState::apply`]; the
//! controller only decides which event to apply and when.

use shared::domain::{AuthState, RegistrationMaterial, VaultEntry, VaultEntryDraft, ViewMode};

use crate::error::ClientError;

pub const REGISTRATION_FAILED: &str = "Registration failed";
pub const INVALID_CODE: &str = "Invalid authentication code";
pub const AUTHENTICATION_FAILED: &str = "Authentication failed";
pub const SEARCH_FAILED: &str = "Failed to fetch passwords";
pub const ADD_FAILED: &str = "Failed to add password";

pub const USERNAME_REQUIRED: &str = "Username is required";
pub const CREDENTIALS_REQUIRED: &str = "Username and code are required";
pub const DRAFT_INCOMPLETE: &str = "Service, username and password are required";
pub const NOT_SIGNED_IN: &str = "Not signed in";
pub const REGISTER_VIEW_REQUIRED: &str = "Open the registration view first";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    VerifyCode,
    SearchEntries,
    AddEntry,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::VerifyCode => "verify_code",
            Self::SearchEntries => "search_entries",
            Self::AddEntry => "add_entry",
        }
    }

    /// The message shown to the user when this operation fails.
    pub fn failure_message(self, err: &ClientError) -> String {
        match (self, err) {
            (Self::Register, _) => err.detail().unwrap_or(REGISTRATION_FAILED).to_string(),
            (Self::VerifyCode, ClientError::Rejected { .. }) => INVALID_CODE.to_string(),
            (Self::VerifyCode, ClientError::Transport(_)) => AUTHENTICATION_FAILED.to_string(),
            (Self::SearchEntries, _) => SEARCH_FAILED.to_string(),
            (Self::AddEntry, _) => ADD_FAILED.to_string(),
        }
    }
}

/// Number of requests in flight per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingOperations {
    register: u32,
    verify_code: u32,
    search_entries: u32,
    add_entry: u32,
}

impl PendingOperations {
    pub fn count(&self, operation: Operation) -> u32 {
        match operation {
            Operation::Register => self.register,
            Operation::VerifyCode => self.verify_code,
            Operation::SearchEntries => self.search_entries,
            Operation::AddEntry => self.add_entry,
        }
    }

    pub fn is_pending(&self, operation: Operation) -> bool {
        self.count(operation) > 0
    }

    pub fn any(&self) -> bool {
        self.register + self.verify_code + self.search_entries + self.add_entry > 0
    }

    fn slot_mut(&mut self, operation: Operation) -> &mut u32 {
        match operation {
            Operation::Register => &mut self.register,
            Operation::VerifyCode => &mut self.verify_code,
            Operation::SearchEntries => &mut self.search_entries,
            Operation::AddEntry => &mut self.add_entry,
        }
    }

    fn begin(&mut self, operation: Operation) {
        *self.slot_mut(operation) += 1;
    }

    fn finish(&mut self, operation: Operation) {
        let slot = self.slot_mut(operation);
        *slot = slot.saturating_sub(1);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Last username tried; fixed to the verified one once authenticated.
    pub username: Option<String>,
    pub auth: AuthState,
    pub view: ViewMode,
    pub registration: Option<RegistrationMaterial>,
    pub draft: VaultEntryDraft,
    /// Term of the most recently issued search.
    pub active_query: String,
    pub results: Vec<VaultEntry>,
    pub error: Option<String>,
    pub pending: PendingOperations,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ShowRegister,
    BackToLogin,
    DraftEdited(VaultEntryDraft),
    /// A precondition failed before any request was issued.
    Invalid(String),
    RegisterStarted { username: String },
    Registered(RegistrationMaterial),
    VerifyStarted { username: String },
    /// The backend accepted the code for `username`.
    Verified { username: String },
    SearchStarted { query: String },
    SearchCompleted(Vec<VaultEntry>),
    /// Empty search answered locally with no matches.
    SearchCleared,
    AddStarted { draft: VaultEntryDraft },
    /// The backend stored `draft`.
    EntryAdded { draft: VaultEntryDraft },
    Failed { operation: Operation, message: String },
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.auth == AuthState::Authenticated
    }

    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ShowRegister => {
                if !self.is_authenticated() {
                    self.view = ViewMode::Register;
                }
            }
            SessionEvent::BackToLogin => {
                if !self.is_authenticated() {
                    self.view = ViewMode::Login;
                    self.error = None;
                    self.registration = None;
                }
            }
            SessionEvent::DraftEdited(draft) => self.draft = draft,
            SessionEvent::Invalid(message) => self.error = Some(message),
            SessionEvent::RegisterStarted { username } => {
                self.username = Some(username);
                self.error = None;
                self.pending.begin(Operation::Register);
            }
            SessionEvent::Registered(material) => {
                self.pending.finish(Operation::Register);
                // Late responses must not resurrect enrollment material.
                if !self.is_authenticated() && self.view == ViewMode::Register {
                    self.registration = Some(material);
                    self.error = None;
                }
            }
            SessionEvent::VerifyStarted { username } => {
                self.username = Some(username);
                self.error = None;
                self.pending.begin(Operation::VerifyCode);
            }
            SessionEvent::Verified { username } => {
                self.pending.finish(Operation::VerifyCode);
                // The first accepted code binds the identity for the session.
                if !self.is_authenticated() {
                    self.username = Some(username);
                    self.auth = AuthState::Authenticated;
                    self.registration = None;
                    self.error = None;
                }
            }
            SessionEvent::SearchStarted { query } => {
                self.active_query = query;
                self.error = None;
                self.pending.begin(Operation::SearchEntries);
            }
            SessionEvent::SearchCompleted(entries) => {
                self.pending.finish(Operation::SearchEntries);
                self.results = entries;
                self.error = None;
            }
            SessionEvent::SearchCleared => {
                self.active_query.clear();
                self.results.clear();
                self.error = None;
            }
            SessionEvent::AddStarted { draft } => {
                self.draft = draft;
                self.error = None;
                self.pending.begin(Operation::AddEntry);
            }
            SessionEvent::EntryAdded { draft } => {
                self.pending.finish(Operation::AddEntry);
                // Edits made while the request was in flight are kept.
                if self.draft == draft {
                    self.draft = VaultEntryDraft::default();
                }
                self.error = None;
            }
            SessionEvent::Failed { operation, message } => {
                self.pending.finish(operation);
                let stale_sign_in = self.is_authenticated()
                    && matches!(operation, Operation::Register | Operation::VerifyCode);
                if !stale_sign_in {
                    self.error = Some(message);
                }
            }
        }
    }
}

/// A transition as seen by subscribers: the event and the state it produced.
#[derive(Debug, Clone)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub state: SessionState,
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
