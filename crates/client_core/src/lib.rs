use std::sync::Arc;

use shared::{
    domain::{VaultEntryDraft, ViewMode},
    protocol::AddEntryRequest,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod api;
pub mod config;
pub mod error;
pub mod session;

pub use api::{HttpVaultApi, VaultApi};
pub use config::{ClientSettings, EmptyQueryPolicy, SettingsError};
pub use error::ClientError;
pub use session::{Operation, SessionChange, SessionEvent, SessionState};

use session::{
    CREDENTIALS_REQUIRED, DRAFT_INCOMPLETE, NOT_SIGNED_IN, REGISTER_VIEW_REQUIRED, USERNAME_REQUIRED,
};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Outcome of checking an operation's precondition against the current state.
enum Gate {
    /// Apply the event and issue the request.
    Proceed(SessionEvent),
    /// Apply the event and stop; no request is issued.
    Settle(SessionEvent),
    /// Leave the state untouched.
    Ignore(&'static str),
}

impl Gate {
    fn refuse(message: &str) -> Self {
        Self::Settle(SessionEvent::Invalid(message.to_string()))
    }
}

/// Owns one session's state and drives it through the vault backend.
///
/// Operations never return errors: every failure lands in
/// [`SessionState::error`]. The state lock is only held while the reducer
/// runs, so requests from overlapping calls race and the last response to
/// arrive wins.
pub struct SessionController {
    api: Arc<dyn VaultApi>,
    empty_query: EmptyQueryPolicy,
    state: Mutex<SessionState>,
    changes: broadcast::Sender<SessionChange>,
}

impl SessionController {
    pub fn new(api: Arc<dyn VaultApi>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            api,
            empty_query: EmptyQueryPolicy::default(),
            state: Mutex::new(SessionState::default()),
            changes,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, SettingsError> {
        let api = HttpVaultApi::from_settings(settings)?;
        info!(api_url = %api.base_url(), "session: using vault backend");
        Ok(Self::new(Arc::new(api)).with_empty_query_policy(settings.empty_query))
    }

    pub fn with_empty_query_policy(mut self, empty_query: EmptyQueryPolicy) -> Self {
        self.empty_query = empty_query;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn show_register(&self) {
        self.dispatch(SessionEvent::ShowRegister).await;
    }

    pub async fn back_to_login(&self) {
        self.dispatch(SessionEvent::BackToLogin).await;
    }

    pub async fn edit_draft(&self, draft: VaultEntryDraft) {
        self.dispatch(SessionEvent::DraftEdited(draft)).await;
    }

    pub async fn register(&self, username: &str) {
        let username = username.trim();
        let started = self
            .begin(Operation::Register, |state| {
                if state.is_authenticated() {
                    Gate::Ignore("already authenticated")
                } else if state.view != ViewMode::Register {
                    Gate::refuse(REGISTER_VIEW_REQUIRED)
                } else if username.is_empty() {
                    Gate::refuse(USERNAME_REQUIRED)
                } else {
                    Gate::Proceed(SessionEvent::RegisterStarted {
                        username: username.to_string(),
                    })
                }
            })
            .await;
        if started.is_none() {
            return;
        }

        info!(username, "session: registration requested");
        let event = match self.api.register(username).await {
            Ok(response) => SessionEvent::Registered(response.into()),
            Err(err) => failure(Operation::Register, &err),
        };
        let registered = matches!(event, SessionEvent::Registered(_));
        let state = self.dispatch(event).await;

        if registered && state.registration.is_none() {
            warn!(
                username,
                "session: registration completed after leaving the registration view; material dropped"
            );
        } else if registered {
            info!(username, "session: registration material received");
        }
    }

    /// Verifies a TOTP code. Works from either unauthenticated view, so a
    /// freshly registered user can finish enrollment directly.
    pub async fn verify_code(&self, username: &str, code: &str) {
        let username = username.trim();
        let code = code.trim();
        let started = self
            .begin(Operation::VerifyCode, |state| {
                if state.is_authenticated() {
                    Gate::Ignore("already authenticated")
                } else if username.is_empty() || code.is_empty() {
                    Gate::refuse(CREDENTIALS_REQUIRED)
                } else {
                    Gate::Proceed(SessionEvent::VerifyStarted {
                        username: username.to_string(),
                    })
                }
            })
            .await;
        if started.is_none() {
            return;
        }

        info!(username, "session: verifying code");
        let event = match self.api.verify_totp(username, code).await {
            Ok(()) => {
                info!(username, "session: authenticated");
                SessionEvent::Verified {
                    username: username.to_string(),
                }
            }
            Err(err) => failure(Operation::VerifyCode, &err),
        };
        self.dispatch(event).await;
    }

    /// Searches the signed-in user's vault. Results replace the previous
    /// ones; on failure the previous results stay in place.
    pub async fn search_entries(&self, query: &str) {
        let query = query.trim();
        let empty_query = self.empty_query;
        let Some(state) = self
            .begin(Operation::SearchEntries, |state| {
                if !state.is_authenticated() || state.username.is_none() {
                    Gate::refuse(NOT_SIGNED_IN)
                } else if query.is_empty() && empty_query == EmptyQueryPolicy::MatchNone {
                    Gate::Settle(SessionEvent::SearchCleared)
                } else {
                    Gate::Proceed(SessionEvent::SearchStarted {
                        query: query.to_string(),
                    })
                }
            })
            .await
        else {
            return;
        };
        let Some(username) = state.username else {
            return;
        };

        debug!(username = %username, query, "session: searching vault");
        let event = match self.api.search_entries(&username, query).await {
            Ok(entries) => {
                info!(
                    username = %username,
                    query,
                    matches = entries.len(),
                    "session: search completed"
                );
                SessionEvent::SearchCompleted(entries)
            }
            Err(err) => failure(Operation::SearchEntries, &err),
        };
        self.dispatch(event).await;
    }

    /// Stores a new entry. On success the draft is reset and, when a search
    /// term is active, the search is re-run so the new entry shows up.
    pub async fn add_entry(&self, draft: VaultEntryDraft) {
        let request = AddEntryRequest::from(&draft);
        let submitted = draft.clone();
        let Some(state) = self
            .begin(Operation::AddEntry, |state| {
                if !state.is_authenticated() || state.username.is_none() {
                    Gate::refuse(NOT_SIGNED_IN)
                } else if !draft.is_complete() {
                    Gate::refuse(DRAFT_INCOMPLETE)
                } else {
                    Gate::Proceed(SessionEvent::AddStarted { draft })
                }
            })
            .await
        else {
            return;
        };
        let Some(username) = state.username else {
            return;
        };

        info!(username = %username, service = %request.service, "session: adding vault entry");
        let state = match self.api.add_entry(&username, &request).await {
            Ok(()) => self.dispatch(SessionEvent::EntryAdded { draft: submitted }).await,
            Err(err) => {
                self.dispatch(failure(Operation::AddEntry, &err)).await;
                return;
            }
        };

        if !state.active_query.is_empty() {
            debug!(
                username = %username,
                query = %state.active_query,
                "session: refreshing active search after add"
            );
            self.search_entries(&state.active_query).await;
        }
    }

    /// Submits the draft currently held in the session, e.g. one kept after
    /// a failed add.
    pub async fn submit_draft(&self) {
        let draft = self.snapshot().await.draft;
        self.add_entry(draft).await;
    }

    async fn dispatch(&self, event: SessionEvent) -> SessionState {
        let change = {
            let mut state = self.state.lock().await;
            state.apply(event.clone());
            SessionChange {
                event,
                state: state.clone(),
            }
        };
        let state = change.state.clone();
        let _ = self.changes.send(change);
        state
    }

    /// Checks the precondition and applies the resulting event under one
    /// lock. Returns the new state only when a request should follow.
    async fn begin(
        &self,
        operation: Operation,
        gate: impl FnOnce(&SessionState) -> Gate,
    ) -> Option<SessionState> {
        let (change, proceed) = {
            let mut state = self.state.lock().await;
            let (event, proceed) = match gate(&*state) {
                Gate::Proceed(event) => (event, true),
                Gate::Settle(event) => (event, false),
                Gate::Ignore(reason) => {
                    warn!(operation = operation.as_str(), reason, "session: request ignored");
                    return None;
                }
            };
            state.apply(event.clone());
            (
                SessionChange {
                    event,
                    state: state.clone(),
                },
                proceed,
            )
        };

        if let SessionEvent::Invalid(message) = &change.event {
            debug!(
                operation = operation.as_str(),
                detail = %message,
                "session: precondition failed"
            );
        }
        let state = change.state.clone();
        let _ = self.changes.send(change);
        proceed.then_some(state)
    }
}

fn failure(operation: Operation, err: &ClientError) -> SessionEvent {
    warn!(
        operation = operation.as_str(),
        transport = err.is_transport(),
        error = %err,
        "session: request failed"
    );
    SessionEvent::Failed {
        operation,
        message: operation.failure_message(err),
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
