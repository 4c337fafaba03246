use thiserror::Error;

/// Everything that can go wrong while talking to the vault backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a usable response: connection failure,
    /// timeout, or a success body that could not be decoded.
    #[error("request failed to complete: {0}")]
    Transport(String),
    /// The backend answered with a non-success status.
    #[error("backend rejected request with status {status}")]
    Rejected { status: u16, detail: Option<String> },
}

impl ClientError {
    pub fn rejected(status: u16, detail: Option<String>) -> Self {
        Self::Rejected { status, detail }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Backend supplied detail text, only ever present on a rejection.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Rejected { detail, .. } => detail.as_deref(),
            Self::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
