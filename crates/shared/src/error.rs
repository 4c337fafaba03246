use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error body the vault backend returns alongside a non-success status.
///
/// `detail` is usually a string, but request validation failures carry a
/// structured list instead, so it is kept as raw JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ApiError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(Value::String(detail.into())),
        }
    }

    /// Returns the detail text when the backend supplied a non-blank string.
    pub fn detail_text(&self) -> Option<&str> {
        match &self.detail {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        }
    }

    /// Extracts the detail text from a raw response body, if there is one.
    pub fn detail_from_body(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ApiError>(body)
            .ok()
            .and_then(|error| error.detail_text().map(str::to_string))
    }
}

#[derive(Debug, Error)]
pub enum QrImageError {
    #[error("qr code image is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("qr code image is not a PNG ({len} bytes)")]
    NotPng { len: usize },
}
