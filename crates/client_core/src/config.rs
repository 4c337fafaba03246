use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const API_URL_ENV: &str = "VAULT_API_URL";
pub const SETTINGS_FILE: &str = "vault_client.toml";

/// What a search with an empty term does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyQueryPolicy {
    /// Issue no request and show an empty result list. The backend has no
    /// route for an empty term, so nothing could ever match.
    #[default]
    MatchNone,
    /// Send the empty segment anyway and let the backend answer.
    Forward,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_url: String,
    /// Per-request timeout. Requests wait indefinitely when unset.
    pub request_timeout_ms: Option<u64>,
    pub empty_query: EmptyQueryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            request_timeout_ms: None,
            empty_query: EmptyQueryPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse settings file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid api url '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ClientSettings {
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Parses `api_url`, accepting only http(s) URLs that can carry a path.
    pub fn api_base_url(&self) -> Result<Url, SettingsError> {
        let raw = self.api_url.trim();
        let invalid = |reason: String| SettingsError::InvalidApiUrl {
            url: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("url cannot carry a path".into()));
        }
        Ok(url)
    }
}

/// Loads settings from `vault_client.toml` in the working directory and the
/// `VAULT_API_URL` environment variable.
pub fn load_settings() -> Result<ClientSettings, SettingsError> {
    load_settings_from(Path::new(SETTINGS_FILE), std::env::var(API_URL_ENV).ok())
}

/// Layers built-in defaults, then the settings file at `path` if it exists,
/// then `env_api_url` when it is non-blank.
pub fn load_settings_from(
    path: &Path,
    env_api_url: Option<String>,
) -> Result<ClientSettings, SettingsError> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<ClientSettings>(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => ClientSettings::default(),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if let Some(v) = env_api_url.filter(|v| !v.trim().is_empty()) {
        settings.api_url = v;
    }

    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
