//! The backend seam: what the session controller needs from the vault
//! service, and its HTTP implementation.

use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::VaultEntry,
    error::ApiError,
    protocol::{
        AddEntryRequest, RegisterRequest, RegisterResponse, VerifyTotpRequest, PASSWORDS_PATH,
        REGISTER_PATH, VERIFY_TOTP_PATH,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    config::{ClientSettings, SettingsError},
    error::ClientError,
};

#[async_trait]
pub trait VaultApi: Send + Sync {
    async fn register(&self, username: &str) -> Result<RegisterResponse, ClientError>;
    async fn verify_totp(&self, username: &str, code: &str) -> Result<(), ClientError>;
    async fn search_entries(
        &self,
        username: &str,
        search_term: &str,
    ) -> Result<Vec<VaultEntry>, ClientError>;
    async fn add_entry(&self, username: &str, entry: &AddEntryRequest)
        -> Result<(), ClientError>;
}

pub struct HttpVaultApi {
    http: Client,
    base_url: Url,
}

impl HttpVaultApi {
    pub fn new(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, SettingsError> {
        let base_url = settings.api_base_url()?;
        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(builder.build()?, base_url))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `segments` to the base URL, percent-encoding each one so a
    /// username or search term can never add path levels of its own.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::Transport(format!("api url cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Passes success responses through and turns everything else into a
/// rejection, keeping the backend's detail text when it sent one.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = match response.bytes().await {
        Ok(body) => ApiError::detail_from_body(&body),
        Err(err) => {
            debug!(status = status.as_u16(), error = %err, "vault api: unreadable error body");
            None
        }
    };
    Err(ClientError::rejected(status.as_u16(), detail))
}

#[async_trait]
impl VaultApi for HttpVaultApi {
    async fn register(&self, username: &str) -> Result<RegisterResponse, ClientError> {
        let url = self.endpoint(&[REGISTER_PATH])?;
        let response = self
            .http
            .post(url)
            .json(&RegisterRequest {
                username: username.to_string(),
            })
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn verify_totp(&self, username: &str, code: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&[VERIFY_TOTP_PATH])?;
        let response = self
            .http
            .post(url)
            .json(&VerifyTotpRequest {
                username: username.to_string(),
                code: code.to_string(),
            })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn search_entries(
        &self,
        username: &str,
        search_term: &str,
    ) -> Result<Vec<VaultEntry>, ClientError> {
        let url = self.endpoint(&[PASSWORDS_PATH, username, search_term])?;
        let response = self.http.get(url).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn add_entry(
        &self,
        username: &str,
        entry: &AddEntryRequest,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&[PASSWORDS_PATH, username])?;
        let response = self.http.post(url).json(entry).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
