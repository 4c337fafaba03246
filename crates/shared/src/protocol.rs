//! Request and response bodies of the vault backend's HTTP contract.

use serde::{Deserialize, Serialize};

use crate::domain::{RegistrationMaterial, VaultEntryDraft};

pub const REGISTER_PATH: &str = "register";
pub const VERIFY_TOTP_PATH: &str = "verify-totp";
pub const PASSWORDS_PATH: &str = "passwords";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub qr_code: String,
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<RegisterResponse> for RegistrationMaterial {
    fn from(value: RegisterResponse) -> Self {
        RegistrationMaterial::new(value.qr_code, value.secret)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTotpRequest {
    pub username: String,
    pub code: String,
}

/// Body of `POST /passwords/{username}`.
///
/// `encrypted_password` carries the secret exactly as the user typed it; the
/// field name is fixed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEntryRequest {
    pub service: String,
    pub service_username: String,
    pub encrypted_password: String,
}

impl From<&VaultEntryDraft> for AddEntryRequest {
    fn from(draft: &VaultEntryDraft) -> Self {
        Self {
            service: draft.service.clone(),
            service_username: draft.service_username.clone(),
            encrypted_password: draft.secret.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn add_entry_request_keeps_backend_field_names() {
        let draft = VaultEntryDraft::new("GitHub", "octo", "hunter2");
        let body = serde_json::to_value(AddEntryRequest::from(&draft)).expect("encode");
        assert_eq!(
            body,
            json!({
                "service": "GitHub",
                "service_username": "octo",
                "encrypted_password": "hunter2",
            })
        );
    }

    #[test]
    fn register_response_ignores_message_and_maps_to_material() {
        let response: RegisterResponse = serde_json::from_value(json!({
            "message": "User registered successfully",
            "qr_code": "Zm9v",
            "secret": "ABC123",
        }))
        .expect("decode");
        let material = RegistrationMaterial::from(response);
        assert_eq!(material, RegistrationMaterial::new("Zm9v", "ABC123"));
    }

    #[test]
    fn register_response_requires_qr_code_and_secret() {
        assert!(serde_json::from_value::<RegisterResponse>(json!({"secret": "ABC123"})).is_err());
    }
}
