use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::QrImageError;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Formats the backend has been seen to emit for `last_rotated`.
const LAST_ROTATED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated,
}

/// Which form the front end shows while the session is unauthenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Login,
    Register,
}

/// Enrollment material handed out by a successful registration.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrationMaterial {
    /// Base64 encoded PNG of the provisioning QR code.
    pub qr_code_image: String,
    pub shared_secret: String,
}

impl RegistrationMaterial {
    pub fn new(qr_code_image: impl Into<String>, shared_secret: impl Into<String>) -> Self {
        Self {
            qr_code_image: qr_code_image.into(),
            shared_secret: shared_secret.into(),
        }
    }

    /// Decodes the QR image and checks that it really is a PNG.
    pub fn qr_png_bytes(&self) -> Result<Vec<u8>, QrImageError> {
        let bytes = STANDARD.decode(self.qr_code_image.trim())?;
        if !bytes.starts_with(&PNG_SIGNATURE) {
            return Err(QrImageError::NotPng { len: bytes.len() });
        }
        Ok(bytes)
    }

    pub fn qr_data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.qr_code_image.trim())
    }
}

impl fmt::Debug for RegistrationMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationMaterial")
            .field("qr_code_image_len", &self.qr_code_image.len())
            .field("shared_secret", &"<redacted>")
            .finish()
    }
}

/// A credential the user is about to store. All fields are required.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct VaultEntryDraft {
    pub service: String,
    pub service_username: String,
    pub secret: String,
}

impl VaultEntryDraft {
    pub fn new(
        service: impl Into<String>,
        service_username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            service_username: service_username.into(),
            secret: secret.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        [&self.service, &self.service_username, &self.secret]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.service.is_empty() && self.service_username.is_empty() && self.secret.is_empty()
    }
}

impl fmt::Debug for VaultEntryDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultEntryDraft")
            .field("service", &self.service)
            .field("service_username", &self.service_username)
            .field("secret_set", &!self.secret.is_empty())
            .finish()
    }
}

/// One stored credential as returned by a vault search.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    #[serde(deserialize_with = "text_or_number")]
    pub service: String,
    #[serde(deserialize_with = "text_or_number")]
    pub username: String,
    #[serde(deserialize_with = "text_or_number")]
    pub password: String,
    #[serde(default)]
    pub last_rotated: Option<String>,
}

/// Accepts a JSON string or a bare number. CSV-backed vaults emit numbers
/// for columns that happen to be all digits, such as phone number logins.
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
    }

    Ok(match Field::deserialize(deserializer)? {
        Field::Text(text) => text,
        Field::Unsigned(value) => value.to_string(),
        Field::Signed(value) => value.to_string(),
        Field::Float(value) => value.to_string(),
    })
}

impl VaultEntry {
    /// Parses `last_rotated` into a timestamp, accepting a bare date, an
    /// ISO/RFC 3339 date-time or the space separated form with fractional
    /// seconds. Returns `None` for anything else.
    pub fn last_rotated_at(&self) -> Option<NaiveDateTime> {
        let raw = self.last_rotated.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.naive_utc());
        }

        LAST_ROTATED_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
    }
}

impl fmt::Debug for VaultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultEntry")
            .field("service", &self.service)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("last_rotated", &self.last_rotated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    fn entry_rotated(last_rotated: Option<&str>) -> VaultEntry {
        VaultEntry {
            service: "Facebook".into(),
            username: "a@x.com".into(),
            password: "p1".into(),
            last_rotated: last_rotated.map(str::to_string),
        }
    }

    #[test]
    fn parses_date_only_last_rotated() {
        let parsed = entry_rotated(Some("2024-01-01"))
            .last_rotated_at()
            .expect("date only");
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 1, 1));
        assert_eq!(parsed.hour(), 0);
    }

    #[test]
    fn parses_space_separated_timestamp_with_fraction() {
        let parsed = entry_rotated(Some("2024-03-05 14:07:09.123456"))
            .last_rotated_at()
            .expect("timestamp");
        assert_eq!((parsed.hour(), parsed.minute(), parsed.second()), (14, 7, 9));
    }

    #[test]
    fn parses_rfc3339_last_rotated() {
        let parsed = entry_rotated(Some("2024-03-05T14:07:09+02:00"))
            .last_rotated_at()
            .expect("rfc3339");
        assert_eq!(parsed.hour(), 12);
    }

    #[test]
    fn unparseable_or_missing_last_rotated_is_none() {
        assert!(entry_rotated(Some("yesterday")).last_rotated_at().is_none());
        assert!(entry_rotated(Some("  ")).last_rotated_at().is_none());
        assert!(entry_rotated(None).last_rotated_at().is_none());
    }

    #[test]
    fn vault_entry_accepts_null_or_missing_last_rotated() {
        let entries: Vec<VaultEntry> = serde_json::from_str(
            r#"[
                {"service":"A","username":"u","password":"p","last_rotated":null},
                {"service":"B","username":"u","password":"p"}
            ]"#,
        )
        .expect("decode");
        assert!(entries.iter().all(|entry| entry.last_rotated.is_none()));
    }

    #[test]
    fn vault_entry_accepts_numeric_columns() {
        let entry: VaultEntry = serde_json::from_value(serde_json::json!({
            "service": "Bank",
            "username": 5551234567u64,
            "password": 1234.5,
        }))
        .expect("decode");
        assert_eq!(entry.username, "5551234567");
        assert_eq!(entry.password, "1234.5");

        let whole: VaultEntry = serde_json::from_value(serde_json::json!({
            "service": 42,
            "username": -7,
            "password": "p1",
        }))
        .expect("decode");
        assert_eq!(whole.service, "42");
        assert_eq!(whole.username, "-7");

        let rejected = serde_json::from_value::<VaultEntry>(serde_json::json!({
            "service": "Bank",
            "username": ["not", "text"],
            "password": "p1",
        }));
        assert!(rejected.is_err());
    }

    #[test]
    fn qr_png_bytes_accepts_png_payload() {
        let png = [&PNG_SIGNATURE[..], &b"rest-of-image"[..]].concat();
        let material = RegistrationMaterial::new(STANDARD.encode(&png), "ABC123");
        assert_eq!(material.qr_png_bytes().expect("png"), png);
    }

    #[test]
    fn qr_png_bytes_rejects_non_png_and_bad_base64() {
        let not_png = RegistrationMaterial::new("Zm9v", "ABC123");
        assert!(matches!(
            not_png.qr_png_bytes(),
            Err(QrImageError::NotPng { len: 3 })
        ));

        let garbage = RegistrationMaterial::new("***", "ABC123");
        assert!(matches!(
            garbage.qr_png_bytes(),
            Err(QrImageError::Base64(_))
        ));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let material = RegistrationMaterial::new("Zm9v", "ABC123");
        assert!(!format!("{material:?}").contains("ABC123"));

        let draft = VaultEntryDraft::new("GitHub", "octo", "hunter2");
        assert!(!format!("{draft:?}").contains("hunter2"));

        assert!(!format!("{:?}", entry_rotated(None)).contains("p1"));
    }

    #[test]
    fn draft_completeness_requires_every_field() {
        assert!(VaultEntryDraft::new("GitHub", "octo", "hunter2").is_complete());
        assert!(!VaultEntryDraft::new("GitHub", "", "hunter2").is_complete());
        assert!(!VaultEntryDraft::new("GitHub", "octo", "   ").is_complete());
        assert!(VaultEntryDraft::default().is_empty());
    }
}
