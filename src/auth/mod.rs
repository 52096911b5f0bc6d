//! Credential resolution for the listener service.
//!
//! An explicit API key always wins over stored session credentials. Stored
//! credentials are written by the login flow; this module only reads them.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

const API_KEY_PREFIXES: [&str; 2] = ["sk_test_", "sk_live_"];

/// Minimum length of the random part of an API key
const API_KEY_MIN_SECRET_LEN: usize = 16;

/// Credentials used against the listener service
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    Session { access_token: String },
}

impl Credentials {
    pub fn token(&self) -> &str {
        match self {
            Credentials::ApiKey(key) => key,
            Credentials::Session { access_token } => access_token,
        }
    }

    /// Value of the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::ApiKey(_) => "api_key",
            Credentials::Session { .. } => "session",
        }
    }
}

// Never print secrets
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Session credentials persisted by the login flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredCredentials {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Source of stored session credentials
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing is stored
    fn load(&self) -> Result<Option<StoredCredentials>>;
}

/// Reads stored credentials from a JSON file
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<StoredCredentials>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredCredentials = serde_json::from_str(&contents).map_err(|e| {
            RelayError::Auth(format!(
                "stored credentials at {} are unreadable: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(stored))
    }
}

/// Check that `key` looks like an API key before sending it anywhere
pub fn validate_api_key(key: &str) -> Result<()> {
    let secret = API_KEY_PREFIXES
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix))
        .ok_or_else(|| {
            RelayError::Auth("API key must start with sk_test_ or sk_live_".to_string())
        })?;

    if secret.len() < API_KEY_MIN_SECRET_LEN {
        return Err(RelayError::Auth(format!(
            "API key is too short (expected at least {} characters after the prefix)",
            API_KEY_MIN_SECRET_LEN
        )));
    }

    if !secret.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(RelayError::Auth(
            "API key contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Pick credentials: explicit API key first, then stored session
pub fn resolve_credentials(
    api_key: Option<&str>,
    store: Option<&dyn CredentialStore>,
) -> Result<Credentials> {
    if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
        validate_api_key(key)?;
        tracing::debug!("Using explicit API key");
        return Ok(Credentials::ApiKey(key.to_string()));
    }

    let stored = match store {
        Some(store) => store.load()?,
        None => None,
    };

    let Some(stored) = stored else {
        return Err(RelayError::Auth(
            "no credentials found: provide an API key or log in first".to_string(),
        ));
    };

    if stored.access_token.trim().is_empty() {
        return Err(RelayError::Auth("stored session has no access token".to_string()));
    }

    if stored.is_expired(Utc::now()) {
        return Err(RelayError::Auth(
            "stored session has expired, log in again".to_string(),
        ));
    }

    tracing::debug!(account_id = ?stored.account_id, "Using stored session credentials");
    Ok(Credentials::Session {
        access_token: stored.access_token,
    })
}
