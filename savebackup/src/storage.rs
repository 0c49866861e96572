use std::path::PathBuf;

use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gdrive_core::OAuthToken;

const SERVICE_NAME: &str = "dev.savebackup";
const TOKEN_KEY: &str = "drive_oauth_state";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("token not found")]
    TokenNotFound,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored token is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Snapshot of the OAuth grant, persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl OAuthState {
    pub fn from_token(token: &OAuthToken) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|secs| now_unix().saturating_add(secs as i64)),
            scope: token.scope.clone(),
            token_type: Some(token.token_type.clone()),
        }
    }
}

pub struct TokenStore {
    backend: Backend,
}

enum Backend {
    Keyring(Entry),
    File(PathBuf),
}

impl TokenStore {
    /// Defaults to the system keyring; `SAVEBACKUP_TOKEN_FILE` selects a
    /// plain-file backend for headless environments.
    pub fn new() -> Result<Self, StorageError> {
        if let Ok(path) = std::env::var("SAVEBACKUP_TOKEN_FILE") {
            return Ok(Self::with_file(PathBuf::from(path)));
        }
        let entry = Entry::new(SERVICE_NAME, TOKEN_KEY)?;
        Ok(Self {
            backend: Backend::Keyring(entry),
        })
    }

    pub fn with_file(path: PathBuf) -> Self {
        Self {
            backend: Backend::File(path),
        }
    }

    pub fn save(&self, state: &OAuthState) -> Result<(), StorageError> {
        let payload = serde_json::to_string(state)?;
        match &self.backend {
            Backend::Keyring(entry) => {
                entry.set_password(&payload)?;
                Ok(())
            }
            Backend::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, payload)?;
                Ok(())
            }
        }
    }

    pub fn load(&self) -> Result<OAuthState, StorageError> {
        let payload = match &self.backend {
            Backend::Keyring(entry) => match entry.get_password() {
                Ok(payload) => payload,
                Err(keyring::Error::NoEntry) => return Err(StorageError::TokenNotFound),
                Err(err) => return Err(err.into()),
            },
            Backend::File(path) => match std::fs::read_to_string(path) {
                Ok(payload) => payload,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::TokenNotFound);
                }
                Err(err) => return Err(err.into()),
            },
        };
        Ok(serde_json::from_str(&payload)?)
    }

    pub fn delete(&self) -> Result<(), StorageError> {
        match &self.backend {
            Backend::Keyring(entry) => match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(err) => Err(err.into()),
            },
            Backend::File(path) => match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
