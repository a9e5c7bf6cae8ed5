//! OS Keychain backend
//!
//! Supports:
//! - macOS Keychain
//! - Windows Credential Manager
//! - Linux Secret Service (via libsecret)
//!
//! Each secret is its own keychain entry: the store's service name plus the
//! caller's key as the account.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::SecretError;
use crate::store::SecretStore;
use crate::DEFAULT_SERVICE;

const BACKEND: &str = "keychain";

/// Secret store backed by the platform keychain
#[derive(Debug, Clone)]
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    /// Create a store writing entries under `service`
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Keychain service name used for every entry
    pub fn service(&self) -> &str {
        &self.service
    }

    async fn blocking<T, F>(&self, key: &str, op: F) -> Result<T, SecretError>
    where
        T: Send + 'static,
        F: FnOnce(keyring::Entry) -> Result<T, keyring::Error> + Send + 'static,
    {
        let service = self.service.clone();
        let account = key.to_string();

        let result = tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &account)?;
            op(entry)
        })
        .await
        .map_err(|e| SecretError::backend(BACKEND, key, format!("keychain task failed: {}", e)))?;

        result.map_err(|e| map_keyring_error(key, e))
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

#[async_trait]
impl SecretStore for KeychainStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &str) -> Result<Option<SecretString>, SecretError> {
        let found = self
            .blocking(key, |entry| match entry.get_password() {
                Ok(password) => Ok(Some(password)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(e),
            })
            .await?;

        tracing::debug!(key = %key, found = found.is_some(), "keychain lookup");
        Ok(found.map(SecretString::from))
    }

    async fn set(&self, key: &str, secret: SecretString) -> Result<bool, SecretError> {
        let value = secret.expose_secret().to_string();
        self.blocking(key, move |entry| entry.set_password(&value))
            .await?;

        tracing::debug!(key = %key, "stored secret in keychain");
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, SecretError> {
        let deleted = self
            .blocking(key, |entry| match entry.delete_credential() {
                Ok(()) => Ok(true),
                // Already gone, that's fine
                Err(keyring::Error::NoEntry) => Ok(false),
                Err(e) => Err(e),
            })
            .await?;

        tracing::debug!(key = %key, deleted, "keychain delete");
        Ok(deleted)
    }
}

fn map_keyring_error(key: &str, e: keyring::Error) -> SecretError {
    match e {
        keyring::Error::NoStorageAccess(inner) => {
            SecretError::unavailable(BACKEND, format!("cannot access keychain storage: {}", inner))
        }
        keyring::Error::PlatformFailure(inner) => {
            SecretError::unavailable(BACKEND, format!("platform failure: {}", inner))
        }
        keyring::Error::Ambiguous(creds) => SecretError::backend(
            BACKEND,
            key,
            format!("ambiguous entry: {} credentials found", creds.len()),
        ),
        // Other variants only describe the entry or its attributes
        _ => SecretError::backend(BACKEND, key, e.to_string()),
    }
}
