//! The secret store abstraction

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::SecretError;

/// A key/value store for single secret strings.
///
/// Keys are opaque identifiers built by the caller. Implementations must
/// never log or echo the secret value.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Short backend name for logging and errors
    fn backend_name(&self) -> &'static str;

    /// Retrieve a secret by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    /// Returns `Err` if the backend could not be accessed.
    async fn get(&self, key: &str) -> Result<Option<SecretString>, SecretError>;

    /// Store a secret under `key`, replacing any previous value.
    ///
    /// Returns `Ok(true)` when the backend confirmed the write. `Ok(false)`
    /// means the call completed but the value was not persisted.
    async fn set(&self, key: &str, secret: SecretString) -> Result<bool, SecretError>;

    /// Delete the secret under `key`.
    ///
    /// Returns `Ok(false)` if nothing was stored.
    async fn delete(&self, key: &str) -> Result<bool, SecretError>;
}
