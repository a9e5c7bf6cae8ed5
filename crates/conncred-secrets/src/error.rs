use thiserror::Error;

/// Errors raised by a secret store backend.
///
/// A missing entry is not an error: `get` returns `Ok(None)` and `delete`
/// returns `Ok(false)`. Messages carry the key at most, never the secret.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The backing store cannot be reached (locked keychain, no secret service, ...)
    #[error("{backend} secret store unavailable: {message}")]
    Unavailable { backend: String, message: String },

    /// Backend runtime error
    #[error("{backend} error for '{key}': {message}")]
    Backend {
        backend: String,
        key: String,
        message: String,
    },
}

impl SecretError {
    /// Create an unavailable-store error
    pub fn unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a backend error
    pub fn backend(
        backend: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            backend: backend.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether the store itself could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
