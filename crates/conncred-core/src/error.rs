use conncred_secrets::SecretError;
use thiserror::Error;

use crate::prompt::PromptError;
use crate::resolver::FieldKind;

/// Errors from a profile store.
///
/// Messages name profiles and paths, never passwords.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("secret store error: {0}")]
    Secret(#[from] SecretError),

    /// The secret store accepted the write but did not confirm it
    #[error("secret store did not confirm the password write for '{0}'")]
    SecretNotPersisted(String),

    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("a profile named '{0}' already exists")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Profile file could not be parsed or written
    #[error("profile file format error: {0}")]
    Format(String),
}

impl StoreError {
    /// Whether the secret backend could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Secret(e) if e.is_unavailable())
    }
}

/// Why a credential resolution failed
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("required field '{0}' was not provided")]
    MissingRequiredField(FieldKind),

    #[error("connection prompt was cancelled")]
    PromptCancelled,

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("failed to update saved profile: {0}")]
    StoreWriteFailure(#[source] StoreError),

    #[error("secret store unavailable: {0}")]
    SecretStoreUnavailable(String),
}

impl ResolveError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::MissingRequiredField(_) => "missing_required_field",
            ResolveError::PromptCancelled => "prompt_cancelled",
            ResolveError::Prompt(_) => "prompt_failed",
            ResolveError::StoreWriteFailure(_) => "store_write_failure",
            ResolveError::SecretStoreUnavailable(_) => "secret_store_unavailable",
        }
    }

    /// Missing input and cancellation both mean the user did not supply a value
    pub fn is_user_abort(&self) -> bool {
        matches!(
            self,
            ResolveError::MissingRequiredField(_) | ResolveError::PromptCancelled
        )
    }
}

impl From<PromptError> for ResolveError {
    fn from(e: PromptError) -> Self {
        match e {
            PromptError::Cancelled => ResolveError::PromptCancelled,
            PromptError::Io(message) => ResolveError::Prompt(message),
        }
    }
}

impl From<StoreError> for ResolveError {
    fn from(e: StoreError) -> Self {
        if e.is_unavailable() {
            ResolveError::SecretStoreUnavailable(e.to_string())
        } else {
            ResolveError::StoreWriteFailure(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_secret_store_is_distinct() {
        let err: ResolveError =
            StoreError::Secret(SecretError::unavailable("keychain", "locked")).into();
        assert_eq!(err.kind(), "secret_store_unavailable");

        let err: ResolveError = StoreError::SecretNotPersisted("p".into()).into();
        assert_eq!(err.kind(), "store_write_failure");
    }

    #[test]
    fn test_cancel_is_user_abort() {
        let err: ResolveError = PromptError::Cancelled.into();
        assert!(err.is_user_abort());
        assert!(ResolveError::MissingRequiredField(FieldKind::Password).is_user_abort());
        assert!(!ResolveError::Prompt("tty".into()).is_user_abort());
    }
}
