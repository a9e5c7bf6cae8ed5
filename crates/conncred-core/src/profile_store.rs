use async_trait::async_trait;
use conncred_secrets::SecretString;

use crate::error::StoreError;
use crate::models::ConnectionProfile;

/// Persisted profile list with a password side-channel.
///
/// The list only ever holds non-secret fields; passwords live in a secret
/// store under [`ConnectionProfile::credential_id`].
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert or replace the profile (matched by identity).
    ///
    /// A non-empty password is written to the secret store when the profile's
    /// intent is `Persist`. The returned copy has an empty password.
    async fn save_profile(&self, profile: &ConnectionProfile)
        -> Result<ConnectionProfile, StoreError>;

    /// Remove the profile and its saved password.
    ///
    /// Returns `true` iff a list entry existed. A missing secret is not an error.
    async fn remove_profile(&self, profile: &ConnectionProfile) -> Result<bool, StoreError>;

    /// Password saved for this profile's identity, if any
    async fn saved_password(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Option<SecretString>, StoreError>;
}
