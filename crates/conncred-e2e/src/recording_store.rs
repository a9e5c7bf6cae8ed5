//! Profile store double that records every call
//!
//! Keeps one saved secret per identity in memory and can be told to fail,
//! so tests can assert exactly which persistence calls a resolution made.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use conncred_core::{ConnectionProfile, CredentialId, ProfileStore, SavePassword, StoreError};
use conncred_secrets::{SecretError, SecretString};

/// A call made against [`RecordingProfileStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Save(CredentialId),
    Remove(CredentialId),
    Lookup(CredentialId),
}

#[derive(Debug, Default)]
pub struct RecordingProfileStore {
    calls: Mutex<Vec<StoreCall>>,
    secrets: Mutex<HashMap<CredentialId, String>>,
    fail_save: AtomicBool,
    fail_remove: AtomicBool,
    unavailable: AtomicBool,
}

impl RecordingProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `password` already saved for `profile`
    pub fn with_saved_password(self, profile: &ConnectionProfile, password: &str) -> Self {
        self.secrets
            .lock()
            .insert(profile.credential_id(), password.to_string());
        self
    }

    /// Make `save_profile` fail with an unconfirmed write
    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    /// Make `remove_profile` fail with an IO error
    pub fn set_fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    /// Make every call fail as if the keychain were locked
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        self.count(|c| matches!(c, StoreCall::Save(_)))
    }

    pub fn remove_count(&self) -> usize {
        self.count(|c| matches!(c, StoreCall::Remove(_)))
    }

    /// Save or remove calls; lookups don't count
    pub fn write_count(&self) -> usize {
        self.save_count() + self.remove_count()
    }

    /// Currently saved password for `profile`
    pub fn secret_for(&self, profile: &ConnectionProfile) -> Option<String> {
        self.secrets.lock().get(&profile.credential_id()).cloned()
    }

    fn count(&self, filter: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| filter(c)).count()
    }

    fn record(&self, call: StoreCall) -> Result<(), StoreError> {
        self.calls.lock().push(call);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SecretError::unavailable("recording", "keychain is locked").into());
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for RecordingProfileStore {
    async fn save_profile(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<ConnectionProfile, StoreError> {
        let id = profile.credential_id();
        self.record(StoreCall::Save(id.clone()))?;

        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StoreError::SecretNotPersisted(profile.display_name()));
        }

        if profile.save_password == SavePassword::Persist && profile.has_password() {
            self.secrets
                .lock()
                .insert(id, profile.credentials.password.clone());
        }
        Ok(profile.without_password())
    }

    async fn remove_profile(&self, profile: &ConnectionProfile) -> Result<bool, StoreError> {
        let id = profile.credential_id();
        self.record(StoreCall::Remove(id.clone()))?;

        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("profile file is read-only")));
        }

        Ok(self.secrets.lock().remove(&id).is_some())
    }

    async fn saved_password(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Option<SecretString>, StoreError> {
        let id = profile.credential_id();
        self.record(StoreCall::Lookup(id.clone()))?;

        Ok(self
            .secrets
            .lock()
            .get(&id)
            .map(|secret| SecretString::from(secret.clone())))
    }
}
