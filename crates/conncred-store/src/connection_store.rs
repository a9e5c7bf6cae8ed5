//! Profile store backed by a TOML file and a secret store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use conncred_core::{
    ensure_required_properties_set, ConnectionCredentials, ConnectionProfile, CredentialId,
    ProfileStore, Prompter, ResolveError, ResolveRequest, SavePassword, StoreError,
};
use conncred_secrets::{ExposeSecret, SecretStore, SecretString};
use parking_lot::RwLock;

use crate::profiles_file::{ProfilesFile, RecentEntry};
use crate::settings::DEFAULT_MAX_RECENT_CONNECTIONS;

/// Saved connection profiles and recently used connections.
///
/// Every mutation is written back to the profile file before returning.
/// Passwords only ever go to the secret store.
pub struct ConnectionStore {
    secrets: Arc<dyn SecretStore>,
    path: Option<PathBuf>,
    state: RwLock<ProfilesFile>,
    max_recent: usize,
}

impl ConnectionStore {
    /// Open the store at `path`, loading existing profiles
    pub async fn open(
        path: impl Into<PathBuf>,
        secrets: Arc<dyn SecretStore>,
        max_recent: usize,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let file = ProfilesFile::load(&path).await?;

        tracing::info!(
            path = ?path,
            profiles = file.profiles.len(),
            backend = secrets.backend_name(),
            "connection store opened"
        );

        Ok(Self {
            secrets,
            path: Some(path),
            state: RwLock::new(file),
            max_recent,
        })
    }

    /// Store that keeps its profile list in memory only
    pub fn in_memory(secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            secrets,
            path: None,
            state: RwLock::new(ProfilesFile::default()),
            max_recent: DEFAULT_MAX_RECENT_CONNECTIONS,
        }
    }

    pub fn with_max_recent(mut self, max_recent: usize) -> Self {
        self.max_recent = max_recent;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn max_recent(&self) -> usize {
        self.max_recent
    }

    /// All saved profiles, in insertion order
    pub fn profiles(&self) -> Vec<ConnectionProfile> {
        self.state.read().profiles.clone()
    }

    pub fn find_profile(&self, id: &CredentialId) -> Option<ConnectionProfile> {
        self.state
            .read()
            .profiles
            .iter()
            .find(|p| &p.credential_id() == id)
            .cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<ConnectionProfile> {
        self.state
            .read()
            .profiles
            .iter()
            .find(|p| p.profile_name.as_deref() == Some(name))
            .cloned()
    }

    /// Recently used connections, most recent first
    pub fn recently_used(&self) -> Vec<RecentEntry> {
        self.state.read().recent.clone()
    }

    /// Put `profile` at the front of the recently used list.
    ///
    /// An entry with the same identity is moved rather than duplicated and
    /// the oldest entries past the cap are dropped.
    #[tracing::instrument(skip_all, fields(profile = %profile.display_name()))]
    pub async fn add_recently_used(&self, profile: &ConnectionProfile) -> Result<(), StoreError> {
        let id = profile.credential_id();
        {
            let mut state = self.state.write();
            state.recent.retain(|e| e.profile.credential_id() != id);
            state.recent.insert(
                0,
                RecentEntry {
                    profile: profile.without_password(),
                    last_used: Utc::now(),
                },
            );
            state.recent.truncate(self.max_recent);
        }

        self.persist().await
    }

    /// Drop `profile` from the recently used list. Returns whether it was listed.
    pub async fn remove_recently_used(&self, profile: &ConnectionProfile) -> Result<bool, StoreError> {
        let id = profile.credential_id();
        let removed = {
            let mut state = self.state.write();
            let before = state.recent.len();
            state.recent.retain(|e| e.profile.credential_id() != id);
            state.recent.len() != before
        };

        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    pub async fn clear_recently_used(&self) -> Result<(), StoreError> {
        self.state.write().recent.clear();
        self.persist().await
    }

    /// Give a saved profile a new name.
    ///
    /// The saved password moves from the old key to the new one before the
    /// list entry is replaced.
    #[tracing::instrument(skip_all, fields(profile = %profile.display_name(), new_name = %new_name))]
    pub async fn rename_profile(
        &self,
        profile: &ConnectionProfile,
        new_name: &str,
    ) -> Result<ConnectionProfile, StoreError> {
        let old_id = profile.credential_id();
        let mut renamed = profile.without_password();
        renamed.profile_name = Some(new_name.to_string());
        let new_id = renamed.credential_id();

        if self.find_profile(&old_id).is_none() {
            return Err(StoreError::NotFound(profile.display_name()));
        }
        if old_id == new_id {
            return Ok(renamed);
        }
        if self.find_profile(&new_id).is_some() || self.find_by_name(new_name).is_some() {
            return Err(StoreError::AlreadyExists(new_name.to_string()));
        }

        if let Some(secret) = self.secrets.get(old_id.as_str()).await? {
            if !self.secrets.set(new_id.as_str(), secret).await? {
                return Err(StoreError::SecretNotPersisted(new_name.to_string()));
            }
            self.secrets.delete(old_id.as_str()).await?;
            tracing::debug!("moved saved password to renamed profile");
        }

        {
            let mut state = self.state.write();
            if let Some(slot) = state
                .profiles
                .iter_mut()
                .find(|p| p.credential_id() == old_id)
            {
                *slot = renamed.clone();
            }
            for entry in state
                .recent
                .iter_mut()
                .filter(|e| e.profile.credential_id() == old_id)
            {
                entry.profile = renamed.clone();
            }
        }

        self.persist().await?;
        tracing::info!("profile renamed");
        Ok(renamed)
    }

    /// Credentials ready for the transport, with a saved password filled in
    pub async fn materialize(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<ConnectionCredentials, StoreError> {
        let mut credentials = profile.credentials.clone();

        if credentials.is_password_based()
            && credentials.password.is_empty()
            && profile.save_password == SavePassword::Persist
        {
            if let Some(secret) = self.secrets.get(profile.credential_id().as_str()).await? {
                credentials.password = secret.expose_secret().to_string();
            }
        }

        Ok(credentials)
    }

    /// Resolve `profile` and return credentials ready for the transport.
    ///
    /// A listed profile stays listed: purging its saved password removes the
    /// entry, so it is written back without the password. The resolved
    /// connection goes to the front of the recently used list.
    #[tracing::instrument(skip_all, fields(profile = %profile.display_name()))]
    pub async fn connect<P>(
        &self,
        profile: &ConnectionProfile,
        request: ResolveRequest,
        prompter: &P,
    ) -> Result<ConnectionCredentials, ResolveError>
    where
        P: Prompter + ?Sized,
    {
        let was_listed = request.is_profile && self.find_profile(&profile.credential_id()).is_some();

        let resolved = ensure_required_properties_set(profile, request, prompter, self).await?;

        if was_listed && self.find_profile(&resolved.credential_id()).is_none() {
            self.save_profile(&resolved.without_password()).await?;
            tracing::debug!("profile re-listed after password purge");
        }

        let credentials = self.materialize(&resolved).await?;
        self.add_recently_used(&resolved).await?;
        Ok(credentials)
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // Snapshot so the lock isn't held across the write
        let snapshot = self.state.read().clone();
        snapshot.save(path).await
    }
}

impl std::fmt::Debug for ConnectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStore")
            .field("path", &self.path)
            .field("backend", &self.secrets.backend_name())
            .field("profiles", &self.state.read().profiles.len())
            .field("max_recent", &self.max_recent)
            .finish()
    }
}

#[async_trait]
impl ProfileStore for ConnectionStore {
    #[tracing::instrument(skip_all, fields(profile = %profile.display_name()))]
    async fn save_profile(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<ConnectionProfile, StoreError> {
        let id = profile.credential_id();

        if profile.save_password == SavePassword::Persist && profile.has_password() {
            let secret = SecretString::from(profile.credentials.password.clone());
            if !self.secrets.set(id.as_str(), secret).await? {
                return Err(StoreError::SecretNotPersisted(profile.display_name()));
            }
            tracing::debug!(key = %id, "password written to secret store");
        }

        let stored = profile.without_password();
        {
            let mut state = self.state.write();
            match state.profiles.iter().position(|p| p.credential_id() == id) {
                Some(pos) => state.profiles[pos] = stored.clone(),
                None => state.profiles.push(stored.clone()),
            }
        }

        self.persist().await?;
        tracing::info!("profile saved");
        Ok(stored)
    }

    #[tracing::instrument(skip_all, fields(profile = %profile.display_name()))]
    async fn remove_profile(&self, profile: &ConnectionProfile) -> Result<bool, StoreError> {
        let id = profile.credential_id();

        let secret_deleted = self.secrets.delete(id.as_str()).await?;

        let removed = {
            let mut state = self.state.write();
            let before = state.profiles.len();
            state.profiles.retain(|p| p.credential_id() != id);
            state.profiles.len() != before
        };

        if removed {
            self.persist().await?;
        }

        tracing::info!(removed, secret_deleted, "profile removed");
        Ok(removed)
    }

    async fn saved_password(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Option<SecretString>, StoreError> {
        Ok(self.secrets.get(profile.credential_id().as_str()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conncred_core::{Answers, AuthenticationType, PromptError, Question};
    use conncred_secrets::{MemoryMode, MemoryStore};

    /// Answers nothing; fails the test if a question is asked
    struct NoQuestions;

    #[async_trait]
    impl Prompter for NoQuestions {
        async fn prompt(&self, questions: &[Question]) -> Result<Answers, PromptError> {
            panic!("unexpected prompt: {:?}", questions);
        }
    }

    fn profile(name: &str) -> ConnectionProfile {
        ConnectionProfile::new(ConnectionCredentials {
            server: "namedServer".to_string(),
            database: "bcd".to_string(),
            authentication_type: AuthenticationType::SqlLogin,
            user: "cde".to_string(),
            ..ConnectionCredentials::default()
        })
        .with_name(name)
    }

    fn store() -> (ConnectionStore, MemoryStore) {
        let secrets = MemoryStore::new();
        let store = ConnectionStore::in_memory(Arc::new(secrets.clone()));
        (store, secrets)
    }

    #[tokio::test]
    async fn test_save_routes_password_to_secret_store() {
        let (store, secrets) = store();
        let p = profile("prod").with_password("hunter2").with_save_password(true);

        let saved = store.save_profile(&p).await.unwrap();
        assert!(saved.credentials.password.is_empty());
        assert!(saved.same_non_secret_fields(&p));

        let listed = store.find_profile(&p.credential_id()).unwrap();
        assert!(listed.credentials.password.is_empty());
        assert!(secrets.contains(p.credential_id().as_str()));

        let secret = store.saved_password(&p).await.unwrap().unwrap();
        assert_eq!(secret.expose_secret(), "hunter2");
    }

    #[tokio::test]
    async fn test_save_without_intent_keeps_secret_store_empty() {
        let (store, secrets) = store();
        store
            .save_profile(&profile("dev").with_password("pw"))
            .await
            .unwrap();
        assert!(secrets.is_empty());
        assert_eq!(store.profiles().len(), 1);
    }

    #[tokio::test]
    async fn test_save_upserts_by_identity() {
        let (store, _) = store();
        let mut p = profile("prod");
        store.save_profile(&p).await.unwrap();

        p.credentials.connect_timeout = 60;
        store.save_profile(&p).await.unwrap();
        store.save_profile(&profile("other")).await.unwrap();

        let profiles = store.profiles();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].credentials.connect_timeout, 60);
    }

    #[tokio::test]
    async fn test_unconfirmed_secret_write_fails() {
        let (store, secrets) = store();
        secrets.set_mode(MemoryMode::Silent);

        let p = profile("prod").with_password("pw").with_save_password(true);
        let err = store.save_profile(&p).await.unwrap_err();
        assert!(matches!(err, StoreError::SecretNotPersisted(_)));
        assert!(store.profiles().is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (store, secrets) = store();
        let p = profile("prod").with_password("pw").with_save_password(true);
        store.save_profile(&p).await.unwrap();

        assert!(store.remove_profile(&p).await.unwrap());
        assert!(secrets.is_empty());
        assert!(!store.remove_profile(&p).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_with_unavailable_secret_store() {
        let (store, secrets) = store();
        store.save_profile(&profile("prod")).await.unwrap();
        secrets.set_mode(MemoryMode::Unavailable);

        let err = store.remove_profile(&profile("prod")).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(store.profiles().len(), 1);
    }

    #[tokio::test]
    async fn test_recently_used_cap_and_move_to_front() {
        let (store, _) = store();
        assert_eq!(store.path(), None);
        let store = store.with_max_recent(3);
        assert_eq!(store.max_recent(), 3);

        for name in ["a", "b", "c", "d"] {
            store.add_recently_used(&profile(name)).await.unwrap();
        }
        let names: Vec<_> = store
            .recently_used()
            .into_iter()
            .map(|e| e.profile.profile_name.unwrap())
            .collect();
        assert_eq!(names, vec!["d", "c", "b"]);

        store.add_recently_used(&profile("b")).await.unwrap();
        let names: Vec<_> = store
            .recently_used()
            .into_iter()
            .map(|e| e.profile.profile_name.unwrap())
            .collect();
        assert_eq!(names, vec!["b", "d", "c"]);
    }

    #[tokio::test]
    async fn test_recently_used_never_holds_password() {
        let (store, _) = store();
        store
            .add_recently_used(&profile("a").with_password("pw"))
            .await
            .unwrap();
        assert!(store.recently_used()[0].profile.credentials.password.is_empty());

        assert!(store.remove_recently_used(&profile("a")).await.unwrap());
        assert!(!store.remove_recently_used(&profile("a")).await.unwrap());

        store.add_recently_used(&profile("b")).await.unwrap();
        store.clear_recently_used().await.unwrap();
        assert!(store.recently_used().is_empty());
    }

    #[tokio::test]
    async fn test_rename_moves_secret() {
        let (store, secrets) = store();
        let p = profile("old").with_password("pw").with_save_password(true);
        store.save_profile(&p).await.unwrap();
        store.add_recently_used(&p).await.unwrap();

        let renamed = store.rename_profile(&p, "new").await.unwrap();
        assert_eq!(renamed.profile_name.as_deref(), Some("new"));

        assert!(!secrets.contains(p.credential_id().as_str()));
        let secret = store.saved_password(&renamed).await.unwrap().unwrap();
        assert_eq!(secret.expose_secret(), "pw");

        assert!(store.find_by_name("old").is_none());
        assert!(store.find_by_name("new").is_some());
        assert_eq!(
            store.recently_used()[0].profile.profile_name.as_deref(),
            Some("new")
        );
    }

    #[tokio::test]
    async fn test_rename_conflicts_and_missing() {
        let (store, _) = store();
        store.save_profile(&profile("a")).await.unwrap();
        store.save_profile(&profile("b")).await.unwrap();

        let err = store.rename_profile(&profile("a"), "b").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let err = store.rename_profile(&profile("zzz"), "c").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_materialize_fills_saved_password() {
        let (store, _) = store();
        let p = profile("prod").with_password("pw").with_save_password(true);
        let saved = store.save_profile(&p).await.unwrap();

        let credentials = store.materialize(&saved).await.unwrap();
        assert_eq!(credentials.password, "pw");

        let unsaved = profile("prod").with_save_password(false);
        let credentials = store.materialize(&unsaved).await.unwrap();
        assert!(credentials.password.is_empty());
    }

    #[tokio::test]
    async fn test_profiles_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.toml");
        let secrets: Arc<dyn SecretStore> = Arc::new(MemoryStore::new());

        let store = ConnectionStore::open(&path, secrets.clone(), 5).await.unwrap();
        let p = profile("prod").with_password("pw").with_save_password(true);
        store.save_profile(&p).await.unwrap();
        store.add_recently_used(&p).await.unwrap();
        drop(store);

        let reopened = ConnectionStore::open(&path, secrets, 5).await.unwrap();
        assert_eq!(reopened.path(), Some(path.as_path()));
        assert_eq!(reopened.max_recent(), 5);
        let listed = reopened.find_by_name("prod").unwrap();
        assert!(listed.same_non_secret_fields(&p));
        assert!(listed.credentials.password.is_empty());
        assert_eq!(reopened.recently_used().len(), 1);
        assert!(reopened.saved_password(&listed).await.unwrap().is_some());

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("\"pw\""));
    }

    #[tokio::test]
    async fn test_connect_keeps_purged_profile_listed() {
        let (store, secrets) = store();
        let p = profile("prod").with_password("pw").with_save_password(true);
        store.save_profile(&p).await.unwrap();

        let declined = p.clone().with_save_password(false);
        let credentials = store
            .connect(&declined, ResolveRequest::for_profile(&declined), &NoQuestions)
            .await
            .unwrap();

        assert_eq!(credentials.password, "pw");
        assert!(secrets.is_empty());

        let listed = store.find_by_name("prod").expect("profile must stay listed");
        assert_eq!(listed.save_password, SavePassword::DoNotPersist);
        assert!(listed.credentials.password.is_empty());
        assert_eq!(store.recently_used().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_ad_hoc_is_not_listed() {
        let (store, _) = store();
        let p = profile("scratch").with_password("pw");

        let credentials = store
            .connect(&p, ResolveRequest::ad_hoc(&p), &NoQuestions)
            .await
            .unwrap();

        assert_eq!(credentials.password, "pw");
        assert!(store.profiles().is_empty());
        assert_eq!(store.recently_used().len(), 1);
    }
}
