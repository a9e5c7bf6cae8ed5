//! In-memory backend
//!
//! Nothing is persisted across processes. Used when the keychain is disabled
//! and as a test double; `set_mode` simulates an unreachable store or a store
//! that accepts writes without keeping them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};

use crate::error::SecretError;
use crate::store::SecretStore;

const BACKEND: &str = "memory";

/// Failure simulation for [`MemoryStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryMode {
    #[default]
    Normal,
    /// Every call fails with [`SecretError::Unavailable`]
    Unavailable,
    /// `set` reports an unconfirmed write and stores nothing
    Silent,
}

#[derive(Default)]
struct State {
    secrets: HashMap<String, String>,
    mode: MemoryMode,
}

/// Process-local secret store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&self, mode: MemoryMode) {
        self.inner.write().mode = mode;
    }

    /// Number of stored secrets
    pub fn len(&self) -> usize {
        self.inner.read().secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a secret exists under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().secrets.contains_key(key)
    }

    fn check_available(&self) -> Result<(), SecretError> {
        if self.inner.read().mode == MemoryMode::Unavailable {
            return Err(SecretError::unavailable(BACKEND, "store disabled"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read();
        f.debug_struct("MemoryStore")
            .field("entries", &state.secrets.len())
            .field("mode", &state.mode)
            .finish()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &str) -> Result<Option<SecretString>, SecretError> {
        self.check_available()?;
        let value = self.inner.read().secrets.get(key).cloned();
        tracing::debug!(key = %key, found = value.is_some(), "memory lookup");
        Ok(value.map(SecretString::from))
    }

    async fn set(&self, key: &str, secret: SecretString) -> Result<bool, SecretError> {
        self.check_available()?;
        let mut state = self.inner.write();
        if state.mode == MemoryMode::Silent {
            tracing::debug!(key = %key, "memory store dropped write");
            return Ok(false);
        }
        state
            .secrets
            .insert(key.to_string(), secret.expose_secret().to_string());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, SecretError> {
        self.check_available()?;
        Ok(self.inner.write().secrets.remove(key).is_some())
    }
}
