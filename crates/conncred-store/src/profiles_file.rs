//! On-disk profile list (`profiles.toml`)
//!
//! ```toml
//! [[profiles]]
//! profile_name = "prod"
//! server = "db1.example.com"
//! user = "sa"
//! save_password = true
//!
//! [[recent]]
//! server = "db1.example.com"
//! user = "sa"
//! last_used = "2026-01-01T00:00:00Z"
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use conncred_core::{ConnectionProfile, StoreError};
use serde::{Deserialize, Serialize};

/// A recently used connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecentEntry {
    #[serde(flatten)]
    pub profile: ConnectionProfile,

    pub last_used: DateTime<Utc>,
}

/// Everything persisted outside the secret store
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfilesFile {
    pub profiles: Vec<ConnectionProfile>,
    pub recent: Vec<RecentEntry>,
}

impl ProfilesFile {
    /// Read the file, or an empty list if it doesn't exist
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = ?path, "profile file doesn't exist, starting empty");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let file: Self = toml::from_str(&content)
            .map_err(|e| StoreError::Format(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(
            profiles = file.profiles.len(),
            recent = file.recent.len(),
            "loaded profile file"
        );
        Ok(file)
    }

    /// Write the file; passwords are never serialized
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| StoreError::Format(e.to_string()))?;
        tokio::fs::write(path, content).await?;

        tracing::debug!(path = ?path, profiles = self.profiles.len(), "profile file saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conncred_core::ConnectionCredentials;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = ProfilesFile::load(&dir.path().join("nope.toml")).await.unwrap();
        assert_eq!(file, ProfilesFile::default());
    }

    #[tokio::test]
    async fn test_save_never_writes_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profiles.toml");

        let profile = ConnectionProfile::new(ConnectionCredentials::new("db1"))
            .with_name("prod")
            .with_password("hunter2")
            .with_save_password(true);
        let file = ProfilesFile {
            recent: vec![RecentEntry {
                profile: profile.clone(),
                last_used: Utc::now(),
            }],
            profiles: vec![profile],
        };

        file.save(&path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("hunter2"));

        let loaded = ProfilesFile::load(&path).await.unwrap();
        assert_eq!(loaded.profiles.len(), 1);
        assert_eq!(loaded.profiles[0].profile_name.as_deref(), Some("prod"));
        assert!(loaded.profiles[0].credentials.password.is_empty());
        assert_eq!(loaded.recent.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.toml");
        std::fs::write(&path, "profiles = 3").unwrap();

        let err = ProfilesFile::load(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Format(_)));
    }
}
