//! conncred settings
//!
//! Loaded from `~/.config/conncred/settings.toml`. Values are resolved in this
//! order (first found wins):
//! 1. Environment variables (CONNCRED_*)
//! 2. Settings file
//! 3. Default values

use std::env;
use std::path::{Path, PathBuf};

use conncred_secrets::DEFAULT_SERVICE;
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "CONNCRED";

/// Default cap on the recently-used list
pub const DEFAULT_MAX_RECENT_CONNECTIONS: usize = 5;

/// User settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Maximum number of entries in the recently-used list
    pub max_recent_connections: usize,

    /// Store saved passwords in the OS keychain (otherwise in memory only)
    pub use_keychain: bool,

    /// Keychain service name for saved passwords
    pub keychain_service: String,

    /// Profile list location (defaults to `profiles.toml` next to the settings file)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_recent_connections: DEFAULT_MAX_RECENT_CONNECTIONS,
            use_keychain: true,
            keychain_service: DEFAULT_SERVICE.to_string(),
            profiles_path: None,
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

impl Settings {
    /// Get the default config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conncred")
    }

    /// Get the default settings file path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("settings.toml")
    }

    /// Load settings from a specific path
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from `path` (or the default location), falling back to
    /// defaults when the file doesn't exist, then apply env overrides
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);

        let mut settings = if path.exists() {
            Self::load(&path)?
        } else {
            tracing::debug!(path = ?path, "no settings file, using defaults");
            Self::default()
        };

        settings.apply_env();
        Ok(settings)
    }

    /// Override values from CONNCRED_* environment variables
    pub fn apply_env(&mut self) {
        if let Some(max) = get_env("MAX_RECENT_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.max_recent_connections = max;
        }
        if let Some(use_keychain) = get_env("USE_KEYCHAIN").and_then(|v| parse_bool(&v)) {
            self.use_keychain = use_keychain;
        }
        if let Some(service) = get_env("KEYCHAIN_SERVICE") {
            self.keychain_service = service;
        }
        if let Some(path) = get_env("PROFILES_PATH") {
            self.profiles_path = Some(path);
        }
    }

    /// Profile list path with `~` expanded
    pub fn profiles_file(&self) -> PathBuf {
        match &self.profiles_path {
            Some(path) => PathBuf::from(shellexpand::tilde(path).as_ref()),
            None => Self::config_dir().join("profiles.toml"),
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_recent_connections == 0 {
            errors.push("max_recent_connections must be at least 1".to_string());
        }

        if self.use_keychain && self.keychain_service.trim().is_empty() {
            errors.push("keychain_service is required when use_keychain is enabled".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.max_recent_connections, 5);
        assert!(settings.use_keychain);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let settings = Settings {
            max_recent_connections: 0,
            keychain_service: String::new(),
            ..Settings::default()
        };
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("max_recent_connections")));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings = toml::from_str("max_recent_connections = 3").unwrap();
        assert_eq!(settings.max_recent_connections, 3);
        assert_eq!(settings.keychain_service, "conncred");
    }

    #[test]
    fn test_load_from_file() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            r#"
max_recent_connections = 8
use_keychain = false
keychain_service = "work"
profiles_path = "/tmp/profiles.toml"
"#,
        )
        .unwrap();

        let loaded = Settings::load(temp_file.path()).unwrap();
        assert_eq!(loaded.max_recent_connections, 8);
        assert!(!loaded.use_keychain);
        assert_eq!(loaded.keychain_service, "work");
        assert_eq!(loaded.profiles_file(), PathBuf::from("/tmp/profiles.toml"));
    }

    #[test]
    fn test_resolve_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::resolve(Some(&dir.path().join("missing.toml"))).unwrap();
        assert_eq!(settings.keychain_service, DEFAULT_SERVICE);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
