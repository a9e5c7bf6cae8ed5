//! Secret storage with OS keychain and in-memory backends
//!
//! This crate provides the leaf storage used for saved connection passwords:
//!
//! - **OS Keychain** ([`KeychainStore`]): macOS Keychain, Windows Credential Manager, Linux Secret Service
//! - **Memory** ([`MemoryStore`]): process-local map, for `--no-keychain` runs and tests
//!
//! # Example
//!
//! ```rust,ignore
//! use conncred_secrets::{KeychainStore, SecretStore};
//! use secrecy::SecretString;
//!
//! let store = KeychainStore::new("conncred");
//! store.set("profile-key", SecretString::from("hunter2")).await?;
//! let secret = store.get("profile-key").await?;
//! ```
//!
//! # Features
//!
//! - `keychain` (default): Enable OS keychain support via `keyring` crate

mod backends;
mod error;
mod store;

pub use backends::memory::{MemoryMode, MemoryStore};
pub use error::SecretError;
pub use secrecy::{ExposeSecret, SecretString};
pub use store::SecretStore;

#[cfg(feature = "keychain")]
pub use backends::keychain::KeychainStore;

/// Default keychain service name
pub const DEFAULT_SERVICE: &str = "conncred";
