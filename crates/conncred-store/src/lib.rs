//! conncred store - saved profiles, recently used connections and settings
//!
//! This crate provides:
//! - [`ConnectionStore`]: the [`ProfileStore`](conncred_core::ProfileStore) over `profiles.toml` and a secret store
//! - [`Settings`]: user settings from `settings.toml` and `CONNCRED_*` variables

mod connection_store;
pub mod profiles_file;
pub mod settings;

pub use connection_store::ConnectionStore;
pub use profiles_file::{ProfilesFile, RecentEntry};
pub use settings::{Settings, DEFAULT_MAX_RECENT_CONNECTIONS};
