//! End-to-end test utilities for conncred
//!
//! Scripted prompters and call-recording stores for exercising credential
//! resolution without a terminal or an OS keychain.

pub mod prompter;
pub mod recording_store;

pub use prompter::ScriptedPrompter;
pub use recording_store::{RecordingProfileStore, StoreCall};
