//! Secret backend implementations

#[cfg(feature = "keychain")]
pub mod keychain;

pub mod memory;
