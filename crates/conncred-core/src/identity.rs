//! Profile identity and secret-store key scheme
//!
//! `conncred|itemtype:Profile|name:<profile>|server:<server>|db:<database>|user:<user>`
//!
//! Empty components are left out. `|` and `\` inside a component are
//! backslash-escaped so distinct profiles never produce the same key. The
//! database is part of the identity, and so is the profile name: renaming a
//! profile moves its secret to a new key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::ConnectionProfile;

const KEY_PREFIX: &str = "conncred";
const ITEM_TYPE_PROFILE: &str = "Profile";

/// Stable identity of a connection profile
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    pub fn for_profile(profile: &ConnectionProfile) -> Self {
        let credentials = &profile.credentials;
        let components = [
            ("name", profile.profile_name.as_deref().unwrap_or("")),
            ("server", credentials.server.as_str()),
            ("db", credentials.database.as_str()),
            ("user", credentials.user.as_str()),
        ];

        let mut key = format!("{}|itemtype:{}", KEY_PREFIX, ITEM_TYPE_PROFILE);
        for (label, value) in components {
            if value.is_empty() {
                continue;
            }
            key.push('|');
            key.push_str(label);
            key.push(':');
            push_escaped(&mut key, value);
        }

        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CredentialId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        if c == '|' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}
