use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::identity::CredentialId;

/// Default connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT: u32 = 15;

/// How the client authenticates against the server
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum AuthenticationType {
    /// Operating system / domain identity; no user name or password
    #[serde(rename = "Integrated")]
    Integrated,
    /// Server login with user name and password
    #[default]
    #[serde(rename = "SqlLogin")]
    SqlLogin,
    /// Interactive directory sign-in; user name only
    #[serde(rename = "AzureMFA")]
    AzureMfa,
}

impl AuthenticationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationType::Integrated => "Integrated",
            AuthenticationType::SqlLogin => "SqlLogin",
            AuthenticationType::AzureMfa => "AzureMFA",
        }
    }

    /// Whether a user name must be supplied
    pub fn requires_user(&self) -> bool {
        !matches!(self, AuthenticationType::Integrated)
    }

    /// Whether the credential carries a password
    pub fn is_password_based(&self) -> bool {
        matches!(self, AuthenticationType::SqlLogin)
    }
}

impl fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthenticationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "integrated" => Ok(AuthenticationType::Integrated),
            "sqllogin" | "sql" => Ok(AuthenticationType::SqlLogin),
            "azuremfa" => Ok(AuthenticationType::AzureMfa),
            _ => Err(format!(
                "Invalid authentication type: {}. Use 'Integrated', 'SqlLogin' or 'AzureMFA'",
                s
            )),
        }
    }
}

/// Intent for persisting the password in the secret store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum SavePassword {
    Persist,
    DoNotPersist,
    #[default]
    Unspecified,
}

impl SavePassword {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, SavePassword::Unspecified)
    }
}

impl From<Option<bool>> for SavePassword {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => SavePassword::Persist,
            Some(false) => SavePassword::DoNotPersist,
            None => SavePassword::Unspecified,
        }
    }
}

impl From<SavePassword> for Option<bool> {
    fn from(value: SavePassword) -> Self {
        match value {
            SavePassword::Persist => Some(true),
            SavePassword::DoNotPersist => Some(false),
            SavePassword::Unspecified => None,
        }
    }
}

impl From<bool> for SavePassword {
    fn from(value: bool) -> Self {
        Some(value).into()
    }
}

/// Everything needed to open a connection.
///
/// The password is read from profile files (a hand-written plaintext value
/// is migrated to the secret store on first connect) but never written back.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionCredentials {
    /// Server host name, optionally with instance (`host\instance`)
    pub server: String,

    /// Database name; empty selects the server's default database
    #[serde(skip_serializing_if = "String::is_empty")]
    pub database: String,

    pub authentication_type: AuthenticationType,

    /// Login name (unused for integrated authentication)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,

    #[serde(skip_serializing)]
    pub password: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    pub encrypt: bool,

    /// Connect timeout in seconds
    pub connect_timeout: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
}

impl Default for ConnectionCredentials {
    fn default() -> Self {
        Self {
            server: String::new(),
            database: String::new(),
            authentication_type: AuthenticationType::default(),
            user: String::new(),
            password: String::new(),
            port: None,
            encrypt: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            application_name: None,
        }
    }
}

impl ConnectionCredentials {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    pub fn is_password_based(&self) -> bool {
        self.authentication_type.is_password_based()
    }

    /// Server address as understood by the driver (`host,port` when a port is set)
    pub fn server_address(&self) -> String {
        match self.port {
            Some(port) => format!("{},{}", self.server, port),
            None => self.server.clone(),
        }
    }

    /// Ordered driver options, including the password.
    ///
    /// Hand this to the transport only; use [`display_string`](Self::display_string)
    /// for anything shown or logged.
    pub fn connection_details(&self) -> Vec<(&'static str, String)> {
        let mut details = vec![("server", self.server_address())];

        if !self.database.is_empty() {
            details.push(("database", self.database.clone()));
        }

        details.push(("authenticationType", self.authentication_type.to_string()));

        if self.authentication_type.requires_user() {
            details.push(("user", self.user.clone()));
        }
        if self.is_password_based() {
            details.push(("password", self.password.clone()));
        }

        details.push(("encrypt", self.encrypt.to_string()));
        details.push(("connectTimeout", self.connect_timeout.to_string()));

        if let Some(app) = &self.application_name {
            details.push(("applicationName", app.clone()));
        }

        details
    }

    /// One-line summary with the password masked
    pub fn display_string(&self) -> String {
        let database = if self.database.is_empty() {
            "<default>"
        } else {
            &self.database
        };

        let mut out = format!(
            "{} / {} ({})",
            self.server_address(),
            database,
            self.authentication_type
        );

        if self.authentication_type.requires_user() {
            out.push_str(&format!(" as {}", self.user));
        }
        if self.is_password_based() && !self.password.is_empty() {
            out.push_str(" [password set]");
        }
        out
    }
}

impl fmt::Debug for ConnectionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() {
            "<empty>"
        } else {
            "<redacted>"
        };

        f.debug_struct("ConnectionCredentials")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("authentication_type", &self.authentication_type)
            .field("user", &self.user)
            .field("password", &password)
            .field("port", &self.port)
            .field("encrypt", &self.encrypt)
            .field("connect_timeout", &self.connect_timeout)
            .field("application_name", &self.application_name)
            .finish()
    }
}

/// A named, persistable set of connection credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionProfile {
    /// Display name; also part of the profile identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,

    #[serde(flatten)]
    pub credentials: ConnectionCredentials,

    #[serde(default, skip_serializing_if = "SavePassword::is_unspecified")]
    pub save_password: SavePassword,

    /// Set when the user answered the password question with an empty value
    #[serde(skip)]
    pub empty_password_input: bool,
}

impl ConnectionProfile {
    pub fn new(credentials: ConnectionCredentials) -> Self {
        Self {
            credentials,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.profile_name = Some(name.into());
        self
    }

    pub fn with_save_password(mut self, save_password: impl Into<SavePassword>) -> Self {
        self.save_password = save_password.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.credentials.password = password.into();
        self
    }

    /// Key under which this profile's password lives in the secret store
    pub fn credential_id(&self) -> CredentialId {
        CredentialId::for_profile(self)
    }

    pub fn is_password_based(&self) -> bool {
        self.credentials.is_password_based()
    }

    pub fn has_password(&self) -> bool {
        !self.credentials.password.is_empty()
    }

    /// Profile name, falling back to the server address
    pub fn display_name(&self) -> String {
        match &self.profile_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self.credentials.server_address(),
        }
    }

    /// Copy of this profile without the password, as written to disk
    pub fn without_password(&self) -> Self {
        let mut copy = self.clone();
        copy.credentials.password.clear();
        copy.empty_password_input = false;
        copy
    }

    /// Whether two profiles differ only in their password
    pub fn same_non_secret_fields(&self, other: &Self) -> bool {
        self.without_password() == other.without_password()
    }
}
