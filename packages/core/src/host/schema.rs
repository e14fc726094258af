//! Host data structures
//!
//! `HostSpec` describes a host to be added; `HostEntry` is one `Host` block
//! as parsed back from the SSH config.

use serde::Serialize;
use std::collections::BTreeMap;

/// Default SSH user for PVE hosts
pub const DEFAULT_USER: &str = "root";

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// A remote PVE host to be written to the SSH config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    /// Alias used after `Host` (unique key)
    pub name: String,

    /// SSH hostname or IP address
    pub hostname: String,

    /// SSH username (default: root)
    pub user: String,

    /// SSH port (default: 22)
    pub port: u16,

    /// Path to SSH identity file (private key)
    pub identity_file: Option<String>,
}

impl HostSpec {
    /// Create a host spec with default user and port
    pub fn new(name: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            user: DEFAULT_USER.to_string(),
            port: DEFAULT_PORT,
            identity_file: None,
        }
    }

    /// Builder pattern: set user
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set identity file
    pub fn with_identity_file(mut self, path: impl Into<String>) -> Self {
        self.identity_file = Some(path.into());
        self
    }
}

/// One `Host` block parsed from the SSH config
///
/// Directive names are stored lowercased; values are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostEntry {
    /// Text after the `Host` keyword
    pub name: String,

    /// Lowercased directive name to value
    #[serde(flatten)]
    pub params: BTreeMap<String, String>,
}

impl HostEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Look up a directive by (case-insensitive) name
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn hostname(&self) -> Option<&str> {
        self.get("hostname")
    }

    pub fn user(&self) -> Option<&str> {
        self.get("user")
    }

    pub fn port(&self) -> Option<&str> {
        self.get("port")
    }

    pub fn identity_file(&self) -> Option<&str> {
        self.get("identityfile")
    }
}
