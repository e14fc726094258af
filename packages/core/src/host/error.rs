//! Host-specific error types
//!
//! Errors that can occur while managing the set of remote PVE hosts.

use thiserror::Error;

/// Errors that can occur during host operations
#[derive(Error, Debug)]
pub enum HostError {
    /// Host name does not resolve in the SSH config
    #[error("Host '{name}' not found{}", available_hint(.available))]
    NotFound {
        name: String,
        available: Vec<String>,
    },

    /// Host already exists
    #[error("Host '{0}' already exists")]
    AlreadyExists(String),

    /// Invalid host configuration
    #[error("Invalid host configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read the SSH config file
    #[error("Failed to read SSH config: {0}")]
    SshConfigRead(String),

    /// Failed to write the SSH config file
    #[error("Failed to write SSH config: {0}")]
    SshConfigWrite(String),

    /// Failed to persist the default host
    #[error("Failed to save default host: {0}")]
    SaveFailed(String),
}

fn available_hint(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(". Available hosts: {}", available.join(", "))
    }
}
