//! Executor error types
//!
//! Only infrastructure failures are errors. A command exiting non-zero is
//! reported through `CommandResult` instead.

use thiserror::Error;

/// Errors that can occur while talking to an execution target
#[derive(Error, Debug)]
pub enum ExecError {
    /// SSH authentication was rejected
    #[error("Authentication failed for {user}@{host}. Check SSH key or agent.")]
    Authentication { host: String, user: String },

    /// Could not establish or keep the connection
    #[error("Failed to connect to '{host}': {reason}")]
    Connection { host: String, reason: String },

    /// An empty argv was passed to `run`
    #[error("Cannot run an empty command")]
    EmptyCommand,

    /// Reading a file on the target failed
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ExecError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
