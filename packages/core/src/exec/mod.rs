//! Command execution module
//!
//! Provides the executor abstraction that runs commands and moves files on a
//! target machine:
//! - `LocalExecutor` runs child processes on the operator's machine
//! - `SshExecutor` runs commands over SSH and transfers files over SFTP
//!
//! Callers only ever see `dyn CommandExecutor`. A non-zero exit is returned
//! as data in `CommandResult`; only infrastructure failures become errors.

mod error;
mod local;
mod quote;
mod result;
mod ssh;

#[cfg(test)]
pub(crate) mod scripted;

use std::path::Path;

pub use error::ExecError;
pub use local::LocalExecutor;
pub use quote::{shell_join, shell_quote};
pub use result::CommandResult;
pub use ssh::SshExecutor;

/// Build an argv vector from heterogeneous parts
///
/// Every part is converted with `ToString`, so string literals, owned
/// strings and numbers can be mixed freely:
///
/// ```ignore
/// let cmd = argv!["pct", "start", ctid];
/// ```
#[macro_export]
macro_rules! argv {
    ($($part:expr),* $(,)?) => {
        vec![$(::std::string::ToString::to_string(&$part)),*]
    };
}

/// Capability to run commands and move files on one target machine
///
/// Executors are not synchronized: a single instance must not be used from
/// several logical operations at once. Use separate instances instead.
pub trait CommandExecutor {
    /// Run a command given in argv form and capture its result
    ///
    /// A non-zero exit is never an error. When `check` is set and the
    /// command fails, implementations log the failure and still return it.
    fn run(&self, cmd: &[String], check: bool) -> Result<CommandResult, ExecError>;

    /// Copy a file from the operator's machine to the target
    ///
    /// Missing parent directories at the destination are created. Returns
    /// `Ok(false)` on transfer failures; connection failures are errors.
    fn push_file(&self, local_path: &Path, remote_path: &Path) -> Result<bool, ExecError>;

    /// Read a whole file from the target as text
    fn read_file(&self, remote_path: &Path) -> Result<String, ExecError>;

    /// Release held connection resources. Idempotent.
    fn close(&self);

    /// Whether the target shares the operator's filesystem
    fn is_local(&self) -> bool;

    /// Short human-readable description of the target, for logs
    fn describe(&self) -> String;
}

/// Log a failed command when the caller asked for checking
pub(crate) fn report_failure(target: &str, cmd: &[String], result: &CommandResult, check: bool) {
    if check && !result.success() {
        tracing::error!(
            target_host = target,
            exit_code = result.exit_code,
            stderr = result.stderr.trim(),
            "Command failed: {}",
            cmd.join(" ")
        );
    }
}
