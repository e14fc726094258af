//! System operations over an executor
//!
//! The capability handed to application installers. The same calls work
//! against the local machine, a remote host or a container, depending on the
//! executor it wraps.

use std::io::Write;
use std::path::Path;

use crate::argv;
use crate::exec::{CommandExecutor, CommandResult, ExecError};

pub struct System<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> System<'a> {
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &dyn CommandExecutor {
        self.executor
    }

    /// Run a command; with `check` a failure is logged with its stderr
    pub fn run(&self, cmd: &[String], check: bool) -> Result<CommandResult, ExecError> {
        tracing::debug!("Running: {}", cmd.join(" "));
        self.executor.run(cmd, check)
    }

    pub fn apt_update(&self) -> Result<CommandResult, ExecError> {
        tracing::info!("Updating package lists");
        self.run(&argv!["apt-get", "update", "-qq"], true)
    }

    pub fn apt_install<S: AsRef<str>>(&self, packages: &[S]) -> Result<CommandResult, ExecError> {
        let packages: Vec<String> = packages.iter().map(|p| p.as_ref().to_string()).collect();
        tracing::info!("Installing packages: {}", packages.join(", "));
        let mut cmd = argv!["apt-get", "install", "-y", "-qq"];
        cmd.extend(packages);
        self.run(&cmd, true)
    }

    pub fn systemctl(&self, action: &str, service: &str) -> Result<CommandResult, ExecError> {
        tracing::info!("systemctl {action} {service}");
        self.run(&argv!["systemctl", action, service], true)
    }

    /// Write `content` to `path` on the target and set its mode
    ///
    /// The content is staged in a local temp file and pushed.
    pub fn write_file(&self, path: &Path, content: &str, mode: u32) -> Result<bool, ExecError> {
        tracing::debug!("Writing file: {}", path.display());

        let mut staged = tempfile::NamedTempFile::new().map_err(|e| ExecError::io(path, e))?;
        staged
            .write_all(content.as_bytes())
            .and_then(|_| staged.flush())
            .map_err(|e| ExecError::io(path, e))?;

        if !self.executor.push_file(staged.path(), path)? {
            tracing::error!("Failed to write {} on {}", path.display(), self.executor.describe());
            return Ok(false);
        }
        Ok(self.chmod(path, mode)?.success())
    }

    pub fn read_file(&self, path: &Path) -> Result<String, ExecError> {
        self.executor.read_file(path)
    }

    pub fn file_exists(&self, path: &Path) -> Result<bool, ExecError> {
        Ok(self
            .run(&argv!["test", "-e", path.display()], false)?
            .success())
    }

    /// Create a directory with its parents and set its mode
    pub fn mkdir(&self, path: &Path, mode: u32) -> Result<bool, ExecError> {
        if !self.run(&argv!["mkdir", "-p", path.display()], true)?.success() {
            return Ok(false);
        }
        Ok(self.chmod(path, mode)?.success())
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<CommandResult, ExecError> {
        self.run(&argv!["chmod", format!("{mode:o}"), path.display()], true)
    }
}
