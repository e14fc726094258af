//! Executor running inside a container
//!
//! Routes commands through `pct exec` and files through `pct push`, so code
//! written against `CommandExecutor` can target a container unchanged.

use std::io;
use std::path::Path;

use super::Pve;
use crate::argv;
use crate::exec::{CommandExecutor, CommandResult, ExecError, report_failure};

/// A container on a PVE host seen as an execution target
pub struct ContainerExecutor<'a> {
    pve: &'a Pve,
    ctid: u32,
}

impl<'a> ContainerExecutor<'a> {
    pub fn new(pve: &'a Pve, ctid: u32) -> Self {
        Self { pve, ctid }
    }

    pub fn ctid(&self) -> u32 {
        self.ctid
    }
}

impl CommandExecutor for ContainerExecutor<'_> {
    fn run(&self, cmd: &[String], check: bool) -> Result<CommandResult, ExecError> {
        if cmd.is_empty() {
            return Err(ExecError::EmptyCommand);
        }
        let result = self.pve.exec(self.ctid, cmd)?;
        report_failure(&self.describe(), cmd, &result, check);
        Ok(result)
    }

    fn push_file(&self, local_path: &Path, remote_path: &Path) -> Result<bool, ExecError> {
        if let Some(parent) = remote_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let mkdir = self.pve.exec(self.ctid, &argv!["mkdir", "-p", parent.display()])?;
            if !mkdir.success() {
                tracing::warn!(
                    "Failed to create {} in container {}: {}",
                    parent.display(),
                    self.ctid,
                    mkdir.stderr.trim()
                );
                return Ok(false);
            }
        }
        self.pve.push(self.ctid, local_path, remote_path)
    }

    fn read_file(&self, remote_path: &Path) -> Result<String, ExecError> {
        let result = self
            .pve
            .exec(self.ctid, &argv!["cat", remote_path.display()])?;
        if result.success() {
            Ok(result.stdout)
        } else {
            Err(ExecError::io(
                remote_path,
                io::Error::new(io::ErrorKind::NotFound, result.stderr.trim().to_string()),
            ))
        }
    }

    /// The connection belongs to the PVE wrapper, which outlives this view
    fn close(&self) {}

    fn is_local(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("ct{} on {}", self.ctid, self.pve.executor().describe())
    }
}
