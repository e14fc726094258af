//! Local command execution
//!
//! Runs commands as child processes on the operator's machine.

use std::fs;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use super::{CommandExecutor, CommandResult, ExecError, report_failure};

/// Exit code reported when the program could not be spawned at all
const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Executor for the machine this process runs on
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for LocalExecutor {
    fn run(&self, cmd: &[String], check: bool) -> Result<CommandResult, ExecError> {
        let (program, args) = cmd.split_first().ok_or(ExecError::EmptyCommand)?;

        tracing::debug!("Running locally: {}", cmd.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output();

        let result = match output {
            Ok(output) => CommandResult::new(
                exit_code(output.status),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            ),
            Err(e) => {
                tracing::debug!("Failed to spawn {}: {}", program, e);
                CommandResult::new(
                    SPAWN_FAILURE_EXIT_CODE,
                    "",
                    format!("Failed to spawn {program}: {e}"),
                )
            }
        };

        report_failure("localhost", cmd, &result, check);
        Ok(result)
    }

    fn push_file(&self, local_path: &Path, remote_path: &Path) -> Result<bool, ExecError> {
        if let Some(parent) = remote_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!("Failed to create {}: {}", parent.display(), e);
                return Ok(false);
            }
        }

        match fs::copy(local_path, remote_path) {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(
                    "Failed to copy {} to {}: {}",
                    local_path.display(),
                    remote_path.display(),
                    e
                );
                Ok(false)
            }
        }
    }

    fn read_file(&self, remote_path: &Path) -> Result<String, ExecError> {
        fs::read_to_string(remote_path).map_err(|e| ExecError::io(remote_path, e))
    }

    fn close(&self) {}

    fn is_local(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "localhost".to_string()
    }
}

/// Map a process status to a shell-style exit code
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
