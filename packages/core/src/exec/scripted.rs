//! In-memory executor for tests
//!
//! Returns canned results keyed by argv prefix and records every call.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{CommandExecutor, CommandResult, ExecError};

/// Shared record of every argv the executor received
pub(crate) type CallLog = Rc<RefCell<Vec<Vec<String>>>>;

pub(crate) struct ScriptedExecutor {
    rules: Vec<(Vec<String>, CommandResult)>,
    files: RefCell<HashMap<PathBuf, String>>,
    pushed: Rc<RefCell<Vec<(PathBuf, PathBuf)>>>,
    calls: CallLog,
    closes: Rc<Cell<usize>>,
    unreachable: bool,
    local: bool,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self {
            rules: Vec::new(),
            files: RefCell::new(HashMap::new()),
            pushed: Rc::new(RefCell::new(Vec::new())),
            calls: Rc::new(RefCell::new(Vec::new())),
            closes: Rc::new(Cell::new(0)),
            unreachable: false,
            local: true,
        }
    }

    /// Pretend the target is a remote machine
    pub(crate) fn remote(mut self) -> Self {
        self.local = false;
        self
    }

    /// Every `run` fails as if the connection could not be made
    pub(crate) fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Answer commands starting with `prefix`; first registered rule wins
    pub(crate) fn on(mut self, prefix: &[&str], result: CommandResult) -> Self {
        self.rules
            .push((prefix.iter().map(|s| s.to_string()).collect(), result));
        self
    }

    pub(crate) fn ok(self, prefix: &[&str], stdout: &str) -> Self {
        self.on(prefix, CommandResult::new(0, stdout, ""))
    }

    pub(crate) fn fail(self, prefix: &[&str]) -> Self {
        self.on(prefix, CommandResult::new(1, "", "scripted failure"))
    }

    pub(crate) fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .borrow_mut()
            .insert(PathBuf::from(path), content.to_string());
        self
    }

    pub(crate) fn calls(&self) -> CallLog {
        Rc::clone(&self.calls)
    }

    /// Number of `close()` calls so far
    pub(crate) fn closes(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.closes)
    }

    pub(crate) fn pushed(&self) -> Rc<RefCell<Vec<(PathBuf, PathBuf)>>> {
        Rc::clone(&self.pushed)
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn run(&self, cmd: &[String], _check: bool) -> Result<CommandResult, ExecError> {
        if cmd.is_empty() {
            return Err(ExecError::EmptyCommand);
        }
        self.calls.borrow_mut().push(cmd.to_vec());
        if self.unreachable {
            return Err(ExecError::Connection {
                host: "scripted".to_string(),
                reason: "unreachable".to_string(),
            });
        }

        let result = self
            .rules
            .iter()
            .find(|(prefix, _)| cmd.starts_with(prefix))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| CommandResult::new(0, "", ""));
        Ok(result)
    }

    fn push_file(&self, local_path: &Path, remote_path: &Path) -> Result<bool, ExecError> {
        self.pushed
            .borrow_mut()
            .push((local_path.to_path_buf(), remote_path.to_path_buf()));
        if let Ok(content) = std::fs::read_to_string(local_path) {
            self.files
                .borrow_mut()
                .insert(remote_path.to_path_buf(), content);
        }
        Ok(true)
    }

    fn read_file(&self, remote_path: &Path) -> Result<String, ExecError> {
        self.files.borrow().get(remote_path).cloned().ok_or_else(|| {
            ExecError::io(
                remote_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no scripted file"),
            )
        })
    }

    fn close(&self) {
        self.closes.set(self.closes.get() + 1);
    }

    fn is_local(&self) -> bool {
        self.local
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Whether any recorded call starts with `prefix`
pub(crate) fn issued(calls: &CallLog, prefix: &[&str]) -> bool {
    calls
        .borrow()
        .iter()
        .any(|call| call.len() >= prefix.len() && call.iter().zip(prefix).all(|(a, b)| a == b))
}
