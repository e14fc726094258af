//! Named host management
//!
//! Combines the SSH config (host inventory) with the default-host store and
//! turns a host name into a ready-to-use executor.

use std::path::PathBuf;

use serde::Serialize;

use super::error::HostError;
use super::schema::{DEFAULT_PORT, DEFAULT_USER, HostEntry, HostSpec};
use super::ssh_config::SshConfigParser;
use super::storage::DefaultHostStore;
use crate::argv;
use crate::exec::{CommandExecutor, LocalExecutor, SshExecutor};

/// Outcome of probing a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostTestReport {
    pub name: String,
    pub connected: bool,
    pub pve_version: Option<String>,
    pub error: Option<String>,
}

/// Inventory of remote PVE hosts
#[derive(Debug, Clone)]
pub struct HostManager {
    ssh_config: SshConfigParser,
    defaults: DefaultHostStore,
}

impl HostManager {
    pub fn new(ssh_config: SshConfigParser, defaults: DefaultHostStore) -> Self {
        Self {
            ssh_config,
            defaults,
        }
    }

    /// Manager over ~/.ssh/config and ~/.pve-lxc/config.yaml
    pub fn from_default_paths() -> Result<Self, HostError> {
        Ok(Self::new(
            SshConfigParser::from_default_path()?,
            DefaultHostStore::from_default_path()?,
        ))
    }

    pub fn add(&self, spec: &HostSpec) -> Result<(), HostError> {
        self.ssh_config.add_host(spec)
    }

    /// Remove a host, clearing the default first if it points at it
    ///
    /// The two writes are not atomic: a crash in between leaves the default
    /// cleared while the host block remains.
    pub fn remove(&self, name: &str) -> Result<bool, HostError> {
        if self.get_default().as_deref() == Some(name) {
            self.defaults.set(None)?;
            tracing::info!("Cleared default host '{name}'");
        }
        self.ssh_config.remove_host(name)
    }

    pub fn list(&self) -> Result<Vec<HostEntry>, HostError> {
        self.ssh_config.list_hosts()
    }

    pub fn get(&self, name: &str) -> Result<Option<HostEntry>, HostError> {
        self.ssh_config.get_host(name)
    }

    /// Probe a host with `pveversion`
    ///
    /// Every failure is folded into the report.
    pub fn test(&self, name: &str) -> HostTestReport {
        match self.get_executor(Some(name)) {
            Ok(executor) => check_pve(name, executor.as_ref()),
            Err(e) => HostTestReport {
                name: name.to_string(),
                connected: false,
                pve_version: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Resolve a host name to an executor
    ///
    /// No name falls back to the default host, then to the local machine.
    pub fn get_executor(&self, name: Option<&str>) -> Result<Box<dyn CommandExecutor>, HostError> {
        let name = match name.filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => match self.get_default() {
                Some(default) => default,
                None => {
                    tracing::debug!("No host selected, using local executor");
                    return Ok(Box::new(LocalExecutor::new()));
                }
            },
        };

        let entry = self.require(&name)?;
        let hostname = entry.hostname().unwrap_or(&entry.name).to_string();
        let user = entry.user().unwrap_or(DEFAULT_USER).to_string();
        let port = match entry.port() {
            Some(port) => port.parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(|| {
                HostError::InvalidConfig(format!("Host '{name}' has invalid port '{port}'"))
            })?,
            None => DEFAULT_PORT,
        };
        let key_path = entry.identity_file().map(expand_tilde);

        tracing::debug!("Using SSH executor for '{name}' ({user}@{hostname}:{port})");
        Ok(Box::new(SshExecutor::new(hostname, user, port, key_path)))
    }

    pub fn set_default(&self, name: &str) -> Result<(), HostError> {
        self.require(name)?;
        self.defaults.set(Some(name))
    }

    pub fn get_default(&self) -> Option<String> {
        self.defaults.get()
    }

    fn require(&self, name: &str) -> Result<HostEntry, HostError> {
        let hosts = self.list()?;
        if let Some(entry) = hosts.iter().find(|h| h.name == name) {
            return Ok(entry.clone());
        }
        Err(HostError::NotFound {
            name: name.to_string(),
            available: hosts.into_iter().map(|h| h.name).collect(),
        })
    }
}

/// Run `pveversion` through `executor`, then close it on every path
///
/// A host that answers but lacks the PVE tools is not connected.
fn check_pve(name: &str, executor: &dyn CommandExecutor) -> HostTestReport {
    let mut report = HostTestReport {
        name: name.to_string(),
        connected: false,
        pve_version: None,
        error: None,
    };

    match executor.run(&argv!["pveversion"], false) {
        Ok(result) if result.success() => {
            report.connected = true;
            report.pve_version = Some(result.stdout.trim().to_string());
        }
        Ok(_) => report.error = Some("PVE tools not found".to_string()),
        Err(e) => report.error = Some(e.to_string()),
    }

    executor.close();
    report
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::scripted::ScriptedExecutor;
    use std::fs;
    use tempfile::TempDir;

    fn manager() -> (TempDir, HostManager) {
        let dir = TempDir::new().unwrap();
        let manager = HostManager::new(
            SshConfigParser::new(dir.path().join("ssh_config")),
            DefaultHostStore::new(dir.path().join("config.yaml")),
        );
        (dir, manager)
    }

    #[test]
    fn no_host_and_no_default_is_local() {
        let (_dir, manager) = manager();
        let executor = manager.get_executor(None).unwrap();
        assert!(executor.is_local());

        let executor = manager.get_executor(Some("")).unwrap();
        assert!(executor.is_local());
    }

    #[test]
    fn unknown_host_lists_available_names() {
        let (_dir, manager) = manager();
        manager.add(&HostSpec::new("pve1", "10.0.0.1")).unwrap();
        manager.add(&HostSpec::new("pve2", "10.0.0.2")).unwrap();

        match manager.get_executor(Some("pve9")) {
            Err(HostError::NotFound { name, available }) => {
                assert_eq!(name, "pve9");
                assert_eq!(available, vec!["pve1", "pve2"]);
            }
            other => panic!("expected NotFound, got {:?}", other.map(|e| e.describe())),
        }
    }

    #[test]
    fn known_host_builds_remote_executor_without_connecting() {
        let (_dir, manager) = manager();
        manager
            .add(&HostSpec::new("pve1", "10.0.0.1").with_port(2222))
            .unwrap();

        let executor = manager.get_executor(Some("pve1")).unwrap();
        assert!(!executor.is_local());
        assert_eq!(executor.describe(), "root@10.0.0.1:2222");
    }

    #[test]
    fn default_host_is_used_when_no_name_given() {
        let (_dir, manager) = manager();
        manager.add(&HostSpec::new("pve1", "10.0.0.1")).unwrap();
        manager.set_default("pve1").unwrap();

        let executor = manager.get_executor(None).unwrap();
        assert!(!executor.is_local());
    }

    #[test]
    fn invalid_port_is_a_config_error() {
        let (dir, manager) = manager();
        fs::write(
            dir.path().join("ssh_config"),
            "Host bad\n    HostName 10.0.0.1\n    Port nope\n",
        )
        .unwrap();
        assert!(matches!(
            manager.get_executor(Some("bad")),
            Err(HostError::InvalidConfig(_))
        ));
    }

    #[test]
    fn default_persists_across_instances() {
        let (dir, manager) = manager();
        manager.add(&HostSpec::new("pve1", "10.0.0.1")).unwrap();
        manager.set_default("pve1").unwrap();

        let fresh = HostManager::new(
            SshConfigParser::new(dir.path().join("ssh_config")),
            DefaultHostStore::new(dir.path().join("config.yaml")),
        );
        assert_eq!(fresh.get_default().as_deref(), Some("pve1"));
    }

    #[test]
    fn set_default_requires_known_host() {
        let (_dir, manager) = manager();
        assert!(matches!(
            manager.set_default("ghost"),
            Err(HostError::NotFound { .. })
        ));
        assert_eq!(manager.get_default(), None);
    }

    #[test]
    fn removing_default_host_clears_default() {
        let (_dir, manager) = manager();
        manager.add(&HostSpec::new("pve1", "10.0.0.1")).unwrap();
        manager.add(&HostSpec::new("pve2", "10.0.0.2")).unwrap();
        manager.set_default("pve1").unwrap();

        assert!(manager.remove("pve1").unwrap());
        assert_eq!(manager.get_default(), None);
        assert!(manager.get("pve1").unwrap().is_none());
        assert!(manager.get("pve2").unwrap().is_some());
    }

    #[test]
    fn removing_other_host_keeps_default() {
        let (_dir, manager) = manager();
        manager.add(&HostSpec::new("pve1", "10.0.0.1")).unwrap();
        manager.add(&HostSpec::new("pve2", "10.0.0.2")).unwrap();
        manager.set_default("pve1").unwrap();

        assert!(manager.remove("pve2").unwrap());
        assert_eq!(manager.get_default().as_deref(), Some("pve1"));
    }

    #[test]
    fn test_unknown_host_reports_error() {
        let (_dir, manager) = manager();
        let report = manager.test("ghost");
        assert!(!report.connected);
        assert!(report.pve_version.is_none());
        assert!(report.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_unreachable_host_reports_connection_error() {
        let (_dir, manager) = manager();
        manager.add(&HostSpec::new("dead", "host.invalid")).unwrap();

        let report = manager.test("dead");
        assert!(!report.connected);
        assert!(report.error.is_some());
    }

    #[test]
    fn pveversion_success_is_connected_and_closes() {
        let executor = ScriptedExecutor::new()
            .remote()
            .ok(&["pveversion"], "pve-manager/8.2.4/faa83925c9641325 (running kernel: 6.8.12-1-pve)\n");
        let closes = executor.closes();

        let report = check_pve("pve1", &executor);
        assert!(report.connected);
        assert_eq!(
            report.pve_version.as_deref(),
            Some("pve-manager/8.2.4/faa83925c9641325 (running kernel: 6.8.12-1-pve)")
        );
        assert!(report.error.is_none());
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn missing_pve_tools_is_not_connected() {
        let executor = ScriptedExecutor::new().remote().fail(&["pveversion"]);
        let closes = executor.closes();

        let report = check_pve("plain", &executor);
        assert!(!report.connected);
        assert!(report.pve_version.is_none());
        assert_eq!(report.error.as_deref(), Some("PVE tools not found"));
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn connection_error_still_closes() {
        let executor = ScriptedExecutor::new().remote().unreachable();
        let closes = executor.closes();

        let report = check_pve("dead", &executor);
        assert!(!report.connected);
        assert!(report.error.unwrap().contains("Failed to connect"));
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde("~/.ssh/id_ed25519");
        assert!(expanded.is_absolute() || dirs::home_dir().is_none());
        assert!(expanded.ends_with(".ssh/id_ed25519"));
        assert_eq!(expand_tilde("/abs/key"), PathBuf::from("/abs/key"));
    }
}
