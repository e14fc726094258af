//! Proxmox VE command wrapper
//!
//! Issues `pct`, `pvesh`, `pveam` and `pveversion` through a bound executor.
//! A failed command is reported as `false`/`None`; only executor failures
//! (connection, authentication) are errors.

mod container;
mod exec;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::argv;
use crate::exec::{CommandExecutor, CommandResult, ExecError};

pub use container::{
    Container, ContainerStatus, DEFAULT_CORES, DEFAULT_DISK_GB, DEFAULT_MEMORY_MB,
};
pub use exec::ContainerExecutor;

/// Storage used when no template storage can be detected
pub const FALLBACK_TEMPLATE_STORAGE: &str = "local";

/// First ctid handed out on an empty cluster
pub const FIRST_CTID: u32 = 100;

/// Parameters for `pct create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSpec {
    pub ctid: u32,
    /// Template volume id, e.g. `local:vztmpl/debian-12-standard_12.2-1_amd64.tar.zst`
    pub template: String,
    pub hostname: String,
    pub storage: String,
    /// Root filesystem size in GB
    pub rootfs_size: u32,
    pub cores: u32,
    /// Memory in MB
    pub memory: u32,
    pub net_bridge: String,
    /// `dhcp` or an address in CIDR form
    pub net_ip: String,
    pub net_gw: Option<String>,
}

impl CreateSpec {
    /// Value of `--net0`
    pub fn net0(&self) -> String {
        let mut net0 = format!("name=eth0,bridge={},ip={}", self.net_bridge, self.net_ip);
        if self.net_ip != "dhcp" {
            if let Some(gw) = &self.net_gw {
                net0.push_str(&format!(",gw={gw}"));
            }
        }
        net0
    }
}

/// Proxmox VE operations over one executor
pub struct Pve {
    executor: Box<dyn CommandExecutor>,
}

impl Pve {
    pub fn new(executor: Box<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    fn run(&self, cmd: Vec<String>) -> Result<CommandResult, ExecError> {
        tracing::debug!("PVE: {}", cmd.join(" "));
        self.executor.run(&cmd, true)
    }

    pub fn create(&self, spec: &CreateSpec) -> Result<bool, ExecError> {
        tracing::info!("Creating container {}", spec.ctid);

        let result = self.run(argv![
            "pct",
            "create",
            spec.ctid,
            spec.template,
            "--hostname",
            spec.hostname,
            "--storage",
            spec.storage,
            "--rootfs",
            format!("{}:{}", spec.storage, spec.rootfs_size),
            "--cores",
            spec.cores,
            "--memory",
            spec.memory,
            "--net0",
            spec.net0(),
            "--unprivileged",
            "1",
            "--features",
            "nesting=1",
            "--start",
            "1",
        ])?;

        if !result.success() {
            tracing::error!("Failed to create container {}: {}", spec.ctid, result.stderr.trim());
        }
        Ok(result.success())
    }

    /// Destroy a container
    ///
    /// A running container is only stopped and destroyed with `force`;
    /// otherwise nothing is issued and `false` is returned.
    pub fn destroy(&self, ctid: u32, force: bool) -> Result<bool, ExecError> {
        if let Some(container) = self.get_container(ctid)? {
            if container.is_running() {
                if !force {
                    tracing::info!("Container {ctid} is running, refusing to destroy without force");
                    return Ok(false);
                }
                self.stop(ctid)?;
            }
        }

        tracing::info!("Destroying container {ctid}");
        Ok(self.run(argv!["pct", "destroy", ctid, "--purge"])?.success())
    }

    pub fn start(&self, ctid: u32) -> Result<bool, ExecError> {
        Ok(self.run(argv!["pct", "start", ctid])?.success())
    }

    pub fn stop(&self, ctid: u32) -> Result<bool, ExecError> {
        Ok(self.run(argv!["pct", "stop", ctid])?.success())
    }

    /// Run a command inside the container; a non-zero exit is returned as is
    pub fn exec(&self, ctid: u32, cmd: &[String]) -> Result<CommandResult, ExecError> {
        let mut full = argv!["pct", "exec", ctid, "--"];
        full.extend_from_slice(cmd);
        tracing::debug!("PVE: {}", full.join(" "));
        self.executor.run(&full, false)
    }

    /// Copy a file from the operator's machine into the container
    ///
    /// `pct push` only sees the PVE host's filesystem, so a remote host gets
    /// the file staged under /tmp first.
    pub fn push(&self, ctid: u32, src: &Path, dst: &Path) -> Result<bool, ExecError> {
        if self.executor.is_local() {
            return Ok(self
                .run(argv!["pct", "push", ctid, src.display(), dst.display()])?
                .success());
        }

        let staged = staging_path(ctid, src);
        if !self.executor.push_file(src, &staged)? {
            tracing::error!("Failed to stage {} on {}", src.display(), self.executor.describe());
            return Ok(false);
        }

        let pushed = self
            .run(argv!["pct", "push", ctid, staged.display(), dst.display()])
            .map(|result| result.success());
        let cleanup = self.executor.run(&argv!["rm", "-f", staged.display()], false);

        let pushed = pushed?;
        cleanup?;
        Ok(pushed)
    }

    /// All containers with resource details from their config
    pub fn list_containers(&self) -> Result<Vec<Container>, ExecError> {
        let result = self.run(argv!["pct", "list"])?;
        if !result.success() {
            return Ok(Vec::new());
        }

        container::parse_list(&result.stdout)
            .into_iter()
            .map(|row| {
                let config = self.run(argv!["pct", "config", row.ctid])?;
                let fields = if config.success() {
                    container::parse_config(&config.stdout)
                } else {
                    tracing::warn!("No config for container {}, using defaults", row.ctid);
                    Default::default()
                };
                Ok(container::build(row, fields))
            })
            .collect()
    }

    pub fn get_container(&self, ctid: u32) -> Result<Option<Container>, ExecError> {
        Ok(self
            .list_containers()?
            .into_iter()
            .find(|c| c.ctid == ctid))
    }

    /// Next free ctid from the cluster, else one past the highest in use
    pub fn next_ctid(&self) -> Result<u32, ExecError> {
        let result = self.run(argv!["pvesh", "get", "/cluster/nextid"])?;
        if result.success() {
            if let Ok(ctid) = result.stdout.trim().trim_matches('"').parse() {
                return Ok(ctid);
            }
            tracing::warn!("Unexpected nextid output: {}", result.stdout.trim());
        }

        let next = self
            .list_containers()?
            .iter()
            .map(|c| c.ctid)
            .max()
            .map_or(FIRST_CTID, |max| max + 1);
        Ok(next)
    }

    /// Volume ids of templates on `storage`
    pub fn list_templates(&self, storage: &str) -> Result<Vec<String>, ExecError> {
        let result = self.run(argv!["pveam", "list", storage])?;
        if !result.success() {
            return Ok(Vec::new());
        }
        Ok(result
            .stdout
            .lines()
            .skip(1)
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect())
    }

    /// Appliance file names offered by `pveam available`
    pub fn available_templates(&self) -> Result<Vec<String>, ExecError> {
        let result = self.run(argv!["pveam", "available", "--section", "system"])?;
        if !result.success() {
            return Ok(Vec::new());
        }
        Ok(result
            .stdout
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .map(str::to_string)
            .collect())
    }

    pub fn download_template(&self, template: &str, storage: &str) -> Result<bool, ExecError> {
        tracing::info!("Downloading template {template} to {storage}");
        Ok(self
            .run(argv!["pveam", "download", storage, template])?
            .success())
    }

    /// First template on the storage whose file name starts with `name`
    pub fn find_template(
        &self,
        name: &str,
        storage: Option<&str>,
    ) -> Result<Option<String>, ExecError> {
        let storage = match storage {
            Some(storage) => storage.to_string(),
            None => self
                .find_template_storage()?
                .unwrap_or_else(|| FALLBACK_TEMPLATE_STORAGE.to_string()),
        };

        Ok(self.list_templates(&storage)?.into_iter().find(|template| {
            template
                .rsplit('/')
                .next()
                .is_some_and(|file| file.starts_with(name))
        }))
    }

    /// First enabled storage that can hold container root filesystems
    ///
    /// Falls back to any enabled storage.
    pub fn find_rootfs_storage(&self) -> Result<Option<String>, ExecError> {
        let storages = self.storages()?;
        Ok(storages
            .iter()
            .find(|s| s.supports("rootdir"))
            .or_else(|| storages.first())
            .map(|s| s.name.clone()))
    }

    /// First enabled storage that holds container templates
    pub fn find_template_storage(&self) -> Result<Option<String>, ExecError> {
        Ok(self
            .storages()?
            .into_iter()
            .find(|s| s.supports("vztmpl"))
            .map(|s| s.name))
    }

    /// Enabled storages from the inventory
    fn storages(&self) -> Result<Vec<StorageInfo>, ExecError> {
        let result = self.run(argv!["pvesh", "get", "/storage", "--output-format", "json"])?;
        if !result.success() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&result.stdout) {
            Ok(value) => Ok(parse_storages(&value)),
            Err(e) => {
                tracing::warn!("Unreadable storage inventory: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// `pveversion` output, if the PVE tools are installed
    pub fn version(&self) -> Result<Option<String>, ExecError> {
        let result = self.executor.run(&argv!["pveversion"], false)?;
        Ok(result
            .success()
            .then(|| result.stdout.trim().to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StorageInfo {
    name: String,
    content: Vec<String>,
}

impl StorageInfo {
    fn supports(&self, kind: &str) -> bool {
        self.content.iter().any(|c| c == kind)
    }
}

/// Enabled entries of a `pvesh get /storage` array
fn parse_storages(value: &Value) -> Vec<StorageInfo> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|entry| !is_disabled(entry.get("disable")))
        .filter_map(|entry| {
            let name = entry.get("storage")?.as_str()?.to_string();
            let content = entry
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            Some(StorageInfo { name, content })
        })
        .collect()
}

/// `disable` shows up as 1, true or "1" depending on the PVE version
fn is_disabled(flag: Option<&Value>) -> bool {
    match flag {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_u64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => s != "0" && !s.is_empty(),
        _ => false,
    }
}

/// Unique temp path for staging a push on the PVE host
fn staging_path(ctid: u32, src: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let file_name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    PathBuf::from(format!(
        "/tmp/pve-lxc-{ctid}-{}-{nanos}-{file_name}",
        std::process::id()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::scripted::{ScriptedExecutor, issued};

    const PCT_LIST: &str = "VMID Status Lock Name\n101 running web\n150 stopped db\n120 stopped cache\n";

    fn spec() -> CreateSpec {
        CreateSpec {
            ctid: 200,
            template: "local:vztmpl/debian-12-standard_12.2-1_amd64.tar.zst".into(),
            hostname: "web".into(),
            storage: "local-lvm".into(),
            rootfs_size: 10,
            cores: 2,
            memory: 2048,
            net_bridge: "vmbr0".into(),
            net_ip: "192.168.1.50/24".into(),
            net_gw: Some("192.168.1.1".into()),
        }
    }

    #[test]
    fn net0_descriptor() {
        let mut spec = spec();
        assert_eq!(
            spec.net0(),
            "name=eth0,bridge=vmbr0,ip=192.168.1.50/24,gw=192.168.1.1"
        );
        spec.net_ip = "dhcp".into();
        assert_eq!(spec.net0(), "name=eth0,bridge=vmbr0,ip=dhcp");
    }

    #[test]
    fn create_issues_full_pct_create() {
        let scripted = ScriptedExecutor::new();
        let calls = scripted.calls();
        let pve = Pve::new(Box::new(scripted));

        assert!(pve.create(&spec()).unwrap());

        let calls = calls.borrow();
        let cmd = &calls[0];
        assert_eq!(&cmd[..4], &["pct", "create", "200", "local:vztmpl/debian-12-standard_12.2-1_amd64.tar.zst"]);
        let joined = cmd.join(" ");
        assert!(joined.contains("--rootfs local-lvm:10"));
        assert!(joined.contains("--unprivileged 1 --features nesting=1 --start 1"));
    }

    #[test]
    fn create_reports_failure_as_false() {
        let pve = Pve::new(Box::new(ScriptedExecutor::new().fail(&["pct", "create"])));
        assert!(!pve.create(&spec()).unwrap());
    }

    #[test]
    fn destroy_running_without_force_issues_nothing() {
        let scripted = ScriptedExecutor::new().ok(&["pct", "list"], PCT_LIST);
        let calls = scripted.calls();
        let pve = Pve::new(Box::new(scripted));

        assert!(!pve.destroy(101, false).unwrap());
        assert!(!issued(&calls, &["pct", "stop"]));
        assert!(!issued(&calls, &["pct", "destroy"]));
    }

    #[test]
    fn destroy_running_with_force_stops_first() {
        let scripted = ScriptedExecutor::new().ok(&["pct", "list"], PCT_LIST);
        let calls = scripted.calls();
        let pve = Pve::new(Box::new(scripted));

        assert!(pve.destroy(101, true).unwrap());
        let calls = calls.borrow();
        let stop = calls.iter().position(|c| c[..2] == ["pct", "stop"]).unwrap();
        let destroy = calls.iter().position(|c| c[..2] == ["pct", "destroy"]).unwrap();
        assert!(stop < destroy);
        assert_eq!(calls[destroy], vec!["pct", "destroy", "101", "--purge"]);
    }

    #[test]
    fn destroy_stopped_needs_no_force() {
        let scripted = ScriptedExecutor::new().ok(&["pct", "list"], PCT_LIST);
        let calls = scripted.calls();
        let pve = Pve::new(Box::new(scripted));

        assert!(pve.destroy(150, false).unwrap());
        assert!(!issued(&calls, &["pct", "stop"]));
    }

    #[test]
    fn exec_prefixes_pct_exec() {
        let scripted = ScriptedExecutor::new().on(
            &["pct", "exec", "101", "--", "false"],
            CommandResult::new(1, "", ""),
        );
        let pve = Pve::new(Box::new(scripted));
        let result = pve.exec(101, &argv!["false"]).unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn list_containers_reads_configs() {
        let scripted = ScriptedExecutor::new()
            .ok(&["pct", "list"], PCT_LIST)
            .ok(&["pct", "config", "101"], "cores: 4\nmemory: 4096\nnet0: name=eth0,ip=10.0.0.5/24\n")
            .fail(&["pct", "config"]);
        let pve = Pve::new(Box::new(scripted));

        let containers = pve.list_containers().unwrap();
        assert_eq!(containers.len(), 3);
        assert_eq!(containers[0].cores, 4);
        assert_eq!(containers[0].ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(containers[1].memory, DEFAULT_MEMORY_MB);
    }

    #[test]
    fn list_failure_is_empty() {
        let pve = Pve::new(Box::new(ScriptedExecutor::new().fail(&["pct", "list"])));
        assert!(pve.list_containers().unwrap().is_empty());
        assert!(pve.get_container(101).unwrap().is_none());
    }

    #[test]
    fn next_ctid_from_cluster() {
        let pve = Pve::new(Box::new(
            ScriptedExecutor::new().ok(&["pvesh", "get", "/cluster/nextid"], "\"204\"\n"),
        ));
        assert_eq!(pve.next_ctid().unwrap(), 204);
    }

    #[test]
    fn next_ctid_falls_back_to_max_plus_one() {
        let pve = Pve::new(Box::new(
            ScriptedExecutor::new()
                .fail(&["pvesh"])
                .ok(&["pct", "list"], PCT_LIST),
        ));
        assert_eq!(pve.next_ctid().unwrap(), 151);
    }

    #[test]
    fn next_ctid_on_empty_host_is_100() {
        let pve = Pve::new(Box::new(ScriptedExecutor::new().fail(&["pvesh"])));
        assert_eq!(pve.next_ctid().unwrap(), FIRST_CTID);
    }

    const STORAGE_JSON: &str = r#"[
        {"storage": "backup", "content": "backup", "disable": 1},
        {"storage": "local", "content": "iso,vztmpl,backup", "type": "dir"},
        {"storage": "fast", "content": "images,rootdir", "disable": 0}
    ]"#;

    const PVEAM_LIST: &str = "\
NAME                                                         SIZE
local:vztmpl/alpine-3.19-default_20240207_amd64.tar.xz       3.25MB
local:vztmpl/debian-12-standard_12.2-1_amd64.tar.zst         120.29MB
";

    #[test]
    fn storage_detection() {
        let pve = Pve::new(Box::new(
            ScriptedExecutor::new().ok(&["pvesh", "get", "/storage"], STORAGE_JSON),
        ));
        assert_eq!(pve.find_rootfs_storage().unwrap().as_deref(), Some("fast"));
        assert_eq!(pve.find_template_storage().unwrap().as_deref(), Some("local"));
    }

    #[test]
    fn rootfs_storage_falls_back_to_any_enabled() {
        let pve = Pve::new(Box::new(ScriptedExecutor::new().ok(
            &["pvesh", "get", "/storage"],
            r#"[{"storage": "off", "content": "rootdir", "disable": true}, {"storage": "local", "content": "vztmpl"}]"#,
        )));
        assert_eq!(pve.find_rootfs_storage().unwrap().as_deref(), Some("local"));
    }

    #[test]
    fn garbage_inventory_finds_nothing() {
        let pve = Pve::new(Box::new(
            ScriptedExecutor::new().ok(&["pvesh", "get", "/storage"], "not json"),
        ));
        assert!(pve.find_rootfs_storage().unwrap().is_none());
    }

    #[test]
    fn find_template_matches_file_name_prefix() {
        let scripted = ScriptedExecutor::new()
            .ok(&["pvesh", "get", "/storage"], STORAGE_JSON)
            .ok(&["pveam", "list", "local"], PVEAM_LIST);
        let calls = scripted.calls();
        let pve = Pve::new(Box::new(scripted));

        assert_eq!(
            pve.find_template("debian-12", None).unwrap().as_deref(),
            Some("local:vztmpl/debian-12-standard_12.2-1_amd64.tar.zst")
        );
        assert!(pve.find_template("ubuntu", None).unwrap().is_none());
        // "local" only matches the storage prefix, never the file name
        assert!(pve.find_template("local", Some("local")).unwrap().is_none());
        assert!(issued(&calls, &["pveam", "list", "local"]));
    }

    #[test]
    fn local_push_uses_pct_directly() {
        let scripted = ScriptedExecutor::new();
        let calls = scripted.calls();
        let pve = Pve::new(Box::new(scripted));

        assert!(pve.push(101, Path::new("/src/app.conf"), Path::new("/etc/app.conf")).unwrap());
        assert_eq!(
            calls.borrow()[0],
            vec!["pct", "push", "101", "/src/app.conf", "/etc/app.conf"]
        );
    }

    #[test]
    fn remote_push_stages_then_cleans_up() {
        let scripted = ScriptedExecutor::new().remote();
        let calls = scripted.calls();
        let pushed = scripted.pushed();
        let pve = Pve::new(Box::new(scripted));

        assert!(pve.push(101, Path::new("/src/app.conf"), Path::new("/etc/app.conf")).unwrap());

        let pushed = pushed.borrow();
        assert_eq!(pushed.len(), 1);
        let staged = pushed[0].1.display().to_string();
        assert!(staged.starts_with("/tmp/pve-lxc-101-"));
        assert!(staged.ends_with("-app.conf"));

        let calls = calls.borrow();
        assert_eq!(calls[0], vec!["pct", "push", "101", staged.as_str(), "/etc/app.conf"]);
        assert_eq!(calls[1], vec!["rm", "-f", staged.as_str()]);
    }

    #[test]
    fn version_is_none_without_pve_tools() {
        let pve = Pve::new(Box::new(ScriptedExecutor::new().fail(&["pveversion"])));
        assert!(pve.version().unwrap().is_none());

        let pve = Pve::new(Box::new(
            ScriptedExecutor::new().ok(&["pveversion"], "pve-manager/8.1.4/ec5affc9e41f1d79\n"),
        ));
        assert_eq!(
            pve.version().unwrap().as_deref(),
            Some("pve-manager/8.1.4/ec5affc9e41f1d79")
        );
    }
}
