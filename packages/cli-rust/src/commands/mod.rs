//! CLI command implementations
//!
//! Each command resolves its executor through the host inventory (`--host`,
//! then the default host, then the local machine) and wraps it in [`Pve`].

mod apps;
mod bootstrap;
mod create;
mod deploy;
mod destroy;
mod host;
mod ip;
mod list;

use std::path::Path;

use anyhow::{Result, bail};
use pve_lxc_core::config::load_params_file;
use pve_lxc_core::{HostManager, Pve};
use serde_yaml::{Mapping, Value};

pub use apps::{AppsArgs, cmd_apps};
pub use bootstrap::{BootstrapArgs, cmd_bootstrap};
pub use create::{CreateArgs, cmd_create};
pub use deploy::{DeployArgs, cmd_deploy};
pub use destroy::{DestroyArgs, cmd_destroy};
pub use host::{HostArgs, cmd_host};
pub use ip::{IpArgs, cmd_ip};
pub use list::{ListArgs, cmd_list};

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub host: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl Globals {
    /// No decorations on stdout: spinners, hints and tables are skipped
    pub fn silent(&self) -> bool {
        self.json || self.quiet
    }

    pub fn hosts(&self) -> Result<HostManager> {
        Ok(HostManager::from_default_paths()?)
    }

    /// PVE wrapper bound to the selected host
    pub fn connect(&self) -> Result<Pve> {
        let executor = self.hosts()?.get_executor(self.host.as_deref())?;
        tracing::debug!("Using executor {}", executor.describe());
        Ok(Pve::new(executor))
    }
}

/// Top-level keys of a `--config` parameter file
///
/// Values from the file only fill in flags that were not given.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParamFile(Mapping);

impl ParamFile {
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Ok(Self(load_params_file(path)?)),
            None => Ok(Self::default()),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_yaml(text: &str) -> Self {
        Self(serde_yaml::from_str(text).unwrap_or_default())
    }

    fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    /// Strings as written; numbers and booleans are stringified
    pub(crate) fn string(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub(crate) fn u32(&self, key: &str) -> Result<Option<u32>> {
        let Some(value) = self.value(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        match parsed {
            Some(n) => Ok(Some(n)),
            None => bail!("Parameter '{key}' must be a non-negative integer"),
        }
    }

    pub(crate) fn bool(&self, key: &str) -> Option<bool> {
        self.value(key)?.as_bool()
    }

    pub(crate) fn into_value(self) -> Value {
        Value::Mapping(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn globals_silent_in_json_or_quiet() {
        let mut globals = Globals::default();
        assert!(!globals.silent());
        globals.json = true;
        assert!(globals.silent());
        globals = Globals {
            quiet: true,
            ..Globals::default()
        };
        assert!(globals.silent());
    }

    #[test]
    fn param_file_reads_typed_values() {
        let params = ParamFile::from_yaml("name: web\ncores: 4\nmemory: \"1024\"\ngpu: true\n");
        assert_eq!(params.string("name").as_deref(), Some("web"));
        assert_eq!(params.u32("cores").unwrap(), Some(4));
        assert_eq!(params.u32("memory").unwrap(), Some(1024));
        assert_eq!(params.bool("gpu"), Some(true));
        assert_eq!(params.u32("disk").unwrap(), None);
    }

    #[test]
    fn param_file_rejects_bad_numbers() {
        let params = ParamFile::from_yaml("cores: many\n");
        assert!(params.u32("cores").is_err());
    }

    #[test]
    fn param_file_null_is_absent() {
        let params = ParamFile::from_yaml("ip: ~\n");
        assert!(params.string("ip").is_none());
    }

    #[test]
    fn param_file_load_from_disk() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "ip_range: 21-50\n").unwrap();
        let params = ParamFile::load(Some(file.path())).unwrap();
        assert_eq!(params.string("ip_range").as_deref(), Some("21-50"));
    }

    #[test]
    fn param_file_missing_path_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ParamFile::load(Some(&dir.path().join("missing.yaml"))).is_err());
    }

    #[test]
    fn no_param_file_is_empty() {
        let params = ParamFile::load(None).unwrap();
        assert!(params.string("name").is_none());
    }
}
