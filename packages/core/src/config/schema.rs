//! Configuration schema for pve-lxc
//!
//! Defines the structure and defaults for `~/.pve-lxc/config.yaml` and the
//! layers merged on top of it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration structure for pve-lxc
///
/// Built by merging YAML layers, see [`super::ConfigLoader`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Container defaults used by `create` and `deploy`
    #[serde(default)]
    pub container: ContainerDefaults,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Host used when `--host` is not given
    #[serde(default)]
    pub default_host: Option<String>,

    /// Free-form per-application parameters, keyed by app name
    #[serde(default)]
    pub apps: BTreeMap<String, serde_yaml::Value>,
}

/// Resources and placement for new containers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ContainerDefaults {
    /// CPU cores (default: 2)
    #[serde(default = "default_cores")]
    pub cores: u32,

    /// Memory in MB (default: 2048)
    #[serde(default = "default_memory")]
    pub memory: u32,

    /// Root filesystem size in GB (default: 10)
    #[serde(default = "default_disk")]
    pub disk: u32,

    /// Template name prefix (default: "debian-12-standard")
    #[serde(default = "default_template")]
    pub template: String,

    /// Storage for the root filesystem (default: "local-lvm")
    ///
    /// The default value is a placeholder; `create` auto-detects a
    /// rootdir-capable storage while it is left unchanged.
    #[serde(default = "default_storage")]
    pub storage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// Bridge for net0 (default: "vmbr0")
    #[serde(default = "default_bridge")]
    pub bridge: String,

    /// Seconds to wait for a ping reply when probing addresses (default: 1)
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Base packages installed into every bootstrapped container
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,

    /// Stop at the first failed step instead of carrying on (default: false)
    #[serde(default)]
    pub strict: bool,
}

/// Readiness poll used after creating a container for deployment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,

    #[serde(default = "default_ready_interval_secs")]
    pub ready_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level used when neither RUST_LOG nor -v is given (default: "warn")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit log events as JSON lines
    #[serde(default)]
    pub json: bool,
}

fn default_cores() -> u32 {
    2
}

fn default_memory() -> u32 {
    2048
}

fn default_disk() -> u32 {
    10
}

fn default_template() -> String {
    "debian-12-standard".to_string()
}

/// Placeholder storage name that triggers auto-detection
pub const PLACEHOLDER_STORAGE: &str = "local-lvm";

fn default_storage() -> String {
    PLACEHOLDER_STORAGE.to_string()
}

fn default_bridge() -> String {
    "vmbr0".to_string()
}

fn default_ping_timeout() -> f64 {
    1.0
}

fn default_locale() -> String {
    "en_US.UTF-8".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_packages() -> Vec<String> {
    ["curl", "wget", "git", "vim", "htop"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_ready_attempts() -> u32 {
    30
}

fn default_ready_interval_secs() -> u64 {
    2
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ContainerDefaults {
    fn default() -> Self {
        Self {
            cores: default_cores(),
            memory: default_memory(),
            disk: default_disk(),
            template: default_template(),
            storage: default_storage(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bridge: default_bridge(),
            ping_timeout: default_ping_timeout(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            timezone: default_timezone(),
            packages: default_packages(),
            strict: false,
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            ready_attempts: default_ready_attempts(),
            ready_interval_secs: default_ready_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Parameters for one application, if configured
    pub fn app_params(&self, app: &str) -> Option<&serde_yaml::Value> {
        self.apps.get(app)
    }

    /// Whether the storage was left at the placeholder default
    pub fn storage_is_placeholder(&self) -> bool {
        self.container.storage.is_empty() || self.container.storage == PLACEHOLDER_STORAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.container.cores, 2);
        assert_eq!(config.container.memory, 2048);
        assert_eq!(config.container.disk, 10);
        assert_eq!(config.container.template, "debian-12-standard");
        assert_eq!(config.network.bridge, "vmbr0");
        assert_eq!(config.bootstrap.packages.len(), 5);
        assert!(!config.bootstrap.strict);
        assert_eq!(config.deploy.ready_attempts, 30);
        assert!(config.default_host.is_none());
        assert!(config.storage_is_placeholder());
    }

    #[test]
    fn test_deserialize_with_missing_sections() {
        let config: Config = serde_yaml::from_str("container:\n  cores: 8\n").unwrap();
        assert_eq!(config.container.cores, 8);
        assert_eq!(config.container.memory, 2048);
        assert_eq!(config.network, NetworkConfig::default());
    }

    #[test]
    fn test_reject_unknown_top_level_field() {
        let result: Result<Config, _> = serde_yaml::from_str("colour: blue\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_unknown_section_field() {
        let result: Result<Config, _> = serde_yaml::from_str("network:\n  brige: vmbr1\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_apps_section_is_free_form() {
        let config: Config =
            serde_yaml::from_str("apps:\n  postgres:\n    version: 16\n    anything: [1, 2]\n")
                .unwrap();
        let params = config.app_params("postgres").unwrap();
        assert_eq!(params["version"].as_u64(), Some(16));
    }

    #[test]
    fn test_explicit_storage_is_not_placeholder() {
        let mut config = Config::default();
        config.container.storage = "zfs-pool".to_string();
        assert!(!config.storage_is_placeholder());
    }
}
