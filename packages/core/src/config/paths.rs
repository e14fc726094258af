//! Path resolution for pve-lxc
//!
//! Everything lives under a dot directory in the home directory:
//! - `~/.pve-lxc/config.yaml` for user configuration and the default host
//! - `~/.ssh/config` for the host inventory

use std::path::PathBuf;

/// Name of the per-user configuration directory
const CONFIG_DIR_NAME: &str = ".pve-lxc";

/// Get the configuration directory path
///
/// Returns `~/.pve-lxc/` on every platform.
pub fn get_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(CONFIG_DIR_NAME))
}

/// Get the full path to the user config file
///
/// Returns: `{config_dir}/config.yaml`
pub fn get_user_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join("config.yaml"))
}

/// Get the full path to the SSH client config
///
/// Returns: `~/.ssh/config`
pub fn get_ssh_config_path() -> Option<PathBuf> {
    crate::host::get_ssh_config_path()
}
