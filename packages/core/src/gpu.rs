//! GPU passthrough for containers
//!
//! Finds DRI devices on the PVE host and binds them into a container by
//! appending cgroup and mount entries to its config.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::argv;
use crate::exec::{CommandExecutor, ExecError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuDevice {
    /// e.g. `/dev/dri/renderD128`
    pub path: String,
    pub major: u32,
    pub minor: u32,
}

impl GpuDevice {
    fn config_lines(&self) -> [String; 2] {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        [
            format!("lxc.cgroup2.devices.allow: c {}:{} rwm", self.major, self.minor),
            format!(
                "lxc.mount.entry: {} dev/dri/{} none bind,optional,create=file",
                self.path, name
            ),
        ]
    }
}

pub fn container_config_path(ctid: u32) -> PathBuf {
    PathBuf::from(format!("/etc/pve/lxc/{ctid}.conf"))
}

pub struct Gpu<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> Gpu<'a> {
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    /// `render*` and `card*` nodes under /dev/dri
    pub fn detect_devices(&self) -> Result<Vec<GpuDevice>, ExecError> {
        let result = self.executor.run(
            &argv![
                "find", "/dev/dri", "-maxdepth", "1", "(", "-name", "render*", "-o", "-name",
                "card*", ")", "-exec", "stat", "-c", "%n %t %T", "{}", "+"
            ],
            false,
        )?;
        if !result.success() {
            tracing::warn!("No /dev/dri devices found on {}", self.executor.describe());
            return Ok(Vec::new());
        }

        let mut devices: Vec<GpuDevice> = result.stdout.lines().filter_map(parse_stat_line).collect();
        devices.sort_by(|a, b| a.path.cmp(&b.path));
        for device in &devices {
            tracing::info!("Found GPU device: {} ({}:{})", device.path, device.major, device.minor);
        }
        Ok(devices)
    }

    /// Append passthrough entries to the container config
    ///
    /// Returns false when there is nothing to configure or the container
    /// config cannot be read.
    pub fn configure_passthrough(&self, ctid: u32, devices: &[GpuDevice]) -> Result<bool, ExecError> {
        if devices.is_empty() {
            tracing::warn!("No GPU devices to configure");
            return Ok(false);
        }

        let config_path = container_config_path(ctid);
        let mut config = match self.executor.read_file(&config_path) {
            Ok(config) => config,
            Err(ExecError::Io { .. }) => {
                tracing::error!("Container config not found: {}", config_path.display());
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if !config.is_empty() && !config.ends_with('\n') {
            config.push('\n');
        }
        config.push_str("\n# GPU Passthrough\n");
        for line in devices.iter().flat_map(GpuDevice::config_lines) {
            config.push_str(&line);
            config.push('\n');
        }

        if !self.replace_file(&config_path, &config)? {
            return Ok(false);
        }
        tracing::info!("GPU passthrough configured for {ctid}: {} devices", devices.len());
        Ok(true)
    }

    fn replace_file(&self, path: &Path, content: &str) -> Result<bool, ExecError> {
        let mut staged = tempfile::NamedTempFile::new().map_err(|e| ExecError::io(path, e))?;
        staged
            .write_all(content.as_bytes())
            .and_then(|_| staged.flush())
            .map_err(|e| ExecError::io(path, e))?;
        self.executor.push_file(staged.path(), path)
    }
}

/// `/dev/dri/renderD128 e2 80` with hex major and minor
fn parse_stat_line(line: &str) -> Option<GpuDevice> {
    let mut parts = line.split_whitespace();
    let path = parts.next()?.to_string();
    let major = u32::from_str_radix(parts.next()?, 16).ok()?;
    let minor = u32::from_str_radix(parts.next()?, 16).ok()?;
    Some(GpuDevice { path, major, minor })
}
