//! Container records parsed from `pct` output

use serde::Serialize;

/// Fallbacks for fields missing from `pct config`
pub const DEFAULT_CORES: u32 = 1;
pub const DEFAULT_MEMORY_MB: u32 = 512;
pub const DEFAULT_DISK_GB: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Stopped,
}

impl ContainerStatus {
    /// Anything other than `running` is treated as stopped
    pub fn parse(text: &str) -> Self {
        if text.eq_ignore_ascii_case("running") {
            ContainerStatus::Running
        } else {
            ContainerStatus::Stopped
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live view of one container on the PVE host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    pub ctid: u32,
    pub name: String,
    pub status: ContainerStatus,
    pub ip: Option<String>,
    pub cores: u32,
    /// Memory in MB
    pub memory: u32,
    /// Root filesystem size in GB
    pub disk: u32,
}

impl Container {
    pub fn is_running(&self) -> bool {
        self.status == ContainerStatus::Running
    }
}

/// One row of `pct list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListRow {
    pub ctid: u32,
    pub status: ContainerStatus,
    pub name: String,
}

/// Parse `pct list`, skipping the header
///
/// Columns are `VMID Status [Lock] Name`; the lock column is usually empty,
/// so the name is taken from the last column.
pub(crate) fn parse_list(stdout: &str) -> Vec<ListRow> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return None;
            }
            let ctid = parts[0].parse().ok()?;
            Some(ListRow {
                ctid,
                status: ContainerStatus::parse(parts[1]),
                name: parts[parts.len() - 1].to_string(),
            })
        })
        .collect()
}

/// Resource fields read from `pct config`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ConfigFields {
    pub cores: Option<u32>,
    pub memory: Option<u32>,
    pub disk: Option<u32>,
    pub ip: Option<String>,
}

pub(crate) fn parse_config(stdout: &str) -> ConfigFields {
    let mut fields = ConfigFields::default();
    for line in stdout.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "cores" => fields.cores = value.parse().ok(),
            "memory" => fields.memory = value.parse().ok(),
            "net0" => fields.ip = option_value(value, "ip").and_then(strip_mask),
            "rootfs" => fields.disk = option_value(value, "size").and_then(size_in_gb),
            _ => {}
        }
    }
    fields
}

/// Find `key=value` in a comma-separated option list
fn option_value<'a>(options: &'a str, key: &str) -> Option<&'a str> {
    options.split(',').find_map(|option| {
        let (k, v) = option.split_once('=')?;
        (k.trim() == key).then(|| v.trim())
    })
}

/// Address without its CIDR suffix; `dhcp` and friends are not addresses
fn strip_mask(ip: &str) -> Option<String> {
    let address = ip.split('/').next()?;
    let is_address = !address.is_empty() && address.chars().all(|c| c.is_ascii_digit() || c == '.');
    is_address.then(|| address.to_string())
}

/// `8G` → 8, `1T` → 1024, `512M` → 1 (rounded up)
fn size_in_gb(size: &str) -> Option<u32> {
    let (number, unit) = size.split_at(size.find(|c: char| !c.is_ascii_digit())?);
    let number: u32 = number.parse().ok()?;
    match unit {
        "G" => Some(number),
        "T" => number.checked_mul(1024),
        "M" => Some(number.div_ceil(1024)),
        _ => None,
    }
}

pub(crate) fn build(row: ListRow, config: ConfigFields) -> Container {
    Container {
        ctid: row.ctid,
        name: row.name,
        status: row.status,
        ip: config.ip,
        cores: config.cores.unwrap_or(DEFAULT_CORES),
        memory: config.memory.unwrap_or(DEFAULT_MEMORY_MB),
        disk: config.disk.unwrap_or(DEFAULT_DISK_GB),
    }
}
