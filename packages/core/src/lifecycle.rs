//! Container lifecycle orchestration
//!
//! Composes the PVE wrapper, address resolution and installers into the
//! create → bootstrap → deploy → destroy flow.

use std::thread;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::apps::{AppInstaller, InstallContext, InstallResult, run_installer};
use crate::argv;
use crate::config::{BootstrapConfig, Config};
use crate::exec::ExecError;
use crate::gpu::Gpu;
use crate::network::{Network, NetworkError};
use crate::pve::{ContainerExecutor, CreateSpec, FALLBACK_TEMPLATE_STORAGE, Pve};
use crate::system::System;
use crate::validation::{
    ValidationError, validate_ctid, validate_ip, validate_name, validate_resources,
};

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Caller-supplied values for a new container; `None` means "use config"
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub name: String,
    pub ctid: Option<u32>,
    pub cores: Option<u32>,
    pub memory: Option<u32>,
    pub disk: Option<u32>,
    /// `"21-50"`, `"192.168.1.100[/24]"`, or `None` for DHCP
    pub ip: Option<String>,
    pub gateway: Option<String>,
    pub template: Option<String>,
    pub storage: Option<String>,
    pub gpu: bool,
    /// Fetch the template with `pveam` when the storage lacks it
    pub download_template: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateResult {
    pub success: bool,
    pub ctid: Option<u32>,
    pub ip: Option<String>,
    pub message: String,
}

impl CreateResult {
    fn failed(ctid: Option<u32>, message: String) -> Self {
        Self {
            success: false,
            ctid,
            ip: None,
            message,
        }
    }
}

/// Download the newest appliance whose name starts with `name`
///
/// Returns the volume id on `storage`, or `None` when nothing matches or
/// the download fails.
fn fetch_template(pve: &Pve, name: &str, storage: &str) -> Result<Option<String>, ExecError> {
    let Some(file) = pve
        .available_templates()?
        .into_iter()
        .filter(|file| file.starts_with(name))
        .max()
    else {
        tracing::warn!("No appliance matching '{name}' is available");
        return Ok(None);
    };

    if !pve.download_template(&file, storage)? {
        tracing::warn!("Download of {file} to {storage} failed");
        return Ok(None);
    }
    Ok(Some(format!("{storage}:vztmpl/{file}")))
}

/// Create a container from config defaults overlaid with `request`
///
/// Every argument is validated before the first command is issued. A failed
/// `pct create` or a missing template is a soft failure in the result.
pub fn create_container(
    pve: &Pve,
    config: &Config,
    request: &CreateRequest,
) -> Result<CreateResult, LifecycleError> {
    validate_name(&request.name)?;
    if let Some(ctid) = request.ctid {
        validate_ctid(ctid)?;
    }
    validate_resources(request.cores, request.memory, request.disk)?;
    if let Some(ip) = &request.ip {
        validate_ip(ip)?;
    }

    let defaults = &config.container;
    let cores = request.cores.unwrap_or(defaults.cores);
    let memory = request.memory.unwrap_or(defaults.memory);
    let disk = request.disk.unwrap_or(defaults.disk);
    let template = request.template.as_deref().unwrap_or(&defaults.template);

    let mut storage = request
        .storage
        .clone()
        .unwrap_or_else(|| defaults.storage.clone());
    if request.storage.is_none() && config.storage_is_placeholder() {
        if let Some(detected) = pve.find_rootfs_storage()? {
            tracing::info!("Using detected storage {detected}");
            storage = detected;
        }
    }

    let ctid = match request.ctid {
        Some(ctid) => ctid,
        None => pve.next_ctid()?,
    };

    let (net_ip, net_gw, address) = match &request.ip {
        Some(ip) => {
            let network = Network::new(pve.executor(), config.network.ping_timeout);
            let resolved = network.resolve_ip(ip)?;
            let gateway = request.gateway.clone().unwrap_or(resolved.gateway.clone());
            (resolved.cidr(), Some(gateway), Some(resolved.address))
        }
        None => ("dhcp".to_string(), None, None),
    };

    // A full volume id is used as given
    let template_path = if template.contains(':') {
        template.to_string()
    } else {
        let template_storage = pve
            .find_template_storage()?
            .unwrap_or_else(|| FALLBACK_TEMPLATE_STORAGE.to_string());
        let found = match pve.find_template(template, Some(&template_storage))? {
            None if request.download_template => {
                fetch_template(pve, template, &template_storage)?
            }
            found => found,
        };
        match found {
            Some(path) => path,
            None => {
                return Ok(CreateResult::failed(
                    None,
                    format!(
                        "Template '{template}' not found on storage '{template_storage}'. \
                         Download it with: pveam download {template_storage} <template>"
                    ),
                ));
            }
        }
    };

    let spec = CreateSpec {
        ctid,
        template: template_path,
        hostname: request.name.clone(),
        storage,
        rootfs_size: disk,
        cores,
        memory,
        net_bridge: config.network.bridge.clone(),
        net_ip,
        net_gw,
    };

    if !pve.create(&spec)? {
        return Ok(CreateResult::failed(
            Some(ctid),
            format!("Failed to create container {ctid}"),
        ));
    }

    if request.gpu {
        let gpu = Gpu::new(pve.executor());
        let devices = gpu.detect_devices()?;
        if !gpu.configure_passthrough(ctid, &devices)? {
            tracing::warn!("GPU passthrough was requested but not configured for {ctid}");
        }
    }

    Ok(CreateResult {
        success: true,
        ctid: Some(ctid),
        ip: address,
        message: format!("Container {ctid} created"),
    })
}

pub fn destroy_container(pve: &Pve, ctid: u32, force: bool) -> Result<bool, LifecycleError> {
    validate_ctid(ctid)?;
    Ok(pve.destroy(ctid, force)?)
}

/// How bootstrap reacts to a failed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootstrapMode {
    /// Run every step and report success regardless
    #[default]
    BestEffort,
    /// Stop at the first failed step and report failure
    Strict,
}

impl BootstrapMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            BootstrapMode::Strict
        } else {
            BootstrapMode::BestEffort
        }
    }
}

/// Progress notification for one bootstrap step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapStep {
    pub current: usize,
    pub total: usize,
    pub description: String,
}

fn bootstrap_steps(config: &BootstrapConfig) -> Vec<(String, Vec<Vec<String>>)> {
    let locale = &config.locale;
    let timezone = &config.timezone;

    let mut install = argv!["apt-get", "install", "-y", "-qq"];
    install.extend(config.packages.iter().cloned());

    vec![
        (
            format!("Setting locale {locale}"),
            vec![
                argv!["locale-gen", locale],
                argv!["update-locale", format!("LANG={locale}")],
            ],
        ),
        (
            format!("Setting timezone {timezone}"),
            vec![
                argv![
                    "ln",
                    "-sf",
                    format!("/usr/share/zoneinfo/{timezone}"),
                    "/etc/localtime"
                ],
                argv!["dpkg-reconfigure", "-f", "noninteractive", "tzdata"],
            ],
        ),
        (
            "Updating packages".to_string(),
            vec![argv!["apt-get", "update", "-qq"]],
        ),
        (
            format!("Installing packages: {}", config.packages.join(", ")),
            vec![install],
        ),
    ]
}

/// Base setup of a fresh container: locale, timezone, package lists, packages
///
/// In best-effort mode this always returns true once every step ran.
pub fn bootstrap_container(
    pve: &Pve,
    ctid: u32,
    config: &BootstrapConfig,
    mode: BootstrapMode,
    mut on_step: impl FnMut(&BootstrapStep),
) -> Result<bool, LifecycleError> {
    validate_ctid(ctid)?;

    let steps = bootstrap_steps(config);
    let total = steps.len();
    for (index, (description, commands)) in steps.into_iter().enumerate() {
        on_step(&BootstrapStep {
            current: index + 1,
            total,
            description,
        });

        for cmd in &commands {
            let result = pve.exec(ctid, cmd)?;
            if result.success() {
                continue;
            }
            tracing::warn!(
                "Bootstrap command failed in {ctid} ({}): {}",
                result.exit_code,
                cmd.join(" ")
            );
            if mode == BootstrapMode::Strict {
                return Ok(false);
            }
        }
    }

    tracing::info!("Bootstrap of {ctid} completed");
    Ok(true)
}

/// Poll until the container runs commands or `attempts` is used up
///
/// Returns whether it became ready; callers proceed either way.
pub fn wait_for_ready(
    pve: &Pve,
    ctid: u32,
    attempts: u32,
    interval: Duration,
) -> Result<bool, ExecError> {
    for attempt in 1..=attempts {
        if pve.exec(ctid, &argv!["true"])?.success() {
            tracing::debug!("Container {ctid} ready after {attempt} attempt(s)");
            return Ok(true);
        }
        if attempt < attempts {
            thread::sleep(interval);
        }
    }
    tracing::warn!("Container {ctid} not ready after {attempts} attempts, continuing");
    Ok(false)
}

/// Run an installer inside a container
pub fn deploy_app(
    pve: &Pve,
    ctid: u32,
    installer: &dyn AppInstaller,
    params: serde_yaml::Value,
    on_step: impl FnMut(usize, &str),
) -> Result<InstallResult, LifecycleError> {
    validate_ctid(ctid)?;

    let address = pve.get_container(ctid)?.and_then(|c| c.ip);
    let executor = ContainerExecutor::new(pve, ctid);
    let system = System::new(&executor);
    let ctx = InstallContext::new(&system, params, address);

    tracing::info!("Deploying {} into container {ctid}", installer.name());
    Ok(run_installer(installer, &ctx, on_step))
}
