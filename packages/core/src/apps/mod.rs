//! Application installers
//!
//! An installer is a short script of package and service commands run
//! through a [`System`]. [`run_installer`] drives every installer through the
//! same five steps and turns failures into an [`InstallResult`].

mod docker;
mod nginx;
mod postgres;
mod registry;

use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::exec::{CommandResult, ExecError};
use crate::system::System;

pub use docker::DockerInstaller;
pub use nginx::NginxInstaller;
pub use postgres::PostgresInstaller;
pub use registry::AppRegistry;

/// Names of the five install steps, in order
pub const INSTALL_STEPS: [&str; 5] = [
    "Validating",
    "Pre-install",
    "Installing",
    "Post-install",
    "Configuring",
];

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Command failed ({exit_code}): {command}: {stderr}")]
    Command {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Outcome of an installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallResult {
    pub success: bool,
    pub message: String,
    pub access_url: Option<String>,
    pub credentials: Option<BTreeMap<String, String>>,
}

impl InstallResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            access_url: None,
            credentials: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            access_url: None,
            credentials: None,
        }
    }

    pub fn with_access_url(mut self, url: impl Into<String>) -> Self {
        self.access_url = Some(url.into());
        self
    }
}

/// A documented installer parameter, shown in help
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppParameter {
    pub name: &'static str,
    pub description: &'static str,
    pub default: Option<&'static str>,
    pub required: bool,
}

/// Everything an installer gets to work with
pub struct InstallContext<'a> {
    system: &'a System<'a>,
    params: Value,
    address: Option<String>,
}

impl<'a> InstallContext<'a> {
    pub fn new(system: &'a System<'a>, params: Value, address: Option<String>) -> Self {
        Self {
            system,
            params,
            address,
        }
    }

    pub fn system(&self) -> &System<'a> {
        self.system
    }

    /// Address the application will be reachable at, if known
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// String form of a parameter; numbers and booleans are stringified
    pub fn param(&self, key: &str) -> Option<String> {
        match self.params.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn param_bool(&self, key: &str, default: bool) -> bool {
        match self.params.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.as_str(), "true" | "yes" | "1"),
            _ => default,
        }
    }

    /// Run a command and fail the step on a non-zero exit
    pub fn run(&self, cmd: &[String]) -> Result<CommandResult, InstallError> {
        checked(cmd, self.system.run(cmd, true)?)
    }

    pub fn apt_update(&self) -> Result<(), InstallError> {
        checked(&["apt-get update".to_string()], self.system.apt_update()?).map(drop)
    }

    pub fn apt_install(&self, packages: &[&str]) -> Result<(), InstallError> {
        let label = format!("apt-get install {}", packages.join(" "));
        checked(&[label], self.system.apt_install(packages)?).map(drop)
    }

    pub fn systemctl(&self, action: &str, service: &str) -> Result<(), InstallError> {
        let label = format!("systemctl {action} {service}");
        checked(&[label], self.system.systemctl(action, service)?).map(drop)
    }
}

fn checked(cmd: &[String], result: CommandResult) -> Result<CommandResult, InstallError> {
    if result.success() {
        Ok(result)
    } else {
        Err(InstallError::Command {
            command: cmd.join(" "),
            exit_code: result.exit_code,
            stderr: result.stderr.trim().to_string(),
        })
    }
}

/// An installable application
///
/// Only `install` and `result` are required; the other steps default to
/// doing nothing.
pub trait AppInstaller {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn default_cores(&self) -> u32 {
        2
    }

    /// MB
    fn default_memory(&self) -> u32 {
        2048
    }

    /// GB
    fn default_disk(&self) -> u32 {
        10
    }

    fn parameters(&self) -> Vec<AppParameter> {
        Vec::new()
    }

    fn validate(&self, _ctx: &InstallContext<'_>) -> Result<(), InstallError> {
        Ok(())
    }

    fn pre_install(&self, _ctx: &InstallContext<'_>) -> Result<(), InstallError> {
        Ok(())
    }

    fn install(&self, ctx: &InstallContext<'_>) -> Result<(), InstallError>;

    fn post_install(&self, _ctx: &InstallContext<'_>) -> Result<(), InstallError> {
        Ok(())
    }

    fn configure(&self, _ctx: &InstallContext<'_>) -> Result<(), InstallError> {
        Ok(())
    }

    /// Result reported after every step succeeded
    fn result(&self, ctx: &InstallContext<'_>) -> InstallResult;
}

/// Run all five steps; `on_step` gets the 1-based step number and its name
pub fn run_installer(
    installer: &dyn AppInstaller,
    ctx: &InstallContext<'_>,
    mut on_step: impl FnMut(usize, &str),
) -> InstallResult {
    for (index, name) in INSTALL_STEPS.iter().enumerate() {
        on_step(index + 1, name);
        let outcome = match index {
            0 => installer.validate(ctx),
            1 => installer.pre_install(ctx),
            2 => installer.install(ctx),
            3 => installer.post_install(ctx),
            _ => installer.configure(ctx),
        };
        if let Err(e) = outcome {
            tracing::error!("{} failed during {name}: {e}", installer.name());
            return InstallResult::failed(e.to_string());
        }
    }

    tracing::info!("{} installed", installer.name());
    installer.result(ctx)
}
