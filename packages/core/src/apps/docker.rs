//! Docker Engine from the upstream apt repository

use super::{AppInstaller, AppParameter, InstallContext, InstallError, InstallResult};
use crate::argv;

const KEYRING: &str = "/etc/apt/keyrings/docker.asc";

pub struct DockerInstaller;

impl AppInstaller for DockerInstaller {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn description(&self) -> &'static str {
        "Docker Engine"
    }

    fn default_disk(&self) -> u32 {
        20
    }

    fn parameters(&self) -> Vec<AppParameter> {
        vec![AppParameter {
            name: "compose",
            description: "Install the Docker Compose plugin",
            default: Some("true"),
            required: false,
        }]
    }

    fn pre_install(&self, ctx: &InstallContext<'_>) -> Result<(), InstallError> {
        ctx.apt_update()?;
        ctx.apt_install(&["ca-certificates", "curl", "gnupg"])
    }

    fn install(&self, ctx: &InstallContext<'_>) -> Result<(), InstallError> {
        tracing::info!("Adding Docker repository");
        ctx.run(&argv!["install", "-m", "0755", "-d", "/etc/apt/keyrings"])?;
        ctx.run(&argv![
            "curl",
            "-fsSL",
            "https://download.docker.com/linux/debian/gpg",
            "-o",
            KEYRING
        ])?;
        ctx.run(&argv![
            "bash",
            "-c",
            format!(
                "echo \"deb [arch=$(dpkg --print-architecture) signed-by={KEYRING}] \
                 https://download.docker.com/linux/debian $(. /etc/os-release && echo $VERSION_CODENAME) stable\" \
                 > /etc/apt/sources.list.d/docker.list"
            )
        ])?;

        let mut packages = vec!["docker-ce", "docker-ce-cli", "containerd.io"];
        if ctx.param_bool("compose", true) {
            packages.push("docker-compose-plugin");
        }
        ctx.apt_update()?;
        ctx.apt_install(&packages)
    }

    fn post_install(&self, ctx: &InstallContext<'_>) -> Result<(), InstallError> {
        ctx.systemctl("enable", "docker")
    }

    fn result(&self, _ctx: &InstallContext<'_>) -> InstallResult {
        InstallResult::ok("Docker installed")
    }
}
