//! Nginx web server

use super::{AppInstaller, InstallContext, InstallError, InstallResult};

pub struct NginxInstaller;

impl AppInstaller for NginxInstaller {
    fn name(&self) -> &'static str {
        "nginx"
    }

    fn description(&self) -> &'static str {
        "Nginx Web Server"
    }

    fn default_cores(&self) -> u32 {
        1
    }

    fn default_memory(&self) -> u32 {
        512
    }

    fn default_disk(&self) -> u32 {
        8
    }

    fn install(&self, ctx: &InstallContext<'_>) -> Result<(), InstallError> {
        ctx.apt_update()?;
        ctx.apt_install(&["nginx"])?;
        ctx.systemctl("enable", "nginx")?;
        ctx.systemctl("start", "nginx")
    }

    fn result(&self, ctx: &InstallContext<'_>) -> InstallResult {
        InstallResult::ok("Nginx installed")
            .with_access_url(format!("http://{}", ctx.address().unwrap_or("localhost")))
    }
}
