//! PostgreSQL database server

use super::{AppInstaller, AppParameter, InstallContext, InstallError, InstallResult};

pub struct PostgresInstaller;

impl AppInstaller for PostgresInstaller {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn description(&self) -> &'static str {
        "PostgreSQL Database"
    }

    fn default_disk(&self) -> u32 {
        20
    }

    fn parameters(&self) -> Vec<AppParameter> {
        vec![AppParameter {
            name: "version",
            description: "PostgreSQL major version",
            default: Some("16"),
            required: false,
        }]
    }

    fn validate(&self, ctx: &InstallContext<'_>) -> Result<(), InstallError> {
        match ctx.param("version") {
            Some(version) if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) => {
                Err(InstallError::Validation(format!(
                    "version must be a major version number, got '{version}'"
                )))
            }
            _ => Ok(()),
        }
    }

    fn install(&self, ctx: &InstallContext<'_>) -> Result<(), InstallError> {
        ctx.apt_update()?;
        ctx.apt_install(&["postgresql", "postgresql-contrib"])?;
        ctx.systemctl("enable", "postgresql")?;
        ctx.systemctl("start", "postgresql")
    }

    fn result(&self, ctx: &InstallContext<'_>) -> InstallResult {
        let mut result = InstallResult::ok("PostgreSQL installed");
        if let Some(address) = ctx.address() {
            result = result.with_access_url(format!("postgresql://{address}:5432"));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::run_installer;
    use crate::exec::scripted::ScriptedExecutor;
    use crate::system::System;

    #[test]
    fn rejects_non_numeric_version() {
        let executor = ScriptedExecutor::new();
        let system = System::new(&executor);
        let params = serde_yaml::from_str("version: latest").unwrap();
        let ctx = InstallContext::new(&system, params, None);

        let result = run_installer(&PostgresInstaller, &ctx, |_, _| {});
        assert!(!result.success);
        assert!(result.message.contains("latest"));
    }

    #[test]
    fn reports_connection_url() {
        let executor = ScriptedExecutor::new();
        let system = System::new(&executor);
        let ctx = InstallContext::new(&system, serde_yaml::Value::Null, Some("10.0.0.9".into()));

        let result = run_installer(&PostgresInstaller, &ctx, |_, _| {});
        assert!(result.success);
        assert_eq!(result.access_url.as_deref(), Some("postgresql://10.0.0.9:5432"));
    }
}
