//! Lookup of installers by name

use super::{AppInstaller, DockerInstaller, NginxInstaller, PostgresInstaller};

/// Every installer shipped with pve-lxc
pub struct AppRegistry {
    apps: Vec<Box<dyn AppInstaller>>,
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AppRegistry {
    pub fn new() -> Self {
        let mut apps: Vec<Box<dyn AppInstaller>> = vec![
            Box::new(DockerInstaller),
            Box::new(NginxInstaller),
            Box::new(PostgresInstaller),
        ];
        apps.sort_by_key(|app| app.name());
        Self { apps }
    }

    pub fn get(&self, name: &str) -> Option<&dyn AppInstaller> {
        self.apps
            .iter()
            .find(|app| app.name() == name)
            .map(|app| app.as_ref())
    }

    /// Sorted installer names
    pub fn list_all(&self) -> Vec<&'static str> {
        self.apps.iter().map(|app| app.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn AppInstaller> {
        self.apps.iter().map(|app| app.as_ref())
    }

    /// Description, default resources and parameters of one installer
    pub fn help(&self, name: &str) -> Option<String> {
        let app = self.get(name)?;
        let mut lines = vec![
            format!("Application: {}", app.name()),
            format!("Description: {}", app.description()),
            String::new(),
            "Default resources:".to_string(),
            format!("  Cores: {}", app.default_cores()),
            format!("  Memory: {} MB", app.default_memory()),
            format!("  Disk: {} GB", app.default_disk()),
        ];

        let parameters = app.parameters();
        if !parameters.is_empty() {
            lines.push(String::new());
            lines.push("Parameters:".to_string());
            for param in parameters {
                let required = if param.required { " (required)" } else { "" };
                let default = param
                    .default
                    .map(|d| format!(" [default: {d}]"))
                    .unwrap_or_default();
                lines.push(format!(
                    "  --{}: {}{required}{default}",
                    param.name, param.description
                ));
            }
        }
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sorted() {
        assert_eq!(AppRegistry::new().list_all(), vec!["docker", "nginx", "postgres"]);
    }

    #[test]
    fn lookup_by_name() {
        let registry = AppRegistry::new();
        let nginx = registry.get("nginx").unwrap();
        assert_eq!(nginx.default_cores(), 1);
        assert_eq!(nginx.default_memory(), 512);
        assert!(registry.get("wordpress").is_none());
    }

    #[test]
    fn help_lists_resources_and_parameters() {
        let help = AppRegistry::new().help("postgres").unwrap();
        assert!(help.contains("Application: postgres"));
        assert!(help.contains("Disk: 20 GB"));
        assert!(help.contains("--version: PostgreSQL major version [default: 16]"));
        assert!(AppRegistry::new().help("nope").is_none());
    }
}
