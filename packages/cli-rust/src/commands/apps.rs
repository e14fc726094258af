//! pve-lxc apps - List installable applications

use anyhow::{Result, bail};
use clap::Args;
use comfy_table::Table;
use console::style;
use pve_lxc_core::apps::{AppInstaller, AppRegistry};
use serde_json::{Value, json};

use super::Globals;
use crate::output::print_result;

#[derive(Args, Debug)]
pub struct AppsArgs {
    /// Show details for one application
    pub name: Option<String>,
}

fn describe(app: &dyn AppInstaller) -> Value {
    json!({
        "name": app.name(),
        "description": app.description(),
        "cores": app.default_cores(),
        "memory": app.default_memory(),
        "disk": app.default_disk(),
    })
}

pub fn cmd_apps(args: &AppsArgs, globals: &Globals) -> Result<()> {
    let registry = AppRegistry::new();

    if let Some(name) = &args.name {
        let (Some(app), Some(help)) = (registry.get(name), registry.help(name)) else {
            bail!(
                "Application '{}' not found. Available: {}",
                name,
                registry.list_all().join(", ")
            );
        };
        if globals.json {
            let parameters: Vec<Value> = app
                .parameters()
                .iter()
                .map(|p| {
                    json!({
                        "name": p.name,
                        "description": p.description,
                        "default": p.default,
                        "required": p.required,
                    })
                })
                .collect();
            let mut doc = describe(app);
            doc["parameters"] = Value::Array(parameters);
            print_result(true, doc);
        } else {
            println!("{help}");
        }
        return Ok(());
    }

    if globals.json {
        let apps: Vec<Value> = registry.iter().map(describe).collect();
        print_result(true, json!({ "apps": apps }));
        return Ok(());
    }

    if globals.quiet {
        for name in registry.list_all() {
            println!("{name}");
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Name", "Description", "Cores", "Memory", "Disk"]);
    for app in registry.iter() {
        table.add_row(vec![
            app.name().to_string(),
            app.description().to_string(),
            app.default_cores().to_string(),
            format!("{} MB", app.default_memory()),
            format!("{} GB", app.default_disk()),
        ]);
    }
    println!("{table}");
    println!();
    println!(
        "  {} {}",
        style("Deploy with:").dim(),
        style("pve-lxc deploy <app> --create").yellow()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_includes_default_resources() {
        let registry = AppRegistry::new();
        let nginx = registry.get("nginx").unwrap();
        let doc = describe(nginx);
        assert_eq!(doc["name"], json!("nginx"));
        assert_eq!(doc["cores"], json!(1));
        assert_eq!(doc["memory"], json!(512));
        assert_eq!(doc["disk"], json!(8));
    }
}
