//! pve-lxc host list - List configured hosts

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table};
use console::style;
use pve_lxc_core::HostEntry;
use pve_lxc_core::host::{DEFAULT_PORT, DEFAULT_USER, get_ssh_config_path};
use serde_json::json;

use crate::commands::Globals;
use crate::output::print_result;

#[derive(Args, Debug)]
pub struct HostListArgs {
    /// Connect to every host and show its PVE version
    #[arg(long)]
    pub probe: bool,
}

fn host_row(entry: &HostEntry) -> (String, String, String) {
    (
        entry.hostname().unwrap_or(&entry.name).to_string(),
        entry.user().unwrap_or(DEFAULT_USER).to_string(),
        entry
            .port()
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_PORT.to_string()),
    )
}

pub fn cmd_host_list(args: &HostListArgs, globals: &Globals) -> Result<()> {
    let manager = globals.hosts()?;
    let hosts = manager.list()?;
    let default_host = manager.get_default();

    if globals.json {
        let reports: Vec<_> = if args.probe {
            hosts.iter().map(|h| manager.test(&h.name)).collect()
        } else {
            Vec::new()
        };
        print_result(
            true,
            json!({ "hosts": hosts, "default": default_host, "tests": reports }),
        );
        return Ok(());
    }

    if globals.quiet {
        for host in &hosts {
            println!("{}", host.name);
        }
        return Ok(());
    }

    if hosts.is_empty() {
        println!("No hosts configured.");
        println!();
        println!(
            "  {} {}",
            style("Add one with:").dim(),
            style("pve-lxc host add <name> --hostname <ip>").yellow()
        );
        return Ok(());
    }

    let mut table = Table::new();
    let mut header = vec!["Name", "Hostname", "User", "Port", "Default"];
    if args.probe {
        header.extend(["Status", "PVE version"]);
    }
    table.set_header(header);

    for host in &hosts {
        let is_default = default_host.as_deref() == Some(host.name.as_str());
        let (hostname, user, port) = host_row(host);
        let name_cell = if is_default {
            Cell::new(&host.name).fg(Color::Cyan)
        } else {
            Cell::new(&host.name)
        };

        let mut row = vec![
            name_cell,
            Cell::new(hostname),
            Cell::new(user),
            Cell::new(port),
            Cell::new(if is_default { "*" } else { "" }),
        ];
        if args.probe {
            let report = manager.test(&host.name);
            row.push(if report.connected {
                Cell::new("online").fg(Color::Green)
            } else {
                Cell::new("offline").fg(Color::Red)
            });
            row.push(Cell::new(report.pve_version.as_deref().unwrap_or("-")));
        }
        table.add_row(row);
    }

    println!("{table}");

    if let Some(path) = get_ssh_config_path() {
        println!();
        println!(
            "  {} {}",
            style("Config file:").dim(),
            style(path.display()).dim()
        );
    }

    Ok(())
}
