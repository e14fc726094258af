//! pve-lxc list - List LXC containers

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table};
use console::style;
use pve_lxc_core::{Container, ContainerStatus};

use super::Globals;
use crate::output::print_result;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show only running containers
    #[arg(short, long)]
    pub running: bool,
}

fn filter(containers: Vec<Container>, running_only: bool) -> Vec<Container> {
    containers
        .into_iter()
        .filter(|c| !running_only || c.is_running())
        .collect()
}

pub fn cmd_list(args: &ListArgs, globals: &Globals) -> Result<()> {
    let pve = globals.connect()?;
    let containers = filter(pve.list_containers()?, args.running);

    if globals.json {
        print_result(true, serde_json::json!({ "containers": containers }));
        return Ok(());
    }

    if globals.quiet {
        for container in &containers {
            println!("{}", container.ctid);
        }
        return Ok(());
    }

    if containers.is_empty() {
        println!("No containers found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "CTID", "Name", "Status", "IP", "Cores", "Memory", "Disk",
    ]);
    for container in &containers {
        let status_color = match container.status {
            ContainerStatus::Running => Color::Green,
            ContainerStatus::Stopped => Color::Red,
        };
        table.add_row(vec![
            Cell::new(container.ctid),
            Cell::new(&container.name),
            Cell::new(container.status).fg(status_color),
            Cell::new(container.ip.as_deref().unwrap_or("-")),
            Cell::new(container.cores),
            Cell::new(format!("{} MB", container.memory)),
            Cell::new(format!("{} GB", container.disk)),
        ]);
    }
    println!("{table}");

    let running = containers.iter().filter(|c| c.is_running()).count();
    println!();
    println!(
        "  {} {} total, {} running",
        style("Containers:").dim(),
        containers.len(),
        running
    );

    Ok(())
}
