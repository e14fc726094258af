//! pve-lxc host remove - Remove a remote PVE host

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use serde_json::json;

use crate::commands::Globals;
use crate::output::print_result;

#[derive(Args, Debug)]
pub struct HostRemoveArgs {
    /// Name of the host to remove
    pub name: String,
}

pub fn cmd_host_remove(args: &HostRemoveArgs, globals: &Globals) -> Result<()> {
    let manager = globals.hosts()?;
    if !manager.remove(&args.name)? {
        bail!("Host '{}' not found", args.name);
    }

    if globals.json {
        print_result(true, json!({ "name": args.name }));
    } else if !globals.quiet {
        println!(
            "{} Host '{}' removed",
            style("\u{2713}").green(),
            style(&args.name).cyan()
        );
    }
    Ok(())
}
