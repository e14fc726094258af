//! pve-lxc ip - Find free IP addresses by ping scan

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use pve_lxc_core::Config;
use pve_lxc_core::network::Network;
use serde_json::json;

use super::{Globals, ParamFile};
use crate::output::{CommandSpinner, print_result};

const SAMPLES: &str = "\
Examples:
  pve-lxc ip 192.168.1.21-50     scan a range with a full subnet
  pve-lxc ip 21-50               scan the PVE host's subnet
  pve-lxc ip 21-50 --json        machine-readable output";

#[derive(Args, Debug, Default)]
#[command(after_help = SAMPLES)]
pub struct IpArgs {
    /// Range to scan (21-50 or 192.168.1.21-50)
    pub range: Option<String>,

    /// Print only the first free address
    #[arg(long)]
    pub first: bool,

    /// YAML file with an `ip_range` key; the argument takes precedence
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,
}

fn resolve_range(args: &IpArgs, params: &ParamFile) -> Result<String> {
    match args.range.clone().or_else(|| params.string("ip_range")) {
        Some(range) => Ok(range),
        None => bail!("No IP range given.\n\n{SAMPLES}"),
    }
}

pub fn cmd_ip(args: &IpArgs, globals: &Globals, config: &Config) -> Result<()> {
    let params = ParamFile::load(args.config.as_deref())?;
    let range = resolve_range(args, &params)?;

    let pve = globals.connect()?;
    let network = Network::new(pve.executor(), config.network.ping_timeout);

    let spinner = CommandSpinner::new_maybe(&format!("Scanning {range}..."), globals.silent());
    let mut free = match network.list_free_ips(&range) {
        Ok(free) => free,
        Err(e) => {
            spinner.fail("Scan failed");
            return Err(e.into());
        }
    };
    if args.first {
        free.truncate(1);
    }

    if globals.json {
        print_result(true, json!({ "free_ips": free, "count": free.len() }));
        return Ok(());
    }

    if free.is_empty() {
        spinner.fail(&format!("No free IPs in {range}"));
        return Ok(());
    }

    spinner.success(&format!("Found {} free IPs", free.len()));
    for ip in &free {
        if globals.quiet {
            println!("{ip}");
        } else {
            println!("  {}", style(ip).cyan());
        }
    }

    Ok(())
}
