//! pve-lxc host add - Add a remote PVE host

use anyhow::Result;
use clap::Args;
use console::style;
use pve_lxc_core::HostSpec;
use pve_lxc_core::host::{DEFAULT_PORT, DEFAULT_USER};
use serde_json::json;

use crate::commands::Globals;
use crate::output::{CommandSpinner, print_result};

#[derive(Args, Debug)]
pub struct HostAddArgs {
    /// Name to identify this host (used as the SSH alias)
    pub name: String,

    /// SSH hostname or IP address
    #[arg(short = 'H', long)]
    pub hostname: String,

    /// SSH username
    #[arg(short, long, default_value = DEFAULT_USER)]
    pub user: String,

    /// SSH port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path to SSH identity file (private key)
    #[arg(short, long, alias = "identity-file")]
    pub key: Option<String>,

    /// Run `pveversion` on the host after adding it
    #[arg(long)]
    pub verify: bool,

    /// Also make this the default host
    #[arg(long)]
    pub default: bool,
}

fn spec_from_args(args: &HostAddArgs) -> HostSpec {
    let spec = HostSpec::new(&args.name, &args.hostname)
        .with_user(&args.user)
        .with_port(args.port);
    match &args.key {
        Some(key) => spec.with_identity_file(key),
        None => spec,
    }
}

pub fn cmd_host_add(args: &HostAddArgs, globals: &Globals) -> Result<()> {
    let manager = globals.hosts()?;
    manager.add(&spec_from_args(args))?;
    if args.default {
        manager.set_default(&args.name)?;
    }

    let report = if args.verify {
        let spinner = CommandSpinner::new_maybe(
            &format!("Testing connection to {}...", args.name),
            globals.silent(),
        );
        let report = manager.test(&args.name);
        if report.connected {
            spinner.success("Connection successful");
        } else {
            spinner.fail("Connection failed");
        }
        Some(report)
    } else {
        None
    };

    if globals.json {
        print_result(
            true,
            json!({ "name": args.name, "default": args.default, "test": report }),
        );
        return Ok(());
    }

    if !globals.quiet {
        println!(
            "{} Host '{}' added ({}@{}:{})",
            style("\u{2713}").green(),
            style(&args.name).cyan(),
            args.user,
            args.hostname,
            args.port
        );
        if args.default {
            println!("  {} now the default host", style("Note:").dim());
        }
        if let Some(error) = report.and_then(|r| r.error) {
            println!("  {} {}", style("Warning:").yellow(), error);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_carries_every_flag() {
        let args = HostAddArgs {
            name: "pve1".to_string(),
            hostname: "10.0.0.1".to_string(),
            user: "admin".to_string(),
            port: 2222,
            key: Some("~/.ssh/pve".to_string()),
            verify: false,
            default: false,
        };
        let spec = spec_from_args(&args);
        assert_eq!(spec.name, "pve1");
        assert_eq!(spec.hostname, "10.0.0.1");
        assert_eq!(spec.user, "admin");
        assert_eq!(spec.port, 2222);
        assert_eq!(spec.identity_file.as_deref(), Some("~/.ssh/pve"));
    }
}
