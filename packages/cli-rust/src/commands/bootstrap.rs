//! pve-lxc bootstrap - Base setup of a container

use anyhow::Result;
use clap::Args;
use pve_lxc_core::{BootstrapMode, Config, bootstrap_container};
use serde_json::json;

use super::Globals;
use crate::output::{CommandSpinner, Reported, print_result, step_prefix};

#[derive(Args, Debug)]
pub struct BootstrapArgs {
    /// Container ID
    pub ctid: u32,

    /// Stop at the first failed step (overrides bootstrap.strict)
    #[arg(long)]
    pub strict: bool,
}

pub fn cmd_bootstrap(args: &BootstrapArgs, globals: &Globals, config: &Config) -> Result<()> {
    let mode = BootstrapMode::from_strict(config.bootstrap.strict);
    let pve = globals.connect()?;

    let spinner = CommandSpinner::new_maybe(
        &format!("Bootstrapping container {}...", args.ctid),
        globals.silent(),
    );
    let outcome = bootstrap_container(&pve, args.ctid, &config.bootstrap, mode, |step| {
        spinner.update(&format!(
            "{} {}",
            step_prefix(step.current, step.total),
            step.description
        ));
    });

    let completed = match outcome {
        Ok(completed) => completed,
        Err(e) => {
            spinner.fail("Bootstrap failed");
            return Err(e.into());
        }
    };

    if globals.json {
        if completed {
            print_result(true, json!({ "ctid": args.ctid }));
        } else {
            print_result(false, json!({ "ctid": args.ctid, "message": "Bootstrap failed" }));
        }
    } else if completed {
        spinner.success(&format!("Container {} bootstrapped", args.ctid));
    } else {
        spinner.fail("Bootstrap failed");
        if globals.quiet {
            eprintln!("Bootstrap of container {} failed", args.ctid);
        }
    }

    if completed {
        Ok(())
    } else {
        Err(Reported.into())
    }
}
