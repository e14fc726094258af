//! pve-lxc destroy - Remove an LXC container

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use dialoguer::Confirm;
use pve_lxc_core::destroy_container;
use pve_lxc_core::validation::validate_ctid;
use serde_json::json;

use super::Globals;
use crate::output::{CommandSpinner, Reported, print_result, state_style};

#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Container ID
    pub ctid: u32,

    /// Stop a running container without asking
    #[arg(short, long)]
    pub force: bool,
}

pub fn cmd_destroy(args: &DestroyArgs, globals: &Globals) -> Result<()> {
    let ctid = validate_ctid(args.ctid)?;
    let pve = globals.connect()?;

    let Some(container) = pve.get_container(ctid)? else {
        bail!("Container {ctid} not found");
    };

    let mut force = args.force;
    if container.is_running() && !force {
        if globals.silent() {
            bail!("Container {ctid} is running. Use --force to stop and destroy it.");
        }

        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Container {} ({}) is {}. Stop and destroy?",
                ctid,
                container.name,
                state_style(container.status.as_str())
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
        force = true;
    }

    let spinner =
        CommandSpinner::new_maybe(&format!("Destroying container {ctid}..."), globals.silent());
    let destroyed = match destroy_container(&pve, ctid, force) {
        Ok(destroyed) => destroyed,
        Err(e) => {
            spinner.fail("Destroy failed");
            return Err(e.into());
        }
    };

    if destroyed {
        tracing::info!("Container {ctid} destroyed");
        if globals.json {
            print_result(
                true,
                json!({ "ctid": ctid, "message": format!("Container {ctid} destroyed") }),
            );
        } else {
            spinner.success(&format!(
                "Container {} destroyed",
                style(ctid).cyan()
            ));
        }
        return Ok(());
    }

    let message = format!("Failed to destroy container {ctid}");
    if globals.json {
        print_result(false, json!({ "ctid": ctid, "message": message }));
        return Err(Reported.into());
    }
    spinner.clear();
    bail!(message)
}
