//! pve-lxc host set-default - Set or show the default host

use anyhow::Result;
use clap::Args;
use console::style;
use serde_json::json;

use crate::commands::Globals;
use crate::output::print_result;

#[derive(Args, Debug)]
pub struct HostSetDefaultArgs {
    /// Host to use when --host is not given (omit to show the current one)
    pub name: Option<String>,
}

pub fn cmd_host_set_default(args: &HostSetDefaultArgs, globals: &Globals) -> Result<()> {
    let manager = globals.hosts()?;

    let Some(name) = &args.name else {
        let current = manager.get_default();
        if globals.json {
            print_result(true, json!({ "default": current }));
        } else if globals.quiet {
            println!("{}", current.as_deref().unwrap_or("local"));
        } else {
            match current {
                Some(name) => println!("Default host: {}", style(name).cyan()),
                None => println!("Default host: {} (this machine)", style("local").cyan()),
            }
        }
        return Ok(());
    };

    manager.set_default(name)?;

    if globals.json {
        print_result(true, json!({ "default": name }));
    } else if !globals.quiet {
        println!(
            "{} Default host set to '{}'",
            style("\u{2713}").green(),
            style(name).cyan()
        );
        println!(
            "  {} Commands will target {} unless {} is given.",
            style("Note:").dim(),
            style(name).cyan(),
            style("--host").yellow()
        );
    }
    Ok(())
}
