//! pve-lxc host - Manage remote PVE hosts
//!
//! Hosts live as `Host` blocks in `~/.ssh/config`, so plain `ssh <name>`
//! reaches the same machine the CLI does.

mod add;
mod list;
mod remove;
mod set_default;

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Globals;

pub use add::HostAddArgs;
pub use list::HostListArgs;
pub use remove::HostRemoveArgs;
pub use set_default::HostSetDefaultArgs;
pub use test::HostTestArgs;

#[derive(Args, Debug)]
pub struct HostArgs {
    #[command(subcommand)]
    pub command: HostCommands,
}

#[derive(Subcommand, Debug)]
pub enum HostCommands {
    /// Add a PVE host to the SSH config
    Add(HostAddArgs),
    /// Remove a PVE host
    Remove(HostRemoveArgs),
    /// List configured hosts
    List(HostListArgs),
    /// Test the connection to a host
    Test(HostTestArgs),
    /// Set (or show) the host used when --host is not given
    SetDefault(HostSetDefaultArgs),
}

pub fn cmd_host(args: &HostArgs, globals: &Globals) -> Result<()> {
    match &args.command {
        HostCommands::Add(args) => add::cmd_host_add(args, globals),
        HostCommands::Remove(args) => remove::cmd_host_remove(args, globals),
        HostCommands::List(args) => list::cmd_host_list(args, globals),
        HostCommands::Test(args) => test::cmd_host_test(args, globals),
        HostCommands::SetDefault(args) => set_default::cmd_host_set_default(args, globals),
    }
}
