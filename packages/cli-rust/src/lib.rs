//! pve-lxc CLI - Provision LXC containers on Proxmox VE
//!
//! This module contains the CLI implementation used by the `pve-lxc` binary.

mod commands;
mod output;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use console::style;
use pve_lxc_core::config::{LoggingConfig, get_user_config_path};
use pve_lxc_core::{Config, ConfigError, ConfigLoader, get_version_long};
use tracing_subscriber::EnvFilter;

use commands::Globals;
use output::Reported;
use output::json::error_document;

/// Provision LXC containers on Proxmox VE, locally or over SSH
#[derive(Parser)]
#[command(name = "pve-lxc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provision LXC containers on Proxmox VE", long_about = None)]
#[command(after_help = "Hosts are read from ~/.ssh/config; see `pve-lxc host --help`.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Run against this host from ~/.ssh/config (default: the default host, else local)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Print a JSON result document instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Increase verbosity level (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an LXC container
    Create(commands::CreateArgs),
    /// Stop and remove an LXC container
    Destroy(commands::DestroyArgs),
    /// Set locale and timezone, install base packages
    Bootstrap(commands::BootstrapArgs),
    /// Install an application into a container
    Deploy(commands::DeployArgs),
    /// List containers
    List(commands::ListArgs),
    /// List installable applications
    Apps(commands::AppsArgs),
    /// Find free IP addresses in a range
    #[command(alias = "free-ip")]
    Ip(commands::IpArgs),
    /// Manage remote PVE hosts
    Host(commands::HostArgs),
}

/// `RUST_LOG` wins; otherwise `-v`/`-vv`, then the configured level
fn log_filter(verbose: u8, configured: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::new(level)
}

fn init_tracing(verbose: u8, json: bool, logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, &logging.level))
        .with_writer(std::io::stderr);

    if json || logging.json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

fn report_config_error(error: &ConfigError, json: bool) -> ! {
    if json {
        println!("{}", error_document(&error.to_string()));
        std::process::exit(1);
    }

    eprintln!("{} Configuration error", style("Error:").red().bold());
    eprintln!();
    eprintln!("  {error}");
    if let Some(path) = get_user_config_path() {
        eprintln!();
        eprintln!("  Config file: {}", style(path.display()).yellow());
    }
    eprintln!();
    eprintln!(
        "  {} Check the config file for syntax errors or unknown fields.",
        style("Tip:").cyan()
    );
    std::process::exit(1);
}

/// Command flags that map onto config keys, as the top layer
fn with_cli_overrides(loader: ConfigLoader, command: &Commands) -> ConfigLoader {
    match command {
        Commands::Bootstrap(args) => {
            loader.with_override("bootstrap.strict", args.strict.then_some(true))
        }
        _ => loader,
    }
}

fn load_config(command: &Commands) -> Result<Config, ConfigError> {
    with_cli_overrides(ConfigLoader::new().with_user_config()?, command).build()
}

fn dispatch(command: &Commands, globals: &Globals, config: &Config) -> Result<()> {
    match command {
        Commands::Create(args) => commands::cmd_create(args, globals, config),
        Commands::Destroy(args) => commands::cmd_destroy(args, globals),
        Commands::Bootstrap(args) => commands::cmd_bootstrap(args, globals, config),
        Commands::Deploy(args) => commands::cmd_deploy(args, globals, config),
        Commands::List(args) => commands::cmd_list(args, globals),
        Commands::Apps(args) => commands::cmd_apps(args, globals),
        Commands::Ip(args) => commands::cmd_ip(args, globals, config),
        Commands::Host(args) => commands::cmd_host(args, globals),
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let config = match load_config(&cli.command) {
        Ok(config) => config,
        Err(e) => report_config_error(&e, cli.json),
    };

    init_tracing(cli.verbose, cli.json, &config.logging);
    tracing::debug!("pve-lxc {}", get_version_long());

    let globals = Globals {
        host: cli.host.clone(),
        json: cli.json,
        quiet: cli.quiet,
    };

    match dispatch(&cli.command, &globals, &config) {
        Err(e) if e.is::<Reported>() => std::process::exit(1),
        Err(e) if globals.json => {
            println!("{}", error_document(&format!("{e:#}")));
            std::process::exit(1);
        }
        other => other,
    }
}
