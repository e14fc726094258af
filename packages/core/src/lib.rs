//! pve-lxc-core - Core library for pve-lxc
//!
//! Provisions LXC containers on Proxmox VE, locally or over SSH:
//! - `exec`: the local/SSH command executor abstraction
//! - `host`: named hosts kept in the SSH client config, plus a default host
//! - `pve`: `pct`/`pvesh`/`pveam` wrappers
//! - `lifecycle`: create, bootstrap, deploy and destroy flows
//!
//! Everything is synchronous. Executors are not meant to be shared between
//! concurrent operations.

pub mod apps;
pub mod config;
pub mod exec;
pub mod gpu;
pub mod host;
pub mod lifecycle;
pub mod network;
pub mod pve;
pub mod system;
pub mod validation;
pub mod version;

pub use config::{Config, ConfigError, ConfigLoader};
pub use exec::{CommandExecutor, CommandResult, ExecError, LocalExecutor, SshExecutor};
pub use host::{HostEntry, HostError, HostManager, HostSpec, HostTestReport};
pub use lifecycle::{
    BootstrapMode, CreateRequest, CreateResult, LifecycleError, bootstrap_container,
    create_container, deploy_app, destroy_container, wait_for_ready,
};
pub use pve::{Container, ContainerStatus, Pve};
pub use version::{get_version, get_version_long};
