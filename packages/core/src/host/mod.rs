//! Host management module
//!
//! Provides functionality for managing remote PVE hosts:
//! - Host inventory kept as `Host` blocks in the SSH client config
//! - Default host pointer persisted in the user config
//! - Resolution of a host name to a command executor, and probing

mod error;
mod manager;
mod schema;
mod ssh_config;
mod storage;

// Public exports
pub use error::HostError;
pub use manager::{HostManager, HostTestReport};
pub use schema::{DEFAULT_PORT, DEFAULT_USER, HostEntry, HostSpec};
pub use ssh_config::{SshConfigParser, get_ssh_config_path};
pub use storage::DefaultHostStore;
