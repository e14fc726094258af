//! Output utilities for CLI commands
//!
//! Spinners for long-running PVE operations, color helpers for container
//! state, and the JSON result document printed with `--json`.

pub mod colors;
pub mod json;
pub mod spinner;

pub use colors::{state_style, step_prefix};
pub use json::{Reported, print_result};
pub use spinner::CommandSpinner;
