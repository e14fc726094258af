//! Color utilities for CLI output

use console::{Style, StyledObject};

/// Style a container status
///
/// - "running" -> green bold
/// - "stopped" -> red
/// - other -> dim
pub fn state_style(state: &str) -> StyledObject<String> {
    let style = match state.to_lowercase().as_str() {
        "running" => Style::new().green().bold(),
        "stopped" => Style::new().red(),
        _ => Style::new().dim(),
    };
    style.apply_to(state.to_string())
}

/// Dimmed `[current/total]` prefix for step progress
pub fn step_prefix(current: usize, total: usize) -> StyledObject<String> {
    Style::new().dim().apply_to(format!("[{current}/{total}]"))
}
