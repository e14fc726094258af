//! Command spinner with elapsed time display

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while a command talks to the PVE host
///
/// Becomes a no-op in quiet or JSON mode so that nothing but the result
/// reaches stdout.
pub struct CommandSpinner {
    bar: Option<ProgressBar>,
}

impl CommandSpinner {
    /// Start ticking immediately; shows `spinner message (HH:MM:SS)`
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed_precise:.dim})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("\u{28CB}\u{2819}\u{2839}\u{2838}\u{283C}\u{2834}\u{2826}\u{2827}\u{2807}\u{280F}");
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Spinner that stays silent when `silent` is set
    pub fn new_maybe(message: &str, silent: bool) -> Self {
        if silent {
            Self { bar: None }
        } else {
            Self::new(message)
        }
    }

    /// Spinner drawn nowhere, plus a handle to inspect how it ended
    #[cfg(test)]
    pub fn hidden() -> (Self, ProgressBar) {
        let bar = ProgressBar::hidden();
        (Self { bar: Some(bar.clone()) }, bar)
    }

    pub fn update(&self, message: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_message(message.to_string());
        }
    }

    /// Print a line above the spinner without breaking its animation
    pub fn println(&self, line: &str) {
        if let Some(ref bar) = self.bar {
            bar.println(line);
        }
    }

    pub fn success(self, message: &str) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(format!(
                "{} {}",
                console::style("\u{2713}").green(),
                message
            ));
        }
    }

    pub fn fail(self, message: &str) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(format!("{} {}", console::style("\u{2717}").red(), message));
        }
    }

    /// Remove the spinner line entirely
    pub fn clear(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
