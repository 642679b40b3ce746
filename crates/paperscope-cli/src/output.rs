use std::fmt::Display;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Terminal styling that can be switched off with `--no-color`.
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    color: bool,
}

impl Painter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn ok(&self, s: impl Display) -> String {
        if self.color { s.green().to_string() } else { s.to_string() }
    }

    pub fn err(&self, s: impl Display) -> String {
        if self.color { s.red().bold().to_string() } else { s.to_string() }
    }

    pub fn warn(&self, s: impl Display) -> String {
        if self.color { s.yellow().to_string() } else { s.to_string() }
    }

    pub fn dim(&self, s: impl Display) -> String {
        if self.color { s.dimmed().to_string() } else { s.to_string() }
    }

    pub fn bold(&self, s: impl Display) -> String {
        if self.color { s.bold().to_string() } else { s.to_string() }
    }

    pub fn accent(&self, s: impl Display) -> String {
        if self.color { s.cyan().to_string() } else { s.to_string() }
    }
}

/// Spinner on stderr while a backend call is running. Hidden when stderr is not a terminal.
pub fn spinner(message: impl Into<String>) -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")?);
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}
