//! Spinner shown on stderr while a harvest runs.
//!
//! Uses `indicatif`; hidden in quiet and JSON modes so stdout stays clean.

use crate::cli::output;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("\u{25b8}\u{25b9}\u{25b8}\u{25b9}\u{25b8}")
}

/// Create a ticking spinner, or a hidden one when output is suppressed.
pub fn spinner(message: &str) -> ProgressBar {
    if output::is_quiet() || output::is_json() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(spinner_style());
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Print a line above the spinner without tearing it.
pub fn note(bar: &ProgressBar, line: &str) {
    if bar.is_hidden() {
        return;
    }
    bar.println(line);
}
