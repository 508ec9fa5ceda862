//! Status lines and the resolution spinner, all on stderr so that
//! `kiln plan --json` keeps stdout clean.

use std::io::Write;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

const LABEL_WIDTH: usize = 12;

fn emit(style: Style, label: &str, message: &str) {
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "{:>LABEL_WIDTH$} {message}", style.bold().apply_to(label));
}

/// `      Locked 4 packages`, label right-aligned in green.
pub fn status(label: &str, message: &str) {
    emit(Style::new().green(), label, message);
}

/// Informational variant of [`status`] (cyan label).
pub fn status_info(label: &str, message: &str) {
    emit(Style::new().cyan(), label, message);
}

/// Warning variant of [`status`] (yellow label).
pub fn status_warn(label: &str, message: &str) {
    emit(Style::new().yellow(), label, message);
}

/// Spinner shown while the resolver runs; callers `finish_and_clear` it.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
