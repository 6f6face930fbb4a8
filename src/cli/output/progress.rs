//! Spinner for operations that wait on the network or on running tasks.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed}]";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";

/// Create a spinner on stderr; hidden in JSON mode so stdout stays parseable.
pub fn create_spinner(message: impl Into<String>, json_mode: bool) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if json_mode {
        spinner.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        spinner.set_draw_target(ProgressDrawTarget::stderr());
    }
    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS);
    spinner.set_style(style);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
