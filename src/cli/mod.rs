//! Command-line interface for the foreman daemon and its action surface.

pub mod commands;
pub mod id_resolver;
pub mod output;
pub mod types;

pub use output::progress::create_spinner;
pub use types::{Cli, Commands};

/// Print a failed command's error chain and exit non-zero.
///
/// JSON mode writes a single object to stdout so scripts can parse failures
/// the same way as successes.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    if json {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": causes,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err}", console::style("error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  {} {cause}", console::style("caused by:").dim());
        }
    }
    std::process::exit(1);
}
