//! Logging configuration
//!
//! Structured logging with tracing. Logs go to stderr so stdout only
//! carries the rotation report.

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Initialize logging; `RUST_LOG` wins over the verbosity flag
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn default_directive(level: Level) -> String {
    format!("rustrotate={}", level)
}
