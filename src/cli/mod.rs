//! Command-line interface for RustRotate
//!
//! A single command: rotate the Tor exit circuit `--count` times (or until
//! interrupted), `--interval` seconds apart, printing each new exit address.

mod report;

pub use report::{ConsoleReporter, OutputFormat};

use crate::config::{self, Config, Overrides};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// RustRotate - Fast Tor exit rotation via the ControlPort
#[derive(Parser, Debug)]
#[command(name = "rustrotate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of times to rotate (0 = infinite)
    #[arg(short = 'n', long)]
    pub count: Option<u64>,

    /// Seconds between each rotation
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Tor ControlPort password (if HashedControlPassword is set in torrc)
    #[arg(short, long, env = "TOR_CONTROL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tor ControlPort host
    #[arg(long)]
    pub control_host: Option<String>,

    /// Tor ControlPort
    #[arg(long)]
    pub control_port: Option<u16>,

    /// Cookie file for cookie authentication (overrides the path Tor reports)
    #[arg(long)]
    pub cookie_file: Option<PathBuf>,

    /// Tor SOCKS host
    #[arg(long)]
    pub socks_host: Option<String>,

    /// Tor SOCKS port
    #[arg(long)]
    pub socks_port: Option<u16>,

    /// Seconds to let Tor build the new circuit before checking the exit
    #[arg(long)]
    pub settle: Option<u64>,

    /// Timeout in seconds for the exit address lookup
    #[arg(long)]
    pub probe_timeout: Option<u64>,

    /// Plain-text IP echo service
    #[arg(long)]
    pub echo_url: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            count: self.count,
            interval_secs: self.interval,
            settle_secs: self.settle,
            control_password: self.password.clone(),
            control_host: self.control_host.clone(),
            control_port: self.control_port,
            cookie_path: self.cookie_file.clone(),
            socks_host: self.socks_host.clone(),
            socks_port: self.socks_port,
            echo_url: self.echo_url.clone(),
            probe_timeout_secs: self.probe_timeout,
        }
    }

    /// Load the config file (if any), apply flags on top and validate the result
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => config::load_from_path(path)?,
            None => Config::default(),
        };

        config.apply_overrides(self.overrides());
        config::validate(&config)?;

        Ok(config)
    }
}

/// Parse command line arguments
pub fn parse() -> Cli {
    Cli::parse()
}
