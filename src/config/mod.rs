//! Configuration loading and validation
//!
//! Handles TOML configuration parsing with strict validation.
//! No runtime mutation - configuration is immutable once resolved.

pub mod file;
mod validation;

pub use file::load_from_path;
pub use validation::validate;

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub tor: TorConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// Values given on the command line; `None` keeps the file/default value
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub count: Option<u64>,
    pub interval_secs: Option<u64>,
    pub settle_secs: Option<u64>,
    pub control_password: Option<String>,
    pub control_host: Option<String>,
    pub control_port: Option<u16>,
    pub cookie_path: Option<PathBuf>,
    pub socks_host: Option<String>,
    pub socks_port: Option<u16>,
    pub echo_url: Option<String>,
    pub probe_timeout_secs: Option<u64>,
}

impl Config {
    /// Layer command-line values over the loaded configuration
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.count {
            self.rotation.count = v;
        }
        if let Some(v) = overrides.interval_secs {
            self.rotation.interval_secs = v;
        }
        if let Some(v) = overrides.settle_secs {
            self.rotation.settle_secs = v;
        }
        if let Some(v) = overrides.control_password {
            self.tor.control_password = Some(v);
        }
        if let Some(v) = overrides.control_host {
            self.tor.control_host = v;
        }
        if let Some(v) = overrides.control_port {
            self.tor.control_port = v;
        }
        if let Some(v) = overrides.cookie_path {
            self.tor.cookie_path = Some(v);
        }
        if let Some(v) = overrides.socks_host {
            self.tor.socks_host = v;
        }
        if let Some(v) = overrides.socks_port {
            self.tor.socks_port = v;
        }
        if let Some(v) = overrides.echo_url {
            self.probe.echo_url = v;
        }
        if let Some(v) = overrides.probe_timeout_secs {
            self.probe.timeout_secs = v;
        }
    }
}

/// Tor daemon connection
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TorConfig {
    #[serde(default = "default_control_host")]
    pub control_host: String,
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    pub control_password: Option<String>,
    /// Cookie file to use instead of the one Tor advertises
    pub cookie_path: Option<PathBuf>,
    /// Bound on each control-port exchange
    #[serde(default = "default_control_timeout")]
    pub control_timeout_secs: u64,
    #[serde(default = "default_socks_host")]
    pub socks_host: String,
    #[serde(default = "default_socks_port")]
    pub socks_port: u16,
}

impl TorConfig {
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.control_host, self.control_port)
    }

    pub fn socks_addr(&self) -> String {
        format!("{}:{}", self.socks_host, self.socks_port)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout_secs)
    }
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            control_host: default_control_host(),
            control_port: default_control_port(),
            control_password: None,
            cookie_path: None,
            control_timeout_secs: default_control_timeout(),
            socks_host: default_socks_host(),
            socks_port: default_socks_port(),
        }
    }
}

// Keep the password out of logs
impl std::fmt::Debug for TorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorConfig")
            .field("control_host", &self.control_host)
            .field("control_port", &self.control_port)
            .field(
                "control_password",
                &self.control_password.as_ref().map(|_| "****"),
            )
            .field("cookie_path", &self.cookie_path)
            .field("control_timeout_secs", &self.control_timeout_secs)
            .field("socks_host", &self.socks_host)
            .field("socks_port", &self.socks_port)
            .finish()
    }
}

fn default_control_host() -> String {
    "127.0.0.1".to_string()
}
fn default_control_port() -> u16 {
    9051
}
fn default_control_timeout() -> u64 {
    10
}
fn default_socks_host() -> String {
    "127.0.0.1".to_string()
}
fn default_socks_port() -> u16 {
    9050
}

/// Rotation schedule
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotationConfig {
    /// Number of rotations, 0 = run until interrupted
    #[serde(default)]
    pub count: u64,
    /// Seconds between rotations
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Seconds to let Tor build the new circuit before probing
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            count: 0,
            interval_secs: default_interval(),
            settle_secs: default_settle(),
        }
    }
}

fn default_interval() -> u64 {
    60
}
fn default_settle() -> u64 {
    3
}

/// Exit address probe
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Plain-text IP echo endpoint
    #[serde(default = "default_echo_url")]
    pub echo_url: String,
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            echo_url: default_echo_url(),
            timeout_secs: default_probe_timeout(),
        }
    }
}

fn default_echo_url() -> String {
    "http://checkip.amazonaws.com".to_string()
}
fn default_probe_timeout() -> u64 {
    10
}
