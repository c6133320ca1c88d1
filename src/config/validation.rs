//! Configuration validation
//!
//! Fail-fast validation of configuration invariants.

use super::Config;
use anyhow::{bail, Context, Result};

/// Validate configuration invariants
pub fn validate(config: &Config) -> Result<()> {
    validate_tor(config)?;
    validate_timing(config)?;
    validate_probe(config)?;
    Ok(())
}

fn validate_tor(config: &Config) -> Result<()> {
    let tor = &config.tor;

    if tor.control_host.trim().is_empty() {
        bail!("tor.control_host cannot be empty");
    }
    if tor.socks_host.trim().is_empty() {
        bail!("tor.socks_host cannot be empty");
    }
    if tor.control_port == 0 {
        bail!("tor.control_port cannot be 0");
    }
    if tor.socks_port == 0 {
        bail!("tor.socks_port cannot be 0");
    }
    if tor.control_addr() == tor.socks_addr() {
        bail!(
            "tor.control_port and tor.socks_port point at the same endpoint ({})",
            tor.control_addr()
        );
    }

    // An empty password would silently downgrade to PROTOCOLINFO-based auth
    if matches!(tor.control_password.as_deref(), Some("")) {
        bail!("tor.control_password is set but empty");
    }

    Ok(())
}

fn validate_timing(config: &Config) -> Result<()> {
    if config.tor.control_timeout_secs == 0 {
        bail!("tor.control_timeout_secs must be greater than 0");
    }
    if config.probe.timeout_secs == 0 {
        bail!("probe.timeout_secs must be greater than 0");
    }
    Ok(())
}

fn validate_probe(config: &Config) -> Result<()> {
    let url = url::Url::parse(&config.probe.echo_url)
        .with_context(|| format!("probe.echo_url is not a URL: {}", config.probe.echo_url))?;

    match url.scheme() {
        "http" | "https" => {},
        other => bail!("probe.echo_url must use http or https (got {})", other),
    }

    if url.host_str().is_none() {
        bail!("probe.echo_url has no host: {}", config.probe.echo_url);
    }

    Ok(())
}
