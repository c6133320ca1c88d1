//! Exit address probe
//!
//! Asks a plain-text IP echo service for our public address, routed through
//! Tor's SOCKS port with remote name resolution (`socks5h`), so neither the
//! request nor its DNS lookup leaves Tor.

use crate::config::{ProbeConfig, TorConfig};
use crate::error::ProbeError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// Something that can report the current exit address
#[async_trait]
pub trait ExitProbe: Send + Sync {
    async fn current_exit_address(&self, timeout: Duration) -> Result<String, ProbeError>;
}

#[async_trait]
impl<T: ExitProbe + ?Sized> ExitProbe for std::sync::Arc<T> {
    async fn current_exit_address(&self, timeout: Duration) -> Result<String, ProbeError> {
        (**self).current_exit_address(timeout).await
    }
}

/// Probe that goes through the Tor SOCKS proxy
pub struct SocksExitProbe {
    client: reqwest::Client,
    echo_url: String,
}

impl SocksExitProbe {
    pub fn new(tor: &TorConfig, probe: &ProbeConfig) -> Result<Self> {
        let socks_url = format!("socks5h://{}", tor.socks_addr());

        // NEWNYM only affects new streams, so every probe must open its own
        // SOCKS connection instead of reusing an idle one on the old circuit
        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(&socks_url).context("Failed to configure SOCKS proxy")?)
            .pool_max_idle_per_host(0)
            .build()
            .context("Failed to build HTTP client")?;

        debug!("Exit probe: {} via {}", probe.echo_url, socks_url);

        Ok(Self {
            client,
            echo_url: probe.echo_url.clone(),
        })
    }
}

impl SocksExitProbe {
    async fn fetch_body(&self, timeout: Duration) -> Result<String, ProbeError> {
        let response = self
            .client
            .get(&self.echo_url)
            .header(reqwest::header::CONNECTION, "close")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::MalformedResponse(format!(
                "echo service returned HTTP {}",
                status
            )));
        }

        response.text().await.map_err(|e| classify(e, timeout))
    }
}

#[async_trait]
impl ExitProbe for SocksExitProbe {
    async fn current_exit_address(&self, timeout: Duration) -> Result<String, ProbeError> {
        // reqwest's own timeout covers the request; this bounds anything it misses
        let body = match tokio::time::timeout(timeout, self.fetch_body(timeout)).await {
            Ok(result) => result?,
            Err(_) => return Err(ProbeError::Timeout(timeout)),
        };

        parse_address(&body)
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout(timeout)
    } else if err.is_decode() {
        ProbeError::MalformedResponse(err.to_string())
    } else {
        ProbeError::Transport(format_chain(&err))
    }
}

// reqwest's Display hides the proxy/IO cause
fn format_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Trim the echo body and check it is an IP address
pub fn parse_address(body: &str) -> Result<String, ProbeError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ProbeError::MalformedResponse("empty body".to_string()));
    }

    match trimmed.parse::<IpAddr>() {
        Ok(_) => Ok(trimmed.to_string()),
        Err(_) => {
            let preview: String = trimmed.chars().take(64).collect();
            Err(ProbeError::MalformedResponse(format!(
                "not an IP address: {:?}",
                preview
            )))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_trims() {
        assert_eq!(parse_address("185.220.101.4\n").unwrap(), "185.220.101.4");
        assert_eq!(
            parse_address("  2a0b:f4c2::1 \r\n").unwrap(),
            "2a0b:f4c2::1"
        );
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert!(matches!(
            parse_address(""),
            Err(ProbeError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_address("   \n"),
            Err(ProbeError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_address("<html>blocked</html>"),
            Err(ProbeError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_builds_with_default_config() {
        let probe = SocksExitProbe::new(&TorConfig::default(), &ProbeConfig::default());
        assert!(probe.is_ok());
    }
}
