//! Error taxonomy for the rotation core
//!
//! Control-port and probe failures are typed so the rotation loop can turn
//! them into per-iteration outcomes. Application plumbing (config, startup)
//! uses `anyhow` instead.

use std::time::Duration;
use thiserror::Error;

/// Failure while requesting a new identity over the control port
#[derive(Debug, Error)]
pub enum ControlError {
    /// TCP connect to the control port failed or timed out
    #[error("failed to connect to Tor control port {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Authentication was rejected or could not be attempted
    #[error("control port authentication failed: {0}")]
    Auth(String),

    /// The NEWNYM signal was rejected or its reply was lost
    #[error("control signal failed: {0}")]
    Signal(String),
}

impl ControlError {
    /// Short tag for logs and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Auth(_) => "auth",
            Self::Signal(_) => "signal",
        }
    }
}

/// Failure while querying the exit address through the SOCKS proxy
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("probe transport error: {0}")]
    Transport(String),

    #[error("malformed probe response: {0}")]
    MalformedResponse(String),
}

impl ProbeError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::MalformedResponse(_) => "malformed-response",
        }
    }
}
