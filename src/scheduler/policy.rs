//! Rotation policy

use crate::config::Config;
use std::time::Duration;

/// Immutable rotation settings, built once at startup
#[derive(Clone)]
pub struct RotationPolicy {
    /// Rotations to perform, 0 = until interrupted
    pub count: u64,
    /// Wait between the end of one iteration and the next renewal
    pub interval: Duration,
    /// Grace period after NEWNYM before probing
    pub settle_delay: Duration,
    /// Bound on each exit probe
    pub probe_timeout: Duration,
    /// Control port password
    pub credential: Option<String>,
}

impl RotationPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            count: config.rotation.count,
            interval: Duration::from_secs(config.rotation.interval_secs),
            settle_delay: Duration::from_secs(config.rotation.settle_secs),
            probe_timeout: config.probe.timeout(),
            credential: config.tor.control_password.clone(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.count == 0
    }

    /// True once `completed` iterations satisfy the count
    pub fn is_finished(&self, completed: u64) -> bool {
        self.count > 0 && completed >= self.count
    }
}

impl std::fmt::Debug for RotationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationPolicy")
            .field("count", &self.count)
            .field("interval", &self.interval)
            .field("settle_delay", &self.settle_delay)
            .field("probe_timeout", &self.probe_timeout)
            .field("credential", &self.credential.as_ref().map(|_| "****"))
            .finish()
    }
}
