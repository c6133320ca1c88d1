//! Per-iteration results and the reporting seam

use serde::Serialize;

/// Placeholder address when no address could be obtained
pub const ADDRESS_UNAVAILABLE: &str = "unavailable";

/// How an iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    RenewalFailed,
    ProbeFailed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RenewalFailed => "renewal-failed",
            Self::ProbeFailed => "probe-failed",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one renew → settle → probe cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationResult {
    /// 1-based, equals the number of renewals attempted so far
    pub iteration: u64,
    /// Last address successfully probed before this iteration
    pub previous_address: Option<String>,
    /// New exit address, or `ADDRESS_UNAVAILABLE`
    pub new_address: String,
    pub outcome: Outcome,
    /// Error kind tag (e.g. "auth", "timeout")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IterationResult {
    pub fn success(iteration: u64, previous_address: Option<String>, address: String) -> Self {
        Self {
            iteration,
            previous_address,
            new_address: address,
            outcome: Outcome::Success,
            error_kind: None,
            error: None,
        }
    }

    pub fn failed(
        iteration: u64,
        previous_address: Option<String>,
        outcome: Outcome,
        kind: &'static str,
        error: String,
    ) -> Self {
        Self {
            iteration,
            previous_address,
            new_address: ADDRESS_UNAVAILABLE.to_string(),
            outcome,
            error_kind: Some(kind),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Whether the exit moved. `None` when there is nothing to compare.
    pub fn changed(&self) -> Option<bool> {
        if !self.is_success() {
            return None;
        }
        self.previous_address
            .as_ref()
            .map(|prev| prev != &self.new_address)
    }
}

/// Receives iteration results. Must not block the loop.
pub trait Reporter: Send + Sync {
    fn report(&self, result: &IterationResult);
}

/// Counters returned when the loop finishes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub iterations: u64,
    pub successes: u64,
    pub renewal_failures: u64,
    pub probe_failures: u64,
    pub interrupted: bool,
}

impl LoopSummary {
    pub fn record(&mut self, result: &IterationResult) {
        match result.outcome {
            Outcome::Success => self.successes += 1,
            Outcome::RenewalFailed => self.renewal_failures += 1,
            Outcome::ProbeFailed => self.probe_failures += 1,
        }
    }
}
