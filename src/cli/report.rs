//! Console reporting
//!
//! Text output for humans, one JSON object per line for scripts.

use crate::scheduler::{IterationResult, LoopSummary, Outcome, Reporter, RotationPolicy};
use clap::ValueEnum;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Prints iteration results to stdout
pub struct ConsoleReporter {
    format: OutputFormat,
}

impl ConsoleReporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn banner(&self, policy: &RotationPolicy) -> String {
        let rotations = if policy.is_unbounded() {
            "infinite".to_string()
        } else {
            policy.count.to_string()
        };

        match self.format {
            OutputFormat::Text => format!(
                "[+] Starting Tor exit rotation: interval={}s, {} rotations\n",
                policy.interval.as_secs(),
                rotations
            ),
            OutputFormat::Json => json!({
                "event": "start",
                "interval_secs": policy.interval.as_secs(),
                "count": policy.count,
            })
            .to_string(),
        }
    }

    pub fn render(&self, result: &IterationResult) -> String {
        match self.format {
            OutputFormat::Text => render_text(result),
            OutputFormat::Json => {
                let mut value = json!({ "event": "iteration" });
                if let (Some(obj), Ok(serde_json::Value::Object(fields))) =
                    (value.as_object_mut(), serde_json::to_value(result))
                {
                    obj.extend(fields);
                }
                if let Some(changed) = result.changed() {
                    value["changed"] = json!(changed);
                }
                value.to_string()
            },
        }
    }

    pub fn render_summary(&self, summary: &LoopSummary) -> String {
        match self.format {
            OutputFormat::Text => {
                let headline = if summary.interrupted {
                    "\n[*] Interrupted by user. Exiting."
                } else {
                    "[*] Reached requested rotation count. Exiting."
                };
                format!(
                    "{}\n[*] {} iterations: {} ok, {} renewal failures, {} probe failures",
                    headline,
                    summary.iterations,
                    summary.successes,
                    summary.renewal_failures,
                    summary.probe_failures
                )
            },
            OutputFormat::Json => {
                let mut value = json!({ "event": "done" });
                if let (Some(obj), Ok(serde_json::Value::Object(fields))) =
                    (value.as_object_mut(), serde_json::to_value(summary))
                {
                    obj.extend(fields);
                }
                value.to_string()
            },
        }
    }
}

fn render_text(result: &IterationResult) -> String {
    let mut out = format!("--- Iteration #{} ---\n", result.iteration);

    match result.outcome {
        Outcome::Success => {
            out.push_str(&format!("[+] New exit IP: {}", result.new_address));
            if result.changed() == Some(false) {
                out.push_str(" (unchanged, Tor reused the exit)");
            }
        },
        Outcome::RenewalFailed => {
            out.push_str(&format!(
                "[!] Renewal failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ));
        },
        Outcome::ProbeFailed => {
            out.push_str(&format!(
                "[!] Probe failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ));
        },
    }

    out.push('\n');
    out
}

impl Reporter for ConsoleReporter {
    fn report(&self, result: &IterationResult) {
        println!("{}", self.render(result));
    }
}
