//! Rotation scheduling
//!
//! The loop that sequences renewals, settle delays, probes and reports.

mod loops;
pub mod policy;
pub mod report;

pub use loops::{cancellable, wait_for_shutdown, RotationLoop};
pub use policy::RotationPolicy;
pub use report::{IterationResult, LoopSummary, Outcome, Reporter, ADDRESS_UNAVAILABLE};
