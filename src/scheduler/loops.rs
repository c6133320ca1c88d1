//! Rotation loop
//!
//! Idle → Rotating → Settling → Probing → Reporting → (Waiting → Rotating | Done),
//! with Interrupted → Done reachable from every suspension point.
//!
//! Iterations run strictly one after another. Each await races the shutdown
//! signal, so a cancellation lands within one suspension point and never
//! starts another cycle.

use super::policy::RotationPolicy;
use super::report::{IterationResult, LoopSummary, Outcome, Reporter};
use crate::probe::ExitProbe;
use crate::tor::ControlChannel;
use std::future::Future;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug)]
enum LoopState {
    Idle,
    Rotating,
    Settling,
    Probing,
    Reporting(IterationResult),
    Waiting,
    Interrupted,
    Done,
}

/// Drives renew → settle → probe → report cycles
pub struct RotationLoop<C, P, R> {
    policy: RotationPolicy,
    channel: C,
    probe: P,
    reporter: R,
}

impl<C, P, R> RotationLoop<C, P, R>
where
    C: ControlChannel,
    P: ExitProbe,
    R: Reporter,
{
    pub fn new(policy: RotationPolicy, channel: C, probe: P, reporter: R) -> Self {
        Self {
            policy,
            channel,
            probe,
            reporter,
        }
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Run until the count is reached or `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> LoopSummary {
        let mut summary = LoopSummary::default();
        let mut iteration: u64 = 0;
        let mut last_address: Option<String> = None;
        let mut state = LoopState::Idle;

        loop {
            debug!("Rotation state: {:?}", state);

            state = match state {
                LoopState::Idle => {
                    info!(
                        "Rotation loop started: {} rotations, interval {:?}",
                        if self.policy.is_unbounded() {
                            "unbounded".to_string()
                        } else {
                            self.policy.count.to_string()
                        },
                        self.policy.interval
                    );
                    LoopState::Rotating
                },

                LoopState::Rotating => {
                    iteration += 1;
                    summary.iterations = iteration;
                    info!("Iteration #{}: requesting new Tor circuit", iteration);

                    let renew = self.channel.renew(self.policy.credential.as_deref());
                    match cancellable(&mut shutdown, renew).await {
                        None => LoopState::Interrupted,
                        Some(Ok(())) => LoopState::Settling,
                        Some(Err(e)) => {
                            warn!("Iteration #{}: renewal failed: {}", iteration, e);
                            LoopState::Reporting(IterationResult::failed(
                                iteration,
                                last_address.clone(),
                                Outcome::RenewalFailed,
                                e.kind(),
                                e.to_string(),
                            ))
                        },
                    }
                },

                LoopState::Settling => {
                    match cancellable(&mut shutdown, sleep(self.policy.settle_delay)).await {
                        None => LoopState::Interrupted,
                        Some(()) => LoopState::Probing,
                    }
                },

                LoopState::Probing => {
                    let probe = self.probe.current_exit_address(self.policy.probe_timeout);
                    match cancellable(&mut shutdown, probe).await {
                        None => LoopState::Interrupted,
                        Some(Ok(address)) => LoopState::Reporting(IterationResult::success(
                            iteration,
                            last_address.clone(),
                            address,
                        )),
                        Some(Err(e)) => {
                            warn!("Iteration #{}: exit probe failed: {}", iteration, e);
                            LoopState::Reporting(IterationResult::failed(
                                iteration,
                                last_address.clone(),
                                Outcome::ProbeFailed,
                                e.kind(),
                                e.to_string(),
                            ))
                        },
                    }
                },

                LoopState::Reporting(result) => {
                    summary.record(&result);
                    if result.is_success() {
                        info!("Iteration #{}: exit address {}", iteration, result.new_address);
                        last_address = Some(result.new_address.clone());
                    }
                    self.reporter.report(&result);

                    if self.policy.is_finished(iteration) {
                        info!("Reached requested rotation count ({})", self.policy.count);
                        LoopState::Done
                    } else {
                        LoopState::Waiting
                    }
                },

                LoopState::Waiting => {
                    match cancellable(&mut shutdown, sleep(self.policy.interval)).await {
                        None => LoopState::Interrupted,
                        Some(()) => LoopState::Rotating,
                    }
                },

                LoopState::Interrupted => {
                    info!("Rotation loop interrupted after {} iterations", iteration);
                    summary.interrupted = true;
                    LoopState::Done
                },

                LoopState::Done => return summary,
            };
        }
    }
}

/// Run `fut` unless shutdown fires first. Dropping `fut` releases whatever it owns.
pub async fn cancellable<F>(shutdown: &mut watch::Receiver<bool>, fut: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        () = wait_for_shutdown(shutdown) => None,
        out = fut => Some(out),
    }
}

/// Resolve once the shutdown flag is true
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender dropped without signalling: nothing can cancel us any more
            std::future::pending::<()>().await;
        }
    }
}
