//! Supervisor: owns the shared channel, consumes solutions and decides when
//! the run ends.
//!
//! # Lifecycle
//!
//! ```text
//! Running ──► Stopping ──► Cleanup ──► Exit
//! ```
//!
//! - **Running**: pop solutions, track the smallest. Leaves on a zero-edge
//!   solution, an exhausted limit, or a termination signal.
//! - **Stopping**: set the shared stop flag and nudge blocked generators.
//! - **Cleanup**: unlink every named IPC object and release the mapping.
//! - **Exit**: hand the [`Report`] back to the caller.

pub mod config;

pub use config::SupervisorConfig;

use crate::error::Result;
use crate::graph::Solution;
use crate::ipc::SharedChannel;
use crate::search::{BestSolution, RunStatistics};
use crate::signal::CancelToken;
use std::fmt;
use std::time::{Duration, Instant};

/// Granularity of the startup delay; the cancel token is polled in between.
const DELAY_SLICE: Duration = Duration::from_millis(100);

/// Why the supervisor stopped consuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A generator found an ordering with no backward edges.
    Acyclic,
    /// The configured number of solutions was examined.
    LimitExhausted,
    /// SIGINT or SIGTERM arrived.
    Interrupted,
}

/// Final result of a supervisor run.
#[derive(Debug, Clone)]
pub struct Report {
    pub outcome: Outcome,
    pub best: Option<Solution>,
    pub statistics: RunStatistics,
}

impl Report {
    /// Edge count of the best solution, if any was consumed.
    pub fn best_size(&self) -> Option<usize> {
        self.best.as_ref().map(Solution::len)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.outcome, self.best_size()) {
            (Outcome::Acyclic, _) | (_, Some(0)) => write!(f, "the graph is acyclic!"),
            (_, Some(n)) => write!(
                f,
                "The graph might not be acyclic, best solution removes {} edges.",
                n
            ),
            (_, None) => write!(f, "no solution found yet"),
        }
    }
}

#[derive(Debug)]
enum Phase {
    Running,
    Stopping(Outcome),
    Cleanup(Outcome),
    Exit(Outcome),
}

/// The consumer side of a run.
pub struct Supervisor {
    channel: Option<SharedChannel>,
    config: SupervisorConfig,
    cancel: CancelToken,
    best: BestSolution,
    remaining: Option<u64>,
    statistics: RunStatistics,
}

impl Supervisor {
    /// Create the shared channel. Generators may attach once this returns.
    pub fn new(config: SupervisorConfig, cancel: CancelToken) -> Result<Self> {
        let channel = SharedChannel::create(config.names.clone(), config.capacity)?;
        Ok(Self {
            channel: Some(channel),
            remaining: config.limit,
            config,
            cancel,
            best: BestSolution::new(),
            statistics: RunStatistics::default(),
        })
    }

    /// Drive the run to completion and return the final report.
    ///
    /// On an IPC failure while consuming, generators are still told to stop
    /// and the names are unlinked (on drop) before the error is returned.
    /// An unlink failure during cleanup is only logged; the report stands.
    pub fn run(mut self) -> Result<Report> {
        if self.sleep_startup_delay() {
            tracing::info!("interrupted during startup delay");
        }
        let started = Instant::now();

        let mut phase = Phase::Running;
        let outcome = loop {
            tracing::trace!(?phase, "supervisor phase");
            phase = match phase {
                Phase::Running => match self.consume() {
                    Ok(outcome) => Phase::Stopping(outcome),
                    Err(err) => {
                        self.stop_producers();
                        return Err(err);
                    }
                },
                Phase::Stopping(outcome) => {
                    self.stop_producers();
                    Phase::Cleanup(outcome)
                }
                Phase::Cleanup(outcome) => {
                    if let Some(channel) = self.channel.take()
                        && let Err(err) = channel.destroy()
                    {
                        tracing::warn!(error = %err, "failed to remove shared channel");
                    }
                    Phase::Exit(outcome)
                }
                Phase::Exit(outcome) => break outcome,
            };
        };

        self.statistics.elapsed_time = started.elapsed();
        tracing::debug!(
            outcome = ?outcome,
            examined = self.statistics.solutions_examined,
            improvements = self.statistics.improvements_found,
            elapsed = ?self.statistics.elapsed_time,
            throughput = self.statistics.throughput(),
            "supervisor finished"
        );

        Ok(Report {
            outcome,
            best: self.best.solution().copied(),
            statistics: self.statistics,
        })
    }

    /// Sleep for the configured delay. Returns true if cancelled meanwhile.
    ///
    /// A delay past the end of `Instant`'s range waits for the cancel token
    /// alone.
    fn sleep_startup_delay(&self) -> bool {
        let deadline = Instant::now().checked_add(self.config.delay);
        loop {
            if self.cancel.is_cancelled() {
                return true;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    DELAY_SLICE.min(deadline - now)
                }
                None => DELAY_SLICE,
            };
            std::thread::sleep(slice);
        }
    }

    /// The Running phase.
    fn consume(&mut self) -> Result<Outcome> {
        let Some(channel) = self.channel.as_ref() else {
            return Ok(Outcome::Interrupted);
        };

        loop {
            if self.cancel.is_cancelled() {
                return Ok(Outcome::Interrupted);
            }
            if self.remaining == Some(0) {
                return Ok(Outcome::LimitExhausted);
            }

            let Some(solution) = channel.pop(&self.cancel)? else {
                return Ok(Outcome::Interrupted);
            };
            self.statistics.solutions_examined += 1;

            if solution.is_empty() {
                self.best.offer(&solution);
                tracing::info!("found an ordering without backward edges");
                return Ok(Outcome::Acyclic);
            }

            if self.best.offer(&solution) {
                self.statistics.improvements_found += 1;
                tracing::info!(edges = solution.len(), solution = %solution, "new best solution");
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            channel.release_slot()?;
        }
    }

    /// The Stopping phase. Failures are logged; cleanup must still run.
    fn stop_producers(&self) {
        let Some(channel) = self.channel.as_ref() else {
            return;
        };
        channel.request_stop();
        if let Err(err) = channel.nudge_producers() {
            tracing::warn!(error = %err, "failed to wake blocked generators");
        }
    }
}
