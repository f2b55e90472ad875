//! Best-so-far tracking and run statistics

use crate::graph::Solution;
use std::time::Duration;

/// The smallest solution the supervisor has consumed so far.
#[derive(Debug, Clone, Default)]
pub struct BestSolution {
    best: Option<Solution>,
}

impl BestSolution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate. Returns true if it is a new best.
    ///
    /// Ties keep the earlier solution, so the recorded size never grows.
    pub fn offer(&mut self, candidate: &Solution) -> bool {
        match &self.best {
            Some(best) if candidate.len() >= best.len() => false,
            _ => {
                self.best = Some(*candidate);
                true
            }
        }
    }

    /// Edge count of the best solution, if any was consumed.
    pub fn size(&self) -> Option<usize> {
        self.best.as_ref().map(Solution::len)
    }

    pub fn solution(&self) -> Option<&Solution> {
        self.best.as_ref()
    }
}

/// Counters collected by the supervisor over one run.
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    /// Solutions popped from the ring buffer
    pub solutions_examined: u64,
    /// Times the best solution improved
    pub improvements_found: u64,
    /// Time from the end of the startup delay to shutdown
    pub elapsed_time: Duration,
}

impl RunStatistics {
    /// Solutions examined per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.solutions_examined as f64 / secs
        }
    }
}
