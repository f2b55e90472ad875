//! Randomized feedback-arc-set heuristic and result aggregation
//!
//! This module provides:
//! - Permutation: one-shot random vertex ordering, keeping backward edges
//! - Result: best-so-far tracking and run statistics for the supervisor
//!
//! There is no local improvement step. Repeated independent draws from many
//! generators, filtered by the supervisor, are the only search pressure.

pub mod config;
pub mod permutation;
pub mod result;

pub use config::SearchConfig;
pub use permutation::PermutationSearch;
pub use result::{BestSolution, RunStatistics};

use crate::graph::Solution;

/// Something that produces candidate feedback arc sets.
pub trait CandidateSource {
    /// Draw one candidate solution.
    fn next_candidate(&mut self) -> Solution;

    /// Number of candidates drawn so far.
    fn candidates_drawn(&self) -> u64;
}
