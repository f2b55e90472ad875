//! Approximate minimum feedback arc sets by distributed random search.
//!
//! Any number of `generator` processes draw random vertex orderings of a
//! directed graph and publish the backward edges of each ordering (a
//! feedback arc set) into a ring buffer in POSIX shared memory. A single
//! `supervisor` process consumes them, keeps the smallest, and ends the run
//! when a zero-edge set proves the graph acyclic, when its examination
//! limit runs out, or on SIGINT/SIGTERM.
//!
//! Key modules:
//! - `ipc`: the shared ring buffer, its semaphores and the stop protocol.
//! - `supervisor`: creates the channel, consumes, reports, cleans up.
//! - `generator`: attaches to the channel and produces candidates.
//! - `search`: the random-permutation heuristic and best-so-far tracking.
//! - `graph`: edges, fixed-capacity solutions, edge-token parsing.

pub mod error;
pub mod generator;
pub mod graph;
pub mod ipc;
pub mod logging;
pub mod search;
pub mod signal;
pub mod supervisor;

pub use error::{Error, Result};
