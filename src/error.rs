//! Error types shared by the supervisor and generator.

use std::io;

/// Errors raised while validating input or managing the shared channel.
///
/// Interruption by a termination signal is not an error; it is reported
/// through [`crate::ipc::PushOutcome::Cancelled`] or an empty `pop`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An edge token did not have the form `start-end`.
    #[error("invalid edge '{token}': {reason}")]
    InvalidEdge { token: String, reason: String },

    /// No edges were given on the command line.
    #[error("requires list of edges")]
    NoEdges,

    /// More edges than a solution slot can carry.
    #[error("cannot process {count} edges, at most {max} are supported")]
    TooManyEdges { count: usize, max: usize },

    /// Ring buffer capacity outside the supported range.
    #[error("invalid channel capacity {capacity}, expected 1..={max}")]
    InvalidCapacity { capacity: usize, max: usize },

    /// Attempted to append past the fixed edge capacity of a solution.
    #[error("solution is full ({max} edges)")]
    SolutionFull { max: usize },

    /// An operating-system call on an IPC primitive failed.
    #[error("{op} failed: {source}")]
    Ipc {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// The shared region exists but its header was never published.
    #[error("shared memory '{name}' is not initialized")]
    NotInitialized { name: String },

    /// The shared region is smaller than its header claims.
    #[error("shared memory '{name}' has {actual} bytes, expected at least {expected}")]
    LayoutMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Only the creating process may unlink the shared resources.
    #[error("channel was attached, not created; refusing to destroy it")]
    NotOwner,
}

impl Error {
    /// Wrap the current `errno` for a failed call named `op`.
    pub fn last_os(op: &'static str) -> Self {
        Error::Ipc {
            op,
            source: io::Error::last_os_error(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
