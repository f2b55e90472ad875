//! Configuration for the supervisor process.

use crate::ipc::{ChannelNames, DEFAULT_CAPACITY};
use std::time::Duration;

/// Configuration for one supervisor run.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Maximum number of solutions to examine (None = unbounded).
    pub limit: Option<u64>,
    /// Time to sleep after creating the channel, before consuming.
    pub delay: Duration,
    /// Number of ring buffer slots.
    pub capacity: usize,
    /// Names of the shared memory object and semaphores.
    pub names: ChannelNames,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            limit: None,
            delay: Duration::ZERO,
            capacity: DEFAULT_CAPACITY,
            names: ChannelNames::default(),
        }
    }
}

impl SupervisorConfig {
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_limit_option(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_names(mut self, names: ChannelNames) -> Self {
        self.names = names;
        self
    }
}
