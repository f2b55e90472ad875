//! Generator: the producer loop feeding candidate solutions to the supervisor.

use crate::error::Result;
use crate::ipc::{ChannelNames, PushOutcome, SharedChannel};
use crate::search::CandidateSource;
use crate::signal::CancelToken;

/// Why a generator left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The supervisor set the stop flag.
    Stopped,
    /// This process received SIGINT or SIGTERM.
    Cancelled,
}

/// Summary of one generator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSummary {
    pub reason: ExitReason,
    /// Solutions written into the ring buffer.
    pub published: u64,
    /// Candidates computed, including one discarded at shutdown.
    pub drawn: u64,
}

/// A producer attached to the supervisor's channel.
pub struct Generator<S> {
    channel: SharedChannel,
    source: S,
    cancel: CancelToken,
}

impl<S: CandidateSource> Generator<S> {
    /// Attach to the channel named by `names`.
    pub fn attach(names: ChannelNames, source: S, cancel: CancelToken) -> Result<Self> {
        let channel = SharedChannel::attach(names)?;
        Ok(Self::new(channel, source, cancel))
    }

    pub fn new(channel: SharedChannel, source: S, cancel: CancelToken) -> Self {
        Self {
            channel,
            source,
            cancel,
        }
    }

    /// Produce until the supervisor stops the run or a signal arrives.
    ///
    /// The channel handle is released on return; the shared objects are
    /// left for the supervisor to unlink.
    pub fn run(mut self) -> Result<GeneratorSummary> {
        let mut published = 0;

        let reason = loop {
            if self.channel.stop_requested() {
                break ExitReason::Stopped;
            }

            let candidate = self.source.next_candidate();
            match self.channel.push(&candidate, &self.cancel)? {
                PushOutcome::Published => {
                    published += 1;
                    tracing::debug!(edges = candidate.len(), solution = %candidate, "published solution");
                }
                PushOutcome::Stopped => break ExitReason::Stopped,
                PushOutcome::Cancelled => break ExitReason::Cancelled,
            }
        };

        let summary = GeneratorSummary {
            reason,
            published,
            drawn: self.source.candidates_drawn(),
        };
        tracing::debug!(?summary, "generator finished");
        self.channel.release();
        Ok(summary)
    }
}
