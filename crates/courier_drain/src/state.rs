//! Per-lane drain state, statistics and pass outcomes.

use std::time::Instant;

/// The current state of a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainState {
    /// No pass is running.
    #[default]
    Idle,
    /// A pass is peeking and sending batches.
    Draining,
}

impl DrainState {
    /// Returns true while a pass is running.
    pub fn is_active(&self) -> bool {
        matches!(self, DrainState::Draining)
    }
}

/// Why a pass did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The collection host is not reachable.
    Unreachable,
    /// The queue has no records.
    Empty,
    /// A pass for the lane is already queued.
    Pending,
    /// A send from an earlier pass has not completed yet.
    Busy,
}

/// Result of one drain pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// The queue was drained until empty.
    Completed {
        /// Records delivered.
        sent: u64,
        /// Batches delivered.
        batches: u64,
    },
    /// A send failed or timed out; the failed batch stays queued.
    Aborted {
        /// Records delivered before the failure.
        sent: u64,
        /// Batches delivered before the failure.
        batches: u64,
        /// Description of the failure.
        error: String,
    },
    /// The pass was cancelled between batches.
    Cancelled {
        /// Records delivered before cancellation.
        sent: u64,
        /// Batches delivered before cancellation.
        batches: u64,
    },
    /// The pass never started.
    Skipped(SkipReason),
}

impl PassOutcome {
    /// Records delivered by the pass.
    pub fn sent(&self) -> u64 {
        match self {
            PassOutcome::Completed { sent, .. }
            | PassOutcome::Aborted { sent, .. }
            | PassOutcome::Cancelled { sent, .. } => *sent,
            PassOutcome::Skipped(_) => 0,
        }
    }

    /// Returns true if the pass drained the queue.
    pub fn is_completed(&self) -> bool {
        matches!(self, PassOutcome::Completed { .. })
    }
}

/// Statistics about a lane's passes.
#[derive(Debug, Clone, Default)]
pub struct DrainStats {
    /// Passes that started.
    pub passes_started: u64,
    /// Passes that drained the queue.
    pub passes_completed: u64,
    /// Passes ended by a failed or timed-out send.
    pub passes_aborted: u64,
    /// Passes ended by cancellation.
    pub passes_cancelled: u64,
    /// Triggers that did not start a pass.
    pub passes_skipped: u64,
    /// Batches delivered.
    pub batches_sent: u64,
    /// Records delivered.
    pub records_sent: u64,
    /// Malformed records removed without sending.
    pub records_discarded: u64,
    /// Sends that exceeded the timeout.
    pub timeouts: u64,
    /// When the last pass finished.
    pub last_pass: Option<Instant>,
    /// Last failure message.
    pub last_error: Option<String>,
}

impl DrainStats {
    pub(crate) fn record(&mut self, outcome: &PassOutcome) {
        match outcome {
            PassOutcome::Completed { .. } => {
                self.passes_completed += 1;
                self.last_error = None;
            }
            PassOutcome::Aborted { error, .. } => {
                self.passes_aborted += 1;
                self.last_error = Some(error.clone());
            }
            PassOutcome::Cancelled { .. } => self.passes_cancelled += 1,
            PassOutcome::Skipped(_) => {
                self.passes_skipped += 1;
                return;
            }
        }
        self.last_pass = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_sent_counts() {
        assert_eq!(PassOutcome::Completed { sent: 5, batches: 1 }.sent(), 5);
        assert_eq!(PassOutcome::Skipped(SkipReason::Empty).sent(), 0);
        assert!(!PassOutcome::Cancelled { sent: 0, batches: 0 }.is_completed());
    }

    #[test]
    fn stats_record_outcomes() {
        let mut stats = DrainStats::default();
        stats.record(&PassOutcome::Aborted {
            sent: 0,
            batches: 0,
            error: "send timed out".into(),
        });
        assert_eq!(stats.passes_aborted, 1);
        assert_eq!(stats.last_error.as_deref(), Some("send timed out"));

        stats.record(&PassOutcome::Completed { sent: 3, batches: 1 });
        assert_eq!(stats.passes_completed, 1);
        assert!(stats.last_error.is_none());
        assert!(stats.last_pass.is_some());

        stats.record(&PassOutcome::Skipped(SkipReason::Busy));
        assert_eq!(stats.passes_skipped, 1);
    }

    #[test]
    fn state_activity() {
        assert!(!DrainState::Idle.is_active());
        assert!(DrainState::Draining.is_active());
        assert_eq!(DrainState::default(), DrainState::Idle);
    }
}
