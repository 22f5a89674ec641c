use std::time::Duration;
use tracing::{debug, warn};

use crate::dispatch::PendingSubmission;
use crate::service::ServiceError;

/// Outcomes retired by one reaping pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapSummary {
    pub completed: u64,
    pub failed: u64,
}

impl ReapSummary {
    pub fn retired(&self) -> u64 {
        self.completed + self.failed
    }
}

/// Bounded set of in-flight submissions.
///
/// Owned by the pipeline driver alone; callers must check [`PendingSet::is_full`]
/// before pushing, which is how backpressure reaches the capture loop.
pub struct PendingSet {
    entries: Vec<PendingSubmission>,
    capacity: usize,
    /// Remote failures since the last acknowledged submission.
    consecutive_failures: u64,
}

impl PendingSet {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            consecutive_failures: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    pub fn push(&mut self, submission: PendingSubmission) {
        debug_assert!(!self.is_full(), "pending set over capacity");
        self.entries.push(submission);
    }

    /// Retire every submission that has already finished. Never waits.
    pub fn reap(&mut self) -> ReapSummary {
        let mut summary = ReapSummary::default();
        let mut i = 0;
        while i < self.entries.len() {
            match self.entries[i].try_outcome() {
                Some(outcome) => {
                    let entry = self.entries.remove(i);
                    self.record(&entry, entry.elapsed(), outcome, &mut summary);
                }
                None => i += 1,
            }
        }
        summary
    }

    /// Wait for every outstanding submission, in dispatch order.
    pub async fn drain(&mut self) -> ReapSummary {
        let mut summary = ReapSummary::default();
        while !self.is_empty() {
            let mut entry = self.entries.remove(0);
            let outcome = entry.wait().await;
            self.record(&entry, entry.elapsed(), outcome, &mut summary);
        }
        summary
    }

    fn record(
        &mut self,
        entry: &PendingSubmission,
        elapsed: Duration,
        outcome: Result<(), ServiceError>,
        summary: &mut ReapSummary,
    ) {
        match outcome {
            Ok(()) => {
                self.consecutive_failures = 0;
                summary.completed += 1;
                debug!(
                    seq = entry.seq(),
                    sensor_seq = entry.frame().seq,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "frame submission acknowledged"
                );
            }
            Err(e) => {
                self.consecutive_failures += 1;
                summary.failed += 1;
                warn!(
                    seq = entry.seq(),
                    sensor_seq = entry.frame().seq,
                    error = %e,
                    consecutive_failures = self.consecutive_failures,
                    "frame submission failed"
                );
            }
        }
    }
}
