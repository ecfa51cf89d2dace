use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::proposal::ProposalError;

/// Outcome counters for proposal transitions and edits
#[derive(Debug, Default)]
pub struct TransitionMetrics {
    pub committed: AtomicU64,
    pub version_conflicts: AtomicU64,
    pub unauthorized: AtomicU64,
    pub invalid_transitions: AtomicU64,
    pub not_editable: AtomicU64,
    pub publish_failures: AtomicU64,
}

impl TransitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, error: &ProposalError) {
        let counter = match error {
            ProposalError::VersionConflict { .. } => &self.version_conflicts,
            ProposalError::Unauthorized { .. } => &self.unauthorized,
            ProposalError::InvalidTransition { .. } => &self.invalid_transitions,
            ProposalError::NotEditable { .. } => &self.not_editable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> TransitionStats {
        TransitionStats {
            committed: self.committed.load(Ordering::Relaxed),
            version_conflicts: self.version_conflicts.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            invalid_transitions: self.invalid_transitions.load(Ordering::Relaxed),
            not_editable: self.not_editable.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            committed = stats.committed,
            version_conflicts = stats.version_conflicts,
            unauthorized = stats.unauthorized,
            invalid_transitions = stats.invalid_transitions,
            not_editable = stats.not_editable,
            publish_failures = stats.publish_failures,
            "Proposal transition metrics"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionStats {
    pub committed: u64,
    pub version_conflicts: u64,
    pub unauthorized: u64,
    pub invalid_transitions: u64,
    pub not_editable: u64,
    pub publish_failures: u64,
}

/// Global metrics instance
static TRANSITION_METRICS: std::sync::LazyLock<TransitionMetrics> =
    std::sync::LazyLock::new(TransitionMetrics::new);

pub fn transition_metrics() -> &'static TransitionMetrics {
    &TRANSITION_METRICS
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
