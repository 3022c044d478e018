//! Allocation Counters
//!
//! Lightweight decision accounting for the service layer.
//!
//! # Design Goals:
//! - Lock-free atomic counters, safe to read while protocols run
//! - One `record` call per decision, no allocation

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::engine::Decision;

/// Running totals for every decision kind.
#[derive(Debug, Default)]
pub struct AllocationMetrics {
    pub admissions: AtomicU64,
    pub queued: AtomicU64,
    /// Beds offered to the waitlist, whether reassigned or left free.
    pub releases: AtomicU64,
    pub reassigned: AtomicU64,
    pub freed: AtomicU64,
    pub resources_added: AtomicU64,
    pub manual_success: AtomicU64,
    pub manual_failure: AtomicU64,
    decisions: AtomicU64,
    decision_time_ns: AtomicU64,
}

impl AllocationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one decision and the time the engine spent producing it.
    pub fn record(&self, decision: &Decision, elapsed: Duration) {
        let counter = match decision {
            Decision::Admitted { .. } => &self.admissions,
            Decision::Queued { .. } => &self.queued,
            Decision::Reassigned { .. } => &self.reassigned,
            Decision::Freed { .. } => &self.freed,
            Decision::Added { .. } => &self.resources_added,
            Decision::Success { .. } => &self.manual_success,
            Decision::Failure { .. } => &self.manual_failure,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if matches!(decision, Decision::Reassigned { .. } | Decision::Freed { .. }) {
            self.releases.fetch_add(1, Ordering::Relaxed);
        }
        self.decisions.fetch_add(1, Ordering::Relaxed);
        self.decision_time_ns
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let decisions = self.decisions.load(Ordering::Relaxed);
        let total_ns = self.decision_time_ns.load(Ordering::Relaxed);
        MetricsSnapshot {
            admissions: self.admissions.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            reassigned: self.reassigned.load(Ordering::Relaxed),
            freed: self.freed.load(Ordering::Relaxed),
            resources_added: self.resources_added.load(Ordering::Relaxed),
            manual_success: self.manual_success.load(Ordering::Relaxed),
            manual_failure: self.manual_failure.load(Ordering::Relaxed),
            decisions,
            avg_decision_us: if decisions == 0 {
                0.0
            } else {
                (total_ns as f64) / (decisions as f64) / 1_000.0
            },
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.admissions,
            &self.queued,
            &self.releases,
            &self.reassigned,
            &self.freed,
            &self.resources_added,
            &self.manual_success,
            &self.manual_failure,
            &self.decisions,
            &self.decision_time_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Plain copy of [`AllocationMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub admissions: u64,
    pub queued: u64,
    pub releases: u64,
    pub reassigned: u64,
    pub freed: u64,
    pub resources_added: u64,
    pub manual_success: u64,
    pub manual_failure: u64,
    pub decisions: u64,
    pub avg_decision_us: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Resource};

    fn freed() -> Decision {
        Decision::Freed {
            resource: Resource::new("a", "1", Category::Icu),
        }
    }

    #[test]
    fn test_metrics_creation() {
        let snapshot = AllocationMetrics::new().snapshot();
        assert_eq!(snapshot.decisions, 0);
        assert_eq!(snapshot.avg_decision_us, 0.0);
    }

    #[test]
    fn test_record_counts_by_kind() {
        let metrics = AllocationMetrics::new();
        metrics.record(&freed(), Duration::from_micros(10));
        metrics.record(&freed(), Duration::from_micros(30));
        metrics.record(
            &Decision::Failure {
                reason: "none".into(),
            },
            Duration::ZERO,
        );

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.freed, 2);
        assert_eq!(snapshot.releases, 2);
        assert_eq!(snapshot.manual_failure, 1);
        assert_eq!(snapshot.decisions, 3);
        assert!((snapshot.avg_decision_us - 40.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = AllocationMetrics::new();
        metrics.record(&freed(), Duration::from_millis(1));
        metrics.reset();
        assert_eq!(metrics.snapshot().freed, 0);
        assert_eq!(metrics.snapshot().releases, 0);
        assert_eq!(metrics.snapshot().decisions, 0);
    }
}
