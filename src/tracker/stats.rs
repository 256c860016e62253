use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::EvaluationOutcome;

/// Running counters, shared between the feed, dispatcher and sweeper.
#[derive(Debug, Default)]
pub struct TrackerStats {
    received: AtomicU64,
    malformed: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
    checked_no_alert: AtomicU64,
    alerts_sent: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, utoipa::ToSchema)]
pub struct StatsSnapshot {
    pub received: u64,
    pub malformed: u64,
    /// Frames discarded because the ingest queue was full.
    pub dropped: u64,
    pub skipped: u64,
    pub checked_no_alert: u64,
    pub alerts_sent: u64,
    pub evictions: u64,
}

impl TrackerStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: EvaluationOutcome) {
        let counter = match outcome {
            EvaluationOutcome::Skipped => &self.skipped,
            EvaluationOutcome::CheckedNoAlert => &self.checked_no_alert,
            EvaluationOutcome::AlertSent => &self.alerts_sent,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            checked_no_alert: self.checked_no_alert.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
