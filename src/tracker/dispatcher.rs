use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::cache::DeviceCache;
use super::error::TrackerError;
use super::evaluator::LandingEvaluator;
use super::stats::TrackerStats;
use super::sweeper::EvictionSweeper;
use super::throttle::is_due;
use super::types::{EvaluationOutcome, RawTelemetry, TelemetryEvent};

/// Consumes telemetry one frame at a time. Processing is sequential, which
/// keeps every update to a given sonde ordered.
pub struct IngestDispatcher {
    cache: Arc<DeviceCache>,
    evaluator: LandingEvaluator,
    sweeper: EvictionSweeper,
    check_interval: Duration,
    stats: Arc<TrackerStats>,
}

impl IngestDispatcher {
    pub fn new(
        cache: Arc<DeviceCache>,
        evaluator: LandingEvaluator,
        sweeper: EvictionSweeper,
        check_interval: Duration,
        stats: Arc<TrackerStats>,
    ) -> Self {
        Self {
            cache,
            evaluator,
            sweeper,
            check_interval,
            stats,
        }
    }

    /// Returns the evaluation outcome, or `None` when the sonde was checked
    /// too recently. Malformed frames leave the cache untouched.
    pub async fn on_telemetry(
        &self,
        raw: RawTelemetry,
        now: DateTime<Utc>,
    ) -> Result<Option<EvaluationOutcome>, TrackerError> {
        self.stats.record_received();
        let event =
            TelemetryEvent::try_from(raw).inspect_err(|_| self.stats.record_malformed())?;

        let device = self.cache.upsert(&event, now);
        if !is_due(&device, now, self.check_interval) {
            return Ok(None);
        }

        let outcome = self.evaluator.evaluate(&event.serial, &device, now).await;
        self.stats.record_outcome(outcome);
        self.sweeper.sweep(now);

        Ok(Some(outcome))
    }

    pub async fn run(
        self,
        mut telemetry: mpsc::Receiver<RawTelemetry>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                frame = telemetry.recv() => {
                    let Some(raw) = frame else {
                        log::warn!("Telemetry channel closed");
                        break;
                    };
                    if let Err(e) = self.on_telemetry(raw, Utc::now()).await {
                        log::debug!("{}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::info!("Dispatcher stopped, {} sondes tracked", self.cache.len());
    }
}
