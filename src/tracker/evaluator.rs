use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::timeout;

use super::cache::DeviceCache;
use super::error::TrackerError;
use super::types::{CheckReport, EvaluationOutcome, TrackedDevice, TrackerPolicy};
use crate::alert::{AlertError, AlertSink, LandingAlert};
use crate::predict::{LandingPoint, PredictError, PredictionSource};

/// Two-stage landing check: a cheap gate on the sonde's current distance,
/// then a prediction lookup and a gate on the predicted landing distance.
pub struct LandingEvaluator {
    policy: Arc<TrackerPolicy>,
    cache: Arc<DeviceCache>,
    predictions: Arc<dyn PredictionSource>,
    alerts: Arc<dyn AlertSink>,
}

impl LandingEvaluator {
    pub fn new(
        policy: Arc<TrackerPolicy>,
        cache: Arc<DeviceCache>,
        predictions: Arc<dyn PredictionSource>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            policy,
            cache,
            predictions,
            alerts,
        }
    }

    /// Runs one check on `device` (a snapshot taken by the caller) and marks
    /// the sonde checked at `now`, whatever the outcome.
    pub async fn evaluate(
        &self,
        serial: &str,
        device: &TrackedDevice,
        now: DateTime<Utc>,
    ) -> EvaluationOutcome {
        let distance_km = device.position.distance_km(&self.policy.observer);

        if distance_km >= self.policy.coarse_radius_km {
            log::debug!("Sonde {} is {:.1}km away, skipping", serial, distance_km);
            return self.finish(serial, now, EvaluationOutcome::Skipped, distance_km, None);
        }

        log::info!("Checking sonde {} ({:.1}km away)", serial, distance_km);

        let landing = match self.fetch_landing(serial).await {
            Ok(landing) => landing,
            Err(e) => {
                log::warn!("Sonde {}: {}", serial, e);
                return self.finish(
                    serial,
                    now,
                    EvaluationOutcome::CheckedNoAlert,
                    distance_km,
                    None,
                );
            }
        };

        let landing_km = landing.position.distance_km(&self.policy.observer);
        let outcome = if landing_km < self.policy.landing_radius_km {
            let alert = LandingAlert::new(
                serial,
                device.sonde_type.as_deref(),
                &landing,
                landing_km,
            );
            log::info!(
                "Sonde {} is predicted to land {}km away.",
                serial,
                alert.distance_km
            );
            if let Err(e) = self.send_alert(&alert).await {
                log::warn!("Alert for sonde {} not delivered: {}", serial, e);
            }
            EvaluationOutcome::AlertSent
        } else {
            log::debug!("Sonde {} predicted to land {:.1}km away", serial, landing_km);
            EvaluationOutcome::CheckedNoAlert
        };

        self.finish(serial, now, outcome, distance_km, Some((landing, landing_km)))
    }

    async fn fetch_landing(&self, serial: &str) -> Result<LandingPoint, TrackerError> {
        let trajectory = timeout(self.policy.prediction_timeout, self.predictions.fetch(serial))
            .await
            .map_err(|_| PredictError::Timeout)??;

        Ok(trajectory
            .landing_point()
            .ok_or(PredictError::NoTrajectory)?)
    }

    async fn send_alert(&self, alert: &LandingAlert) -> Result<(), AlertError> {
        timeout(self.policy.alert_timeout, self.alerts.send(alert))
            .await
            .map_err(|_| AlertError::Timeout)?
    }

    fn finish(
        &self,
        serial: &str,
        now: DateTime<Utc>,
        outcome: EvaluationOutcome,
        distance_km: f64,
        landing: Option<(LandingPoint, f64)>,
    ) -> EvaluationOutcome {
        let (landing, landing_distance_km) = match landing {
            Some((point, km)) => (Some(point), Some(km)),
            None => (None, None),
        };
        let report = CheckReport {
            outcome,
            distance_km,
            landing,
            landing_distance_km,
        };

        // The sweeper may have evicted the sonde while we were waiting on
        // the prediction; the outcome still stands.
        if let Err(e) = self.cache.mark_checked(serial, now, report) {
            log::error!("{}", e);
        }
        outcome
    }
}
