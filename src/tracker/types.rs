use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::TrackerError;
use super::geo::Position;
use crate::predict::LandingPoint;

/// Telemetry frame as published on the feed. Everything is optional so
/// that missing fields surface as `MalformedTelemetry` instead of a decode
/// error with no context.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawTelemetry {
    pub serial: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    #[serde(rename = "type")]
    pub sonde_type: Option<String>,
}

impl RawTelemetry {
    pub fn from_json(payload: &[u8]) -> Result<Self, TrackerError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// A validated position report for one sonde.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub serial: String,
    pub position: Position,
    pub altitude_m: Option<f64>,
    pub sonde_type: Option<String>,
}

impl TryFrom<RawTelemetry> for TelemetryEvent {
    type Error = TrackerError;

    fn try_from(raw: RawTelemetry) -> Result<Self, Self::Error> {
        let serial = raw
            .serial
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TrackerError::MalformedTelemetry("missing serial".into()))?;

        let (lat, lon) = match (raw.lat, raw.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Err(TrackerError::MalformedTelemetry(format!(
                    "{serial}: missing coordinates"
                )))
            }
        };

        let position = Position::new(lat, lon);
        if !position.is_valid() {
            return Err(TrackerError::MalformedTelemetry(format!(
                "{serial}: coordinates out of range ({lat}, {lon})"
            )));
        }

        Ok(TelemetryEvent {
            serial,
            position,
            altitude_m: raw.alt.filter(|a| a.is_finite()),
            sonde_type: raw.sonde_type,
        })
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvaluationOutcome {
    /// Current position outside the coarse radius, no prediction fetched.
    Skipped,
    CheckedNoAlert,
    AlertSent,
}

/// What the most recent check of a device found. Informational only.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CheckReport {
    pub outcome: EvaluationOutcome,
    pub distance_km: f64,
    pub landing: Option<LandingPoint>,
    pub landing_distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TrackedDevice {
    pub position: Position,
    pub altitude_m: Option<f64>,
    pub sonde_type: Option<String>,
    pub first_seen: DateTime<Utc>,
    /// `None` until the first check, which makes a new device due at once.
    pub last_checked: Option<DateTime<Utc>>,
    pub last_report: Option<CheckReport>,
}

impl TrackedDevice {
    pub fn new(event: &TelemetryEvent, now: DateTime<Utc>) -> Self {
        Self {
            position: event.position,
            altitude_m: event.altitude_m,
            sonde_type: event.sonde_type.clone(),
            first_seen: now,
            last_checked: None,
            last_report: None,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.first_seen
    }
}

/// Decision parameters shared read-only by every tracker component.
#[derive(Debug, Clone)]
pub struct TrackerPolicy {
    pub observer: Position,
    pub coarse_radius_km: f64,
    pub landing_radius_km: f64,
    pub check_interval: Duration,
    pub retention: Duration,
    pub prediction_timeout: std::time::Duration,
    pub alert_timeout: std::time::Duration,
}

#[cfg(test)]
impl TrackerPolicy {
    pub fn reference() -> Self {
        Self {
            observer: Position::new(51.5054, -0.0754),
            coarse_radius_km: 250.0,
            landing_radius_km: 45.0,
            check_interval: Duration::minutes(3),
            retention: Duration::hours(1),
            prediction_timeout: std::time::Duration::from_secs(5),
            alert_timeout: std::time::Duration::from_secs(5),
        }
    }
}
