use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::predict::error::PredictError;
use crate::tracker::Position;

/// One point of a predicted flight path. `time` is unix seconds.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct PredictionSample {
    pub time: f64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt: Option<f64>,
}

/// Folds a 0..360 longitude into -180..180.
fn normalize_longitude(lon: f64) -> f64 {
    if lon > 180.0 && lon <= 360.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Predicted touchdown of a sonde.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LandingPoint {
    pub position: Position,
    pub time: Option<DateTime<Utc>>,
    pub altitude_m: Option<f64>,
}

impl From<&PredictionSample> for LandingPoint {
    fn from(sample: &PredictionSample) -> Self {
        LandingPoint {
            position: Position::new(sample.lat, normalize_longitude(sample.lon)),
            time: DateTime::from_timestamp(sample.time.floor() as i64, 0),
            altitude_m: sample.alt,
        }
    }
}

/// Unordered prediction samples for a single sonde.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub serial: String,
    pub samples: Vec<PredictionSample>,
}

#[derive(Debug, Deserialize)]
struct VehiclePrediction {
    #[serde(default)]
    vehicle: Option<String>,
    #[serde(default)]
    data: Option<PredictionData>,
}

/// SondeHub ships the samples as a JSON document inside a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionData {
    Encoded(String),
    Samples(Vec<PredictionSample>),
}

impl Trajectory {
    /// Decodes a `/predictions?vehicles=` response body. The entry for
    /// `serial` is used when present, otherwise the first entry.
    pub fn from_sondehub(serial: &str, body: &[u8]) -> Result<Self, PredictError> {
        let vehicles: Vec<VehiclePrediction> = serde_json::from_slice(body)?;
        let vehicle = vehicles
            .iter()
            .find(|v| v.vehicle.as_deref() == Some(serial))
            .or_else(|| vehicles.first())
            .ok_or(PredictError::NoTrajectory)?;

        let samples: Vec<PredictionSample> = match &vehicle.data {
            Some(PredictionData::Encoded(doc)) if !doc.trim().is_empty() => {
                serde_json::from_str(doc)?
            }
            Some(PredictionData::Samples(samples)) => samples.clone(),
            _ => return Err(PredictError::NoTrajectory),
        };

        let trajectory = Trajectory {
            serial: serial.to_string(),
            samples,
        };
        if trajectory.landing_point().is_none() {
            return Err(PredictError::NoTrajectory);
        }
        Ok(trajectory)
    }

    /// The sample with the latest time. On equal times the one appearing
    /// last in the response wins (`max_by` returns the last maximum, which
    /// is what a stable sort followed by `last()` yields).
    ///
    /// `None` when there are no samples or the latest one has no usable
    /// position; earlier samples are never substituted for it.
    pub fn landing_point(&self) -> Option<LandingPoint> {
        let latest = self
            .samples
            .iter()
            .max_by(|a, b| a.time.total_cmp(&b.time))?;
        if !latest.time.is_finite() {
            return None;
        }
        let landing = LandingPoint::from(latest);
        landing.position.is_valid().then_some(landing)
    }
}
