use thiserror::Error;

use crate::predict::PredictError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("malformed telemetry: {0}")]
    MalformedTelemetry(String),
    #[error("prediction unavailable: {0}")]
    PredictionUnavailable(#[from] PredictError),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::MalformedTelemetry(err.to_string())
    }
}
