use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("cannot decode prediction: {0}")]
    Decode(String),
    #[error("no trajectory in prediction")]
    NoTrajectory,
    #[error("prediction request timed out")]
    Timeout,
}

impl From<serde_json::Error> for PredictError {
    fn from(err: serde_json::Error) -> Self {
        PredictError::Decode(err.to_string())
    }
}
