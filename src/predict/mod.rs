mod error;
mod sondehub;
pub(crate) mod types;

use async_trait::async_trait;

pub use error::PredictError;
pub use sondehub::{SondeHubClient, DEFAULT_PREDICTION_URL};
pub use types::{LandingPoint, Trajectory};

/// Source of landing predictions for a sonde.
#[async_trait]
pub trait PredictionSource: Send + Sync {
    async fn fetch(&self, serial: &str) -> Result<Trajectory, PredictError>;
}
