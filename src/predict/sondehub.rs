use async_trait::async_trait;
use std::time::Duration;

use crate::predict::error::PredictError;
use crate::predict::types::Trajectory;
use crate::predict::PredictionSource;

pub const DEFAULT_PREDICTION_URL: &str = "https://api.v2.sondehub.org/predictions";

/// Client for the SondeHub predictions endpoint.
pub struct SondeHubClient {
    client: reqwest::Client,
    url: String,
}

impl SondeHubClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PredictError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sonde-alert/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl PredictionSource for SondeHubClient {
    async fn fetch(&self, serial: &str) -> Result<Trajectory, PredictError> {
        log::debug!("Fetching prediction for {}", serial);

        let response = self
            .client
            .get(&self.url)
            .query(&[("vehicles", serial)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PredictError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Trajectory::from_sondehub(serial, &body)
    }
}
