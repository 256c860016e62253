use async_trait::async_trait;
use std::time::Duration;

use crate::alert::{AlertError, AlertSink, LandingAlert};

/// Posts alerts to an HTTP endpoint with the details in the query string,
/// e.g. a Home Assistant webhook.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

pub fn query_params(alert: &LandingAlert) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("serial", alert.serial.clone()),
        ("dist", alert.distance_km.to_string()),
        ("lat", alert.lat.to_string()),
        ("lng", alert.lon.to_string()),
    ];
    if let Some(sonde_type) = &alert.sonde_type {
        params.push(("type", sonde_type.clone()));
    }
    if let Some(time) = alert.landing_time {
        params.push(("time", time.to_rfc3339()));
    }
    params
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn send(&self, alert: &LandingAlert) -> Result<(), AlertError> {
        let response = self
            .client
            .post(&self.url)
            .query(&query_params(alert))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Status(status.as_u16()));
        }
        Ok(())
    }
}
