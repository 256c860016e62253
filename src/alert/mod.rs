mod error;
mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::predict::LandingPoint;

pub use error::AlertError;
pub use webhook::WebhookSink;

const SONDEHUB_TRACKER_URL: &str = "https://sondehub.org/";
const MAP_URL: &str = "https://maps.google.com/maps?z=12&t=m&q=loc:";

/// A sonde predicted to come down near the observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandingAlert {
    pub serial: String,
    pub sonde_type: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// Whole kilometres.
    pub distance_km: u32,
    pub landing_time: Option<DateTime<Utc>>,
}

impl LandingAlert {
    pub fn new(
        serial: &str,
        sonde_type: Option<&str>,
        landing: &LandingPoint,
        distance_km: f64,
    ) -> Self {
        LandingAlert {
            serial: serial.to_string(),
            sonde_type: sonde_type.map(str::to_string),
            lat: round5(landing.position.latitude_deg),
            lon: round5(landing.position.longitude_deg),
            distance_km: distance_km.max(0.0).round() as u32,
            landing_time: landing.time,
        }
    }

    /// Live tracker page for the sonde.
    pub fn tracker_url(&self) -> String {
        format!("{}{}", SONDEHUB_TRACKER_URL, self.serial)
    }

    pub fn map_url(&self) -> String {
        format!("{}{}+{}", MAP_URL, self.lat, self.lon)
    }
}

/// Fire-and-forget notification channel.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &LandingAlert) -> Result<(), AlertError>;
}

/// Used when no webhook is configured.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, alert: &LandingAlert) -> Result<(), AlertError> {
        let time = alert
            .landing_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        log::info!(
            "ALERT: {} sonde {} predicted to land {}km away at {}, {} ({}) {} {}",
            alert.sonde_type.as_deref().unwrap_or("unknown"),
            alert.serial,
            alert.distance_km,
            alert.lat,
            alert.lon,
            time,
            alert.tracker_url(),
            alert.map_url()
        );
        Ok(())
    }
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}
