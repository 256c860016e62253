use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;

use crate::predict::DEFAULT_PREDICTION_URL;
use crate::tracker::{Position, TrackerPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub observer: ObserverConfig,
    #[serde(default = "default_coarse_radius")]
    pub coarse_radius_km: f64,
    #[serde(default = "default_landing_radius")]
    pub landing_radius_km: f64,
    #[serde(
        default = "default_check_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub check_interval: Duration,
    #[serde(default = "default_retention", deserialize_with = "deserialize_duration")]
    pub retention: Duration,
    #[serde(
        default = "default_sweep_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub sweep_interval: Duration,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    pub web: Option<WebConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObserverConfig {
    pub name: Option<String>,
    pub coordinates: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,
    #[serde(default = "default_feed_topic")]
    pub topic: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            topic: default_feed_topic(),
            client_id: default_client_id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    #[serde(default = "default_prediction_url")]
    pub url: String,
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            url: default_prediction_url(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Alerts are only logged when no webhook is set.
    pub webhook: Option<String>,
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook: None,
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_coarse_radius() -> f64 {
    250.0
}

fn default_landing_radius() -> f64 {
    45.0
}

fn default_check_interval() -> Duration {
    Duration::from_secs(3 * 60)
}

fn default_retention() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_feed_url() -> String {
    "ws://ws-reader.v2.sondehub.org:80/mqtt".to_string()
}

fn default_feed_topic() -> String {
    "sondes/#".to_string()
}

fn default_client_id() -> String {
    "sonde-alert".to_string()
}

fn default_prediction_url() -> String {
    DEFAULT_PREDICTION_URL.to_string()
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// Accepts humantime strings such as `3m`, `1h 30m` or `10s`.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker_policy().map(|_| ())
    }

    pub fn observer_position(&self) -> Result<Position, ConfigError> {
        Position::from_coordinates(&self.observer.coordinates).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "observer coordinates '{}' are not 'lat, lon'",
                self.observer.coordinates
            ))
        })
    }

    pub fn tracker_policy(&self) -> Result<TrackerPolicy, ConfigError> {
        let invalid = |msg: &str| ConfigError::Invalid(msg.to_string());

        let observer = self.observer_position()?;

        for (name, radius) in [
            ("coarse_radius_km", self.coarse_radius_km),
            ("landing_radius_km", self.landing_radius_km),
        ] {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(invalid(&format!("{name} must be a positive number")));
            }
        }
        if self.landing_radius_km > self.coarse_radius_km {
            return Err(invalid(
                "landing_radius_km must not exceed coarse_radius_km",
            ));
        }

        for (name, duration) in [
            ("check_interval", self.check_interval),
            ("retention", self.retention),
            ("sweep_interval", self.sweep_interval),
            ("prediction.timeout", self.prediction.timeout),
            ("alert.timeout", self.alert.timeout),
        ] {
            if duration.is_zero() {
                return Err(invalid(&format!("{name} must be greater than zero")));
            }
        }

        let to_chrono = |name: &str, d: Duration| {
            chrono::Duration::from_std(d)
                .map_err(|e| ConfigError::Invalid(format!("{name}: {e}")))
        };

        Ok(TrackerPolicy {
            observer,
            coarse_radius_km: self.coarse_radius_km,
            landing_radius_km: self.landing_radius_km,
            check_interval: to_chrono("check_interval", self.check_interval)?,
            retention: to_chrono("retention", self.retention)?,
            prediction_timeout: self.prediction.timeout,
            alert_timeout: self.alert.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
observer:
  name: Home
  coordinates: "51.5054, -0.0754"
coarse_radius_km: 200
landing_radius_km: 30
check_interval: 5m
retention: 2h
sweep_interval: 30s
feed:
  url: ws://localhost:9001/mqtt
  topic: sondes/S1
prediction:
  url: http://localhost:8000/predictions
  timeout: 3s
alert:
  webhook: http://localhost:8123/api/webhook/sonde-alert
web:
  bind: 127.0.0.1:9090
"#;

    #[test]
    fn parses_full_config() {
        let config = Config::from_yaml(FULL).unwrap();
        assert_eq!(config.observer.name.as_deref(), Some("Home"));
        assert_eq!(config.check_interval, Duration::from_secs(300));
        assert_eq!(config.retention, Duration::from_secs(7200));
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.feed.topic, "sondes/S1");
        assert_eq!(config.feed.client_id, "sonde-alert");
        assert_eq!(config.prediction.timeout, Duration::from_secs(3));
        assert_eq!(config.alert.timeout, Duration::from_secs(10));
        assert_eq!(config.web.unwrap().bind, "127.0.0.1:9090");

        let policy = Config::from_yaml(FULL).unwrap().tracker_policy().unwrap();
        assert_eq!(policy.observer, Position::new(51.5054, -0.0754));
        assert_eq!(policy.coarse_radius_km, 200.0);
        assert_eq!(policy.landing_radius_km, 30.0);
        assert_eq!(policy.check_interval, chrono::Duration::minutes(5));
        assert_eq!(policy.retention, chrono::Duration::hours(2));
    }

    #[test]
    fn minimal_config_uses_reference_defaults() {
        let config = Config::from_yaml("observer:\n  coordinates: \"51.5, 0.0\"\n").unwrap();
        assert_eq!(config.coarse_radius_km, 250.0);
        assert_eq!(config.landing_radius_km, 45.0);
        assert_eq!(config.check_interval, Duration::from_secs(180));
        assert_eq!(config.retention, Duration::from_secs(3600));
        assert_eq!(config.feed.url, "ws://ws-reader.v2.sondehub.org:80/mqtt");
        assert_eq!(config.feed.topic, "sondes/#");
        assert_eq!(config.prediction.url, DEFAULT_PREDICTION_URL);
        assert!(config.alert.webhook.is_none());
        assert!(config.web.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            "observer:\n  coordinates: \"somewhere\"\n",
            "observer:\n  coordinates: \"100.0, 0.0\"\n",
            "observer:\n  coordinates: \"51.5, 0.0\"\ncoarse_radius_km: -1\n",
            "observer:\n  coordinates: \"51.5, 0.0\"\nlanding_radius_km: 300\n",
            "observer:\n  coordinates: \"51.5, 0.0\"\ncheck_interval: 0s\n",
            "observer:\n  coordinates: \"51.5, 0.0\"\nretention: 0s\n",
        ];
        for yaml in cases {
            assert!(
                matches!(Config::from_yaml(yaml), Err(ConfigError::Invalid(_))),
                "{yaml}"
            );
        }
    }

    #[test]
    fn rejects_unparseable_duration() {
        let yaml = "observer:\n  coordinates: \"51.5, 0.0\"\ncheck_interval: soon\n";
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.coarse_radius_km, 200.0);

        assert!(matches!(
            Config::from_file("/nonexistent/sonde-alert.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
