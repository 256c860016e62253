mod error;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;

use crate::config::FeedConfig;
use crate::tracker::{RawTelemetry, TrackerStats};

pub use error::FeedError;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MAX_PACKET_SIZE: usize = 256 * 1024;
const REQUEST_CAPACITY: usize = 16;

/// Subscribes to the SondeHub telemetry broker (MQTT over websockets) and
/// pushes decoded frames into the ingest channel.
pub struct FeedListener {
    config: FeedConfig,
}

impl FeedListener {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    fn options(&self) -> Result<MqttOptions, FeedError> {
        let url = reqwest::Url::parse(&self.config.url)
            .map_err(|e| FeedError::Url(format!("{}: {}", self.config.url, e)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| FeedError::Url(format!("{}: no port", self.config.url)))?;

        // Brokers drop the older of two sessions sharing a client id.
        let client_id = format!("{}-{}", self.config.client_id, std::process::id());
        let mut options = MqttOptions::new(client_id, self.config.url.clone(), port);
        match url.scheme() {
            "ws" => options.set_transport(Transport::Ws),
            "wss" => options.set_transport(Transport::wss_with_default_config()),
            other => return Err(FeedError::Url(format!("unsupported scheme '{other}'"))),
        };
        options.set_keep_alive(KEEP_ALIVE);
        options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
        Ok(options)
    }

    /// Runs until `shutdown` flips or the dispatcher goes away. Connection
    /// failures are retried forever.
    pub async fn run(
        self,
        telemetry: mpsc::Sender<RawTelemetry>,
        stats: Arc<TrackerStats>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), FeedError> {
        let (client, mut eventloop) = AsyncClient::new(self.options()?, REQUEST_CAPACITY);
        log::info!("Connecting to {}", self.config.url);

        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        log::info!("Connected to {} ({:?})", self.config.url, ack.code);
                        client.try_subscribe(self.config.topic.as_str(), QoS::AtMostOnce)?;
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        log::info!("Subscribed to {}", self.config.topic);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        forward(&publish.payload, &telemetry, &stats)?;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("Feed connection error: {}, retrying in {:?}", e, RECONNECT_DELAY);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let _ = client.try_disconnect();
                        break;
                    }
                }
            }
        }

        log::info!("Feed stopped");
        Ok(())
    }
}

/// Decodes one publish payload and queues it without waiting; frames that
/// arrive while the queue is full are dropped, the next frame for the same
/// sonde carries a fresher position anyway.
fn forward(
    payload: &[u8],
    telemetry: &mpsc::Sender<RawTelemetry>,
    stats: &TrackerStats,
) -> Result<(), FeedError> {
    let raw = match RawTelemetry::from_json(payload) {
        Ok(raw) => raw,
        Err(e) => {
            stats.record_received();
            stats.record_malformed();
            log::debug!("Dropping frame: {}", e);
            return Ok(());
        }
    };

    match telemetry.try_send(raw) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => {
            stats.record_dropped();
            log::debug!("Ingest queue full, dropping frame");
            Ok(())
        }
        Err(TrySendError::Closed(_)) => Err(FeedError::ChannelClosed),
    }
}
