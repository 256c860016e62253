use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use super::cache::DeviceCache;
use super::stats::TrackerStats;
use super::types::TrackedDevice;

/// Drops sondes that have been tracked for longer than the retention window.
#[derive(Clone)]
pub struct EvictionSweeper {
    cache: Arc<DeviceCache>,
    retention: Duration,
    stats: Arc<TrackerStats>,
}

impl EvictionSweeper {
    pub fn new(cache: Arc<DeviceCache>, retention: Duration, stats: Arc<TrackerStats>) -> Self {
        Self {
            cache,
            retention,
            stats,
        }
    }

    /// Entries exactly at the retention age are kept.
    pub fn is_expired(&self, device: &TrackedDevice, now: DateTime<Utc>) -> bool {
        device.age(now) > self.retention
    }

    /// Returns the number of evicted sondes.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .cache
            .all()
            .into_iter()
            .filter(|(_, device)| self.is_expired(device, now))
            .map(|(serial, _)| serial)
            .collect();

        let mut evicted = 0;
        for serial in expired {
            if self.cache.remove(&serial).is_some() {
                log::info!("Sonde {} is old. Removing from cache.", serial);
                evicted += 1;
            }
        }

        self.stats.record_evictions(evicted);
        evicted
    }

    /// Sweeps every `period` until `shutdown` flips to true.
    pub async fn run(self, period: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep(Utc::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::debug!("Eviction timer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::geo::Position;
    use crate::tracker::types::TelemetryEvent;

    fn sweeper() -> (EvictionSweeper, Arc<DeviceCache>, Arc<TrackerStats>) {
        let cache = Arc::new(DeviceCache::new());
        let stats = Arc::new(TrackerStats::default());
        (
            EvictionSweeper::new(cache.clone(), Duration::hours(1), stats.clone()),
            cache,
            stats,
        )
    }

    fn add(cache: &DeviceCache, serial: &str, first_seen: DateTime<Utc>) {
        cache.upsert(
            &TelemetryEvent {
                serial: serial.into(),
                position: Position::new(50.0, 0.0),
                altitude_m: None,
                sonde_type: None,
            },
            first_seen,
        );
    }

    #[test]
    fn removes_only_expired_entries() {
        let (sweeper, cache, stats) = sweeper();
        let now = Utc::now();
        add(&cache, "old", now - Duration::hours(2));
        add(&cache, "boundary", now - Duration::hours(1));
        add(&cache, "young", now - Duration::minutes(5));
        add(&cache, "just_over", now - Duration::hours(1) - Duration::seconds(1));

        assert_eq!(sweeper.sweep(now), 2);

        let left: Vec<_> = cache.all().into_iter().map(|(s, _)| s).collect();
        assert_eq!(left, ["boundary", "young"]);
        assert_eq!(stats.snapshot().evictions, 2);
    }

    #[test]
    fn sweep_is_idempotent() {
        let (sweeper, cache, _) = sweeper();
        let now = Utc::now();
        add(&cache, "old", now - Duration::hours(3));

        assert_eq!(sweeper.sweep(now), 1);
        assert_eq!(sweeper.sweep(now), 0);
        assert_eq!(sweeper.sweep(Utc::now()), 0);
    }

    #[test]
    fn position_updates_do_not_extend_retention() {
        let (sweeper, cache, _) = sweeper();
        let t0 = Utc::now() - Duration::hours(2);
        add(&cache, "S1", t0);
        add(&cache, "S1", Utc::now());

        assert_eq!(sweeper.sweep(Utc::now()), 1);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn timer_sweeps_and_stops() {
        let (sweeper, cache, _) = sweeper();
        add(&cache, "old", Utc::now() - Duration::hours(5));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(sweeper.run(std::time::Duration::from_millis(10), rx));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(cache.len(), 0);

        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
