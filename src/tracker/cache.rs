use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::error::TrackerError;
use super::types::{CheckReport, TelemetryEvent, TrackedDevice};

/// Last known state of every sonde currently in flight, keyed by serial.
///
/// A single lock guards the whole map. Callers only ever get clones out,
/// so a record removed by the sweeper while an evaluation is running does
/// not affect the evaluation's copy.
#[derive(Debug, Default)]
pub struct DeviceCache {
    devices: Mutex<HashMap<String, TrackedDevice>>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TrackedDevice>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a new device or moves an existing one. `last_checked` and
    /// `first_seen` of an existing record are left alone.
    pub fn upsert(&self, event: &TelemetryEvent, now: DateTime<Utc>) -> TrackedDevice {
        let mut devices = self.lock();
        match devices.get_mut(&event.serial) {
            Some(device) => {
                device.position = event.position;
                if event.altitude_m.is_some() {
                    device.altitude_m = event.altitude_m;
                }
                if event.sonde_type.is_some() {
                    device.sonde_type = event.sonde_type.clone();
                }
                device.clone()
            }
            None => {
                log::debug!("New sonde {} at {:?}", event.serial, event.position);
                let device = TrackedDevice::new(event, now);
                devices.insert(event.serial.clone(), device.clone());
                device
            }
        }
    }

    pub fn mark_checked(
        &self,
        serial: &str,
        now: DateTime<Utc>,
        report: CheckReport,
    ) -> Result<(), TrackerError> {
        let mut devices = self.lock();
        let device = devices.get_mut(serial).ok_or_else(|| {
            TrackerError::InvariantViolation(format!("mark_checked for unknown sonde {serial}"))
        })?;
        device.last_checked = Some(now);
        device.last_report = Some(report);
        Ok(())
    }

    pub fn get(&self, serial: &str) -> Option<TrackedDevice> {
        self.lock().get(serial).cloned()
    }

    /// Point-in-time copy of all entries, sorted by serial. Iterating it
    /// never holds the lock.
    pub fn all(&self) -> Vec<(String, TrackedDevice)> {
        let mut entries: Vec<_> = self
            .lock()
            .iter()
            .map(|(serial, device)| (serial.clone(), device.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn remove(&self, serial: &str) -> Option<TrackedDevice> {
        self.lock().remove(serial)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::geo::Position;
    use crate::tracker::types::EvaluationOutcome;
    use chrono::Duration;

    fn event(serial: &str, lat: f64, lon: f64) -> TelemetryEvent {
        TelemetryEvent {
            serial: serial.to_string(),
            position: Position::new(lat, lon),
            altitude_m: None,
            sonde_type: None,
        }
    }

    fn report() -> CheckReport {
        CheckReport {
            outcome: EvaluationOutcome::Skipped,
            distance_km: 300.0,
            landing: None,
            landing_distance_km: None,
        }
    }

    #[test]
    fn upsert_creates_then_moves() {
        let cache = DeviceCache::new();
        let t0 = Utc::now();

        let created = cache.upsert(&event("S1", 50.0, 0.0), t0);
        assert_eq!(created.first_seen, t0);
        assert!(created.last_checked.is_none());

        cache.mark_checked("S1", t0, report()).unwrap();

        let t1 = t0 + Duration::seconds(30);
        let moved = cache.upsert(&event("S1", 50.5, 0.1), t1);
        assert_eq!(moved.position, Position::new(50.5, 0.1));
        assert_eq!(moved.first_seen, t0);
        assert_eq!(moved.last_checked, Some(t0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn upsert_keeps_known_type_when_frame_omits_it() {
        let cache = DeviceCache::new();
        let now = Utc::now();
        let mut first = event("S1", 50.0, 0.0);
        first.sonde_type = Some("RS41".into());
        cache.upsert(&first, now);
        let device = cache.upsert(&event("S1", 50.1, 0.0), now);
        assert_eq!(device.sonde_type.as_deref(), Some("RS41"));
    }

    #[test]
    fn mark_checked_unknown_is_reported() {
        let cache = DeviceCache::new();
        let result = cache.mark_checked("ghost", Utc::now(), report());
        assert!(matches!(result, Err(TrackerError::InvariantViolation(_))));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let cache = DeviceCache::new();
        cache.upsert(&event("S1", 50.0, 0.0), Utc::now());
        assert!(cache.remove("S1").is_some());
        assert!(cache.remove("S1").is_none());
        assert!(cache.get("S1").is_none());
    }

    #[test]
    fn snapshot_survives_removal() {
        let cache = DeviceCache::new();
        let now = Utc::now();
        for serial in ["C", "A", "B"] {
            cache.upsert(&event(serial, 50.0, 0.0), now);
        }

        let snapshot = cache.all();
        for (serial, _) in &snapshot {
            cache.remove(serial);
        }

        let serials: Vec<_> = snapshot.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(serials, ["A", "B", "C"]);
        assert_eq!(cache.len(), 0);
        assert!(cache.all().is_empty());
    }
}
