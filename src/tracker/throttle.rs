use chrono::{DateTime, Duration, Utc};

use super::types::TrackedDevice;

/// True when at least `check_interval` has passed since the device was last
/// checked. A device that was never checked is always due.
pub fn is_due(device: &TrackedDevice, now: DateTime<Utc>, check_interval: Duration) -> bool {
    match device.last_checked {
        Some(last) => now - last >= check_interval,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::geo::Position;
    use crate::tracker::types::TelemetryEvent;

    fn device(now: DateTime<Utc>) -> TrackedDevice {
        TrackedDevice::new(
            &TelemetryEvent {
                serial: "S1".into(),
                position: Position::new(50.0, 0.0),
                altitude_m: None,
                sonde_type: None,
            },
            now,
        )
    }

    #[test]
    fn new_device_is_due_for_any_interval() {
        let now = Utc::now();
        let d = device(now);
        assert!(is_due(&d, now, Duration::minutes(3)));
        assert!(is_due(&d, now, Duration::days(365)));
        assert!(is_due(&d, now, Duration::zero()));
    }

    #[test]
    fn due_exactly_at_interval() {
        let t0 = Utc::now();
        let mut d = device(t0);
        d.last_checked = Some(t0);
        let interval = Duration::minutes(3);

        assert!(!is_due(&d, t0, interval));
        assert!(!is_due(&d, t0 + Duration::minutes(1), interval));
        assert!(!is_due(&d, t0 + interval - Duration::milliseconds(1), interval));
        assert!(is_due(&d, t0 + interval, interval));
        assert!(is_due(&d, t0 + Duration::minutes(10), interval));
    }
}
