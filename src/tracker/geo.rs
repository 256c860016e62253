use serde::{Deserialize, Serialize};

/// Mean Earth radius (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, utoipa::ToSchema)]
pub struct Position {
    #[serde(rename = "lat")]
    pub latitude_deg: f64,
    #[serde(rename = "lon")]
    pub longitude_deg: f64,
}

impl Position {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
        }
    }

    /// Parses `"lat, lon"` as written in the config file.
    pub fn from_coordinates(coordinates: &str) -> Option<Self> {
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 {
            return None;
        }
        let position = Self::new(parts[0].parse().ok()?, parts[1].parse().ok()?);
        position.is_valid().then_some(position)
    }

    pub fn is_valid(&self) -> bool {
        self.latitude_deg.is_finite()
            && self.longitude_deg.is_finite()
            && (-90.0..=90.0).contains(&self.latitude_deg)
            && (-180.0..=180.0).contains(&self.longitude_deg)
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    pub fn distance_km(&self, other: &Position) -> f64 {
        great_circle_km(self, other)
    }
}

/// Haversine distance over a spherical Earth.
///
/// The haversine term is clamped to `[0, 1]` so rounding near antipodal
/// points cannot push `asin` outside its domain.
pub fn great_circle_km(a: &Position, b: &Position) -> f64 {
    let delta_lat = b.lat_rad() - a.lat_rad();
    let delta_lon = b.lon_rad() - a.lon_rad();

    let h = (delta_lat / 2.0).sin().powi(2)
        + a.lat_rad().cos() * b.lat_rad().cos() * (delta_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Point `distance_km` due north (negative: south) of `origin` along its meridian.
#[cfg(test)]
pub fn offset_north(origin: &Position, distance_km: f64) -> Position {
    Position::new(
        origin.latitude_deg + (distance_km / EARTH_RADIUS_KM).to_degrees(),
        origin.longitude_deg,
    )
}
