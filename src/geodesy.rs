//! Great-circle helpers for short-range fix comparison.
//!
//! Uses a spherical Earth. Distances the tracker compares are well under
//! 100 km, so the antipodal precision loss of the haversine form never matters.

/// Sphere radius used for all distance calculations (km)
pub const EARTH_RADIUS_KM: f64 = 6372.8;

/// Latitude/longitude pair in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLon {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Haversine distance between two points (km)
pub fn haversine_km(origin: LatLon, destination: LatLon) -> f64 {
    let d_lat = (destination.latitude - origin.latitude).to_radians();
    let d_lon = (destination.longitude - origin.longitude).to_radians();
    let origin_lat = origin.latitude.to_radians();
    let destination_lat = destination.latitude.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + (d_lon / 2.0).sin().powi(2) * (origin_lat.cos() * destination_lat.cos());
    // Rounding can push `a` a hair above 1.0 for near-antipodal points
    let c = 2.0 * a.min(1.0).sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Average ground speed in km/h for `distance_km` covered in `elapsed_s` seconds.
///
/// Returns `None` when no time has elapsed.
pub fn speed_kmph(distance_km: f64, elapsed_s: i64) -> Option<f64> {
    if elapsed_s <= 0 {
        return None;
    }
    let meters_per_second = distance_km * 1000.0 / elapsed_s as f64;
    Some(meters_per_second * 3.6)
}
