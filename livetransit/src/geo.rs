//! Geographic primitives.

use serde::{Deserialize, Serialize};

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether both axes differ from `other` by less than `epsilon` degrees.
    pub fn approx_eq(&self, other: &GeoPoint, epsilon: f64) -> bool {
        (self.lat - other.lat).abs() < epsilon && (self.lon - other.lon).abs() < epsilon
    }

    /// Whether either axis moved by more than `threshold` degrees.
    pub fn moved_beyond(&self, other: &GeoPoint, threshold: f64) -> bool {
        (self.lat - other.lat).abs() > threshold || (self.lon - other.lon).abs() > threshold
    }

    /// Linear interpolation of each axis independently.
    ///
    /// The endpoints are returned exactly at `t <= 0` and `t >= 1`.
    pub fn lerp(&self, to: &GeoPoint, t: f64) -> GeoPoint {
        if t <= 0.0 {
            return *self;
        }
        if t >= 1.0 {
            return *to;
        }
        GeoPoint {
            lat: self.lat + (to.lat - self.lat) * t,
            lon: self.lon + (to.lon - self.lon) * t,
        }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

/// Forward azimuth from `from` to `to` on a sphere.
///
/// Returns degrees in [0, 360), where 0 = North and 90 = East.
pub fn forward_azimuth(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let delta_lambda = (to.lon - from.lon).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}
