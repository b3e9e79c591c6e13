//! Geographic to screen-space projection.
//!
//! Animation timing depends on how far a vehicle moves *on screen*, which is a
//! property of the map view, not of the vehicle. The presentation layer owns
//! the real projection and implements [`ScreenProjection`]; the core only ever
//! asks it for a pixel distance.
//!
//! [`WebMercatorProjection`] is the stock implementation for a slippy map at a
//! fixed zoom level, used by the headless runner and the tests.

use std::f64::consts::PI;

use crate::geo::GeoPoint;

/// Standard slippy-map tile edge in pixels.
pub const TILE_SIZE_PX: f64 = 256.0;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// A point in screen (layer) pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn distance_to(&self, other: &ScreenPoint) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Mapping from geographic to screen coordinates, supplied by the map view.
pub trait ScreenProjection: Send + Sync {
    /// Project a geographic point to layer pixels.
    fn project(&self, point: &GeoPoint) -> ScreenPoint;

    /// Pixel distance between two geographic points.
    fn screen_distance(&self, from: &GeoPoint, to: &GeoPoint) -> f64 {
        self.project(from).distance_to(&self.project(to))
    }
}

/// Web Mercator projection at a fixed zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercatorProjection {
    zoom: f64,
}

impl WebMercatorProjection {
    /// Create a projection for the given (possibly fractional) zoom level.
    pub fn new(zoom: f64) -> Self {
        Self { zoom }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    fn world_size_px(&self) -> f64 {
        TILE_SIZE_PX * 2.0_f64.powf(self.zoom)
    }
}

impl ScreenProjection for WebMercatorProjection {
    fn project(&self, point: &GeoPoint) -> ScreenPoint {
        let size = self.world_size_px();
        let lat = point.lat.clamp(-MAX_LAT, MAX_LAT);

        let x = (point.lon + 180.0) / 360.0 * size;
        let lat_rad = lat * PI / 180.0;
        let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * size;

        ScreenPoint { x, y }
    }
}
