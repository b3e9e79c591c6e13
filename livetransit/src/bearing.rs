//! Per-vehicle heading inference.
//!
//! Upstream bearing feeds are intermittent, especially near stops. Rather than
//! snapping an icon back to a neutral orientation whenever the feed drops the
//! field, the estimator falls back to a heading derived from displacement, and
//! once any heading is known it is held until the vehicle disappears.
//!
//! # Resolution order
//!
//! ```text
//! reported bearing > 0          --> Reported   (established)
//! moved > threshold since last  --> Derived    (established)
//! previously established        --> Held
//! otherwise                     --> Unknown
//! ```
//!
//! The movement threshold filters GPS jitter at near-zero speed, which would
//! otherwise flip the heading around while a vehicle stands at a platform.

use crate::geo::{forward_azimuth, GeoPoint};

/// Default movement threshold in degrees (~2 m).
pub const DEFAULT_MOVEMENT_THRESHOLD_DEG: f64 = 0.00002;

/// Where a cycle's heading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearingSource {
    /// Taken directly from the snapshot.
    Reported,
    /// Computed from previous and current position.
    Derived,
    /// Reused from an earlier cycle.
    Held,
    /// No heading has ever been established.
    Unknown,
}

impl BearingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BearingSource::Reported => "reported",
            BearingSource::Derived => "derived",
            BearingSource::Held => "held",
            BearingSource::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BearingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heading state carried by a tracked vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BearingState {
    /// Whether a reliable heading has been seen for this vehicle.
    pub established: bool,
    /// Most recent established heading in degrees.
    pub last_bearing: Option<f64>,
}

impl BearingState {
    fn establish(&mut self, bearing: f64) {
        self.established = true;
        self.last_bearing = Some(bearing);
    }
}

/// Outcome of resolving one cycle's heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BearingResolution {
    /// Heading in degrees [0, 360), or `None` when unknown.
    pub bearing: Option<f64>,
    pub source: BearingSource,
}

/// Heading estimator shared by all vehicles.
///
/// The estimator itself is stateless; each vehicle's [`BearingState`] is
/// passed in and updated in place.
#[derive(Debug, Clone, Copy)]
pub struct BearingEstimator {
    movement_threshold_deg: f64,
}

impl Default for BearingEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_MOVEMENT_THRESHOLD_DEG)
    }
}

impl BearingEstimator {
    pub fn new(movement_threshold_deg: f64) -> Self {
        Self {
            movement_threshold_deg,
        }
    }

    pub fn movement_threshold_deg(&self) -> f64 {
        self.movement_threshold_deg
    }

    /// Resolve the heading for one cycle and update `state`.
    ///
    /// # Arguments
    ///
    /// * `state` - The vehicle's bearing state, updated in place
    /// * `current` - Position reported this cycle
    /// * `previous` - Position from the previous cycle, if any
    /// * `reported` - Bearing carried by the snapshot, if any
    pub fn resolve(
        &self,
        state: &mut BearingState,
        current: &GeoPoint,
        previous: Option<&GeoPoint>,
        reported: Option<f64>,
    ) -> BearingResolution {
        // Feeds use 0 for "not available", so only strictly positive values count.
        if let Some(bearing) = reported.filter(|b| b.is_finite() && *b > 0.0) {
            let bearing = bearing.rem_euclid(360.0);
            state.establish(bearing);
            return BearingResolution {
                bearing: Some(bearing),
                source: BearingSource::Reported,
            };
        }

        if let Some(previous) = previous {
            if current.moved_beyond(previous, self.movement_threshold_deg) {
                let bearing = forward_azimuth(previous, current);
                state.establish(bearing);
                return BearingResolution {
                    bearing: Some(bearing),
                    source: BearingSource::Derived,
                };
            }
        }

        match state.last_bearing.filter(|_| state.established) {
            Some(bearing) => BearingResolution {
                bearing: Some(bearing),
                source: BearingSource::Held,
            },
            None => BearingResolution {
                bearing: None,
                source: BearingSource::Unknown,
            },
        }
    }
}
