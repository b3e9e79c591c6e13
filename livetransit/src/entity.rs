//! Tracked vehicle state.

use crate::animation::Animation;
use crate::bearing::BearingState;
use crate::category::{classify, CategoryToken, TransportMode};
use crate::geo::GeoPoint;
use crate::style::{resolve_style, VehicleStyle};

/// Line shown for vehicles whose trip could not be resolved.
pub const UNKNOWN_LINE: &str = "?";

/// Line metadata resolved for one snapshot record.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleMeta {
    /// Normalized line code, or [`UNKNOWN_LINE`].
    pub line: String,
    pub headsign: Option<String>,
    pub mode: TransportMode,
    /// Free-text trip description used for bus and boat categories.
    pub description: String,
    /// The trip could not be resolved.
    pub unknown: bool,
}

impl VehicleMeta {
    /// Metadata for a vehicle without a resolvable trip.
    pub fn unknown() -> Self {
        Self {
            line: UNKNOWN_LINE.to_string(),
            headsign: None,
            mode: TransportMode::Unknown,
            description: String::new(),
            unknown: true,
        }
    }

    pub fn category(&self) -> Option<CategoryToken> {
        if self.unknown {
            return None;
        }
        classify(self.mode, &self.description)
    }
}

/// One vehicle currently shown on the map.
#[derive(Debug)]
pub struct VehicleEntity {
    pub id: String,
    pub meta: VehicleMeta,
    pub trip_id: Option<String>,
    pub speed_kmh: Option<f64>,
    pub timestamp: Option<i64>,
    /// Latest reported position (the animation target).
    pub position: GeoPoint,
    /// Position reported in the previous cycle.
    pub previous_position: Option<GeoPoint>,
    /// Position currently rendered; lags `position` while animating.
    pub displayed_position: GeoPoint,
    pub bearing: BearingState,
    /// Heading resolved in the most recent cycle.
    pub heading: Option<f64>,
    pub animation: Option<Animation>,
    /// Style most recently handed to the presentation layer.
    pub last_style: Option<VehicleStyle>,
}

impl VehicleEntity {
    pub fn new(id: impl Into<String>, meta: VehicleMeta, position: GeoPoint) -> Self {
        Self {
            id: id.into(),
            meta,
            trip_id: None,
            speed_kmh: None,
            timestamp: None,
            position,
            previous_position: None,
            displayed_position: position,
            bearing: BearingState::default(),
            heading: None,
            animation: None,
            last_style: None,
        }
    }

    /// Style for the current metadata and heading.
    pub fn resolve_style(&self) -> VehicleStyle {
        resolve_style(
            self.meta.mode,
            &self.meta.line,
            self.meta.category(),
            self.meta.unknown,
            self.heading,
        )
    }

    /// Label text, including the speed suffix when known.
    pub fn label_text(&self) -> String {
        format!(
            "{}{}",
            label_text(&self.meta.line, self.meta.headsign.as_deref(), self.meta.unknown),
            format_speed(self.speed_kmh)
        )
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }
}

/// `line → headsign`, `line` without a headsign, `?` when unknown.
pub fn label_text(line: &str, headsign: Option<&str>, unknown: bool) -> String {
    if unknown {
        return UNKNOWN_LINE.to_string();
    }
    match headsign.filter(|h| !h.is_empty()) {
        Some(headsign) => format!("{} → {}", line, headsign),
        None => line.to_string(),
    }
}

/// ` • N km/h`, or an empty string when the speed is missing or invalid.
pub fn format_speed(speed_kmh: Option<f64>) -> String {
    match speed_kmh {
        Some(speed) if speed.is_finite() && speed >= 0.0 => {
            format!(" • {} km/h", speed.round() as i64)
        }
        _ => String::new(),
    }
}
