//! Style tokens handed to the presentation layer.
//!
//! The core never draws anything. It resolves, per vehicle, a small value type
//! describing colors and icon orientation; the renderer turns that into pixels.
//! Entities remember the last style they were given so the renderer is only
//! asked to restyle when something actually changed.

use crate::category::{CategoryToken, TransportMode};
use crate::normalize::normalize_line;

/// Fallback color for unlisted rail lines and unknown vehicles.
pub const UNKNOWN_FILL: &str = "#111827";
const UNKNOWN_STROKE: &str = "#0b1220";

/// Stroke used on bus icons.
const BUS_STROKE: &str = "#020224";
const BUS_RED: &str = "#BA0D2B";
const BUS_BLUE: &str = "#015CA3";
const BUS_REPLACEMENT: &str = "#F28C28";
const BUS_NEAR_FILL: &str = "#FFFFFF";
const BUS_NEAR_DASH: &str = "10 6";

const BOAT_STROKE: &str = "#4A4AE0";
const BOAT_COMMUTER: &str = "#007DB8";
const BOAT_WAXHOLM_YELLOW: &str = "#F2C94C";
const BOAT_WAXHOLM_BLUE: &str = "#1E4ED8";

const WHITE: &str = "#FFFFFF";

/// Icon fill: solid color or a left/right split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fill {
    Solid(String),
    Split { left: String, right: String },
}

/// Fully resolved visual style for one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleStyle {
    pub mode: TransportMode,
    /// Category token for buses and boats.
    pub category: Option<CategoryToken>,
    pub fill: Fill,
    pub stroke: String,
    /// Dash pattern for the icon outline, if any.
    pub stroke_dash: Option<String>,
    /// Label text color.
    pub label_text: String,
    /// Whether the renderer should draw a heading arrow.
    pub has_heading: bool,
    /// Icon rotation in degrees, including the per-mode artwork offset.
    pub rotation_deg: f64,
}

/// Color for a rail line code.
pub fn rail_line_color(line: &str) -> &'static str {
    match normalize_line(line).as_str() {
        "7" => "#878C85",
        "10" | "11" => "#0091D2",
        "12" => "#738BA4",
        "13" | "14" => "#D71D24",
        "17" | "18" | "19" => "#00B259",
        "21" => "#B76934",
        "25" | "26" => "#21B6BA",
        "27" | "27S" | "28" | "28S" | "29" => "#A86DAE",
        "30" | "31" => "#E08A32",
        "40" | "41" | "43" | "43X" | "48" => "#ED66A5",
        _ => UNKNOWN_FILL,
    }
}

/// Darken a `#rrggbb` color by the given fraction.
///
/// Malformed input is returned unchanged.
pub fn darken_hex(hex: &str, amount: f64) -> String {
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    };

    let (Some(r), Some(g), Some(b)) = (channel(1..3), channel(3..5), channel(5..7)) else {
        return hex.to_string();
    };
    if !hex.starts_with('#') || hex.len() != 7 {
        return hex.to_string();
    }

    let scale = |v: u8| ((v as f64) * (1.0 - amount)).round().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", scale(r), scale(g), scale(b))
}

/// Icon rotation for a mode, given the resolved heading.
///
/// Each mode's artwork points a different way at rest, so the offset differs.
/// Without a heading every icon renders unrotated.
pub fn rotation_for(mode: TransportMode, unknown: bool, bearing: Option<f64>) -> f64 {
    let Some(bearing) = bearing else {
        return 0.0;
    };
    if unknown {
        return (bearing - 90.0).rem_euclid(360.0);
    }
    match mode {
        TransportMode::Rail | TransportMode::Unknown => bearing + 90.0,
        TransportMode::Bus => bearing,
        TransportMode::Boat => bearing - 90.0,
    }
}

/// Resolve the full style for a vehicle.
pub fn resolve_style(
    mode: TransportMode,
    line: &str,
    category: Option<CategoryToken>,
    unknown: bool,
    bearing: Option<f64>,
) -> VehicleStyle {
    let rotation_deg = rotation_for(mode, unknown, bearing);
    let has_heading = bearing.is_some();

    let base = |fill: Fill, stroke: &str| VehicleStyle {
        mode,
        category,
        fill,
        stroke: stroke.to_string(),
        stroke_dash: None,
        label_text: WHITE.to_string(),
        has_heading,
        rotation_deg,
    };

    if unknown {
        return base(Fill::Solid(UNKNOWN_FILL.to_string()), UNKNOWN_STROKE);
    }

    match (mode, category) {
        (TransportMode::Bus, Some(CategoryToken::BusNear)) => VehicleStyle {
            stroke_dash: Some(BUS_NEAR_DASH.to_string()),
            label_text: BUS_RED.to_string(),
            ..base(Fill::Solid(BUS_NEAR_FILL.to_string()), BUS_RED)
        },
        (TransportMode::Bus, Some(CategoryToken::BusBlue)) => {
            base(Fill::Solid(BUS_BLUE.to_string()), BUS_STROKE)
        }
        (TransportMode::Bus, Some(CategoryToken::BusReplacement)) => {
            base(Fill::Solid(BUS_REPLACEMENT.to_string()), BUS_STROKE)
        }
        (TransportMode::Bus, _) => base(Fill::Solid(BUS_RED.to_string()), BUS_STROKE),
        (TransportMode::Boat, Some(CategoryToken::BoatWaxholm)) => base(
            Fill::Split {
                left: BOAT_WAXHOLM_YELLOW.to_string(),
                right: BOAT_WAXHOLM_BLUE.to_string(),
            },
            BOAT_STROKE,
        ),
        (TransportMode::Boat, _) => base(Fill::Solid(BOAT_COMMUTER.to_string()), BOAT_STROKE),
        (TransportMode::Rail | TransportMode::Unknown, _) => {
            let color = rail_line_color(line);
            base(Fill::Solid(color.to_string()), &darken_hex(color, 0.01))
        }
    }
}
