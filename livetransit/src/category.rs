//! Transport modes and descriptive category tokens.
//!
//! Buses and boats can be filtered either by line code or by an operating
//! category derived from the trip description. The category tokens are
//! persisted verbatim inside the selection set, so their string forms are a
//! storage format and must not change.
//!
//! # Classification priority
//!
//! Descriptions may carry several cues at once ("ersättningsbuss, blå linje").
//! The classifiers test cues in a fixed order and the first match wins:
//!
//! ```text
//! bus:  near-traffic > replacement > blue > red (default)
//! boat: commuter > waxholm > commuter (default)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::normalize::normalize_description;

/// Transport mode of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Rail,
    Bus,
    Boat,
    Unknown,
}

impl TransportMode {
    /// Resolve a mode from a GTFS (extended) route type.
    ///
    /// 700-799 are bus services, 1000-1099 water transport and 1200 ferry.
    /// Every other route type in the feed is some kind of rail.
    pub fn from_route_type(route_type: u16) -> Self {
        match route_type {
            700..=799 => TransportMode::Bus,
            1000..=1099 | 1200 => TransportMode::Boat,
            _ => TransportMode::Rail,
        }
    }

    /// Parse the loose type tag used by snapshot feeds.
    ///
    /// Accepts mode names as well as numeric route types. Anything else is
    /// `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        if let Ok(route_type) = tag.parse::<u16>() {
            return Self::from_route_type(route_type);
        }
        match tag.to_ascii_lowercase().as_str() {
            "rail" | "metro" | "train" | "tram" | "subway" => TransportMode::Rail,
            "bus" => TransportMode::Bus,
            "boat" | "ferry" | "ship" => TransportMode::Boat,
            _ => TransportMode::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Rail => "rail",
            TransportMode::Bus => "bus",
            TransportMode::Boat => "boat",
            TransportMode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter-selectable category tokens, finer grained than a line code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryToken {
    BusRed,
    BusBlue,
    BusReplacement,
    BusNear,
    BoatCommuter,
    BoatWaxholm,
}

impl CategoryToken {
    /// All bus category tokens, in chip display order.
    pub const BUS: [CategoryToken; 4] = [
        CategoryToken::BusRed,
        CategoryToken::BusBlue,
        CategoryToken::BusReplacement,
        CategoryToken::BusNear,
    ];

    /// All boat category tokens, in chip display order.
    pub const BOAT: [CategoryToken; 2] = [CategoryToken::BoatCommuter, CategoryToken::BoatWaxholm];

    /// Storage form of the token, as persisted in the selection set.
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryToken::BusRed => "__BUS_RED__",
            CategoryToken::BusBlue => "__BUS_BLUE__",
            CategoryToken::BusReplacement => "__BUS_REPL__",
            CategoryToken::BusNear => "__BUS_NEAR__",
            CategoryToken::BoatCommuter => "__BOAT_PENDEL__",
            CategoryToken::BoatWaxholm => "__BOAT_WAX__",
        }
    }

    /// Transport mode this token filters.
    pub fn mode(&self) -> TransportMode {
        match self {
            CategoryToken::BusRed
            | CategoryToken::BusBlue
            | CategoryToken::BusReplacement
            | CategoryToken::BusNear => TransportMode::Bus,
            CategoryToken::BoatCommuter | CategoryToken::BoatWaxholm => TransportMode::Boat,
        }
    }

    /// Human-readable chip label.
    pub fn label(&self) -> &'static str {
        match self {
            CategoryToken::BusRed => "Röd",
            CategoryToken::BusBlue => "Blå",
            CategoryToken::BusReplacement => "Ersättning",
            CategoryToken::BusNear => "Närtrafiken",
            CategoryToken::BoatCommuter => "Pendelbåt",
            CategoryToken::BoatWaxholm => "Waxholmsbolaget",
        }
    }

    /// Category tokens belonging to a mode (empty for rail and unknown).
    pub fn for_mode(mode: TransportMode) -> &'static [CategoryToken] {
        match mode {
            TransportMode::Bus => &Self::BUS,
            TransportMode::Boat => &Self::BOAT,
            TransportMode::Rail | TransportMode::Unknown => &[],
        }
    }
}

impl fmt::Display for CategoryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryToken {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::BUS
            .iter()
            .chain(Self::BOAT.iter())
            .copied()
            .find(|token| token.as_str() == s)
            .ok_or(())
    }
}

/// Classify a bus by its trip description.
pub fn classify_bus_category(description: &str) -> CategoryToken {
    let d = normalize_description(description);

    if d.contains("nartrafik") {
        return CategoryToken::BusNear;
    }
    if d.contains("ersatt") || d.contains("ersat") {
        return CategoryToken::BusReplacement;
    }
    if d.contains("blabuss") || d.contains("bla buss") || d.contains("blue") {
        return CategoryToken::BusBlue;
    }
    CategoryToken::BusRed
}

/// Classify a boat by its trip description.
pub fn classify_boat_category(description: &str) -> CategoryToken {
    let d = normalize_description(description);

    if d.contains("pendelbat") {
        return CategoryToken::BoatCommuter;
    }
    if d.contains("waxholmsbolaget") || d.contains("waxholm") {
        return CategoryToken::BoatWaxholm;
    }
    // Unlabelled boats get the commuter look.
    CategoryToken::BoatCommuter
}

/// Classify a vehicle of the given mode, if the mode has categories.
pub fn classify(mode: TransportMode, description: &str) -> Option<CategoryToken> {
    match mode {
        TransportMode::Bus => Some(classify_bus_category(description)),
        TransportMode::Boat => Some(classify_boat_category(description)),
        TransportMode::Rail | TransportMode::Unknown => None,
    }
}
