//! Trip id to line metadata lookup.
//!
//! Snapshots identify vehicles by trip, not by line. A static table produced
//! from the operator's GTFS data maps each trip to its line, headsign, route
//! type and a free-text description used for bus and boat categories.
//!
//! The table file is a JSON object keyed by trip id:
//!
//! ```json
//! {
//!   "14010000612345678": {"line": "14", "headsign": "Mörby centrum", "type": 401},
//!   "14010000698765432": {"line": "1", "headsign": "Frihamnen", "type": 700, "desc": "Blåbuss"}
//! }
//! ```
//!
//! Entries without a line are treated as absent.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::TripTableError;

/// Metadata resolved for a trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripInfo {
    pub line: String,
    pub headsign: Option<String>,
    /// GTFS (extended) route type.
    pub route_type: Option<u16>,
    pub description: Option<String>,
}

/// Resolves trip ids to line metadata.
pub trait TripLookup: Send + Sync {
    /// Metadata for `trip_id`, or `None` on a miss.
    fn lookup(&self, trip_id: &str) -> Option<TripInfo>;
}

#[derive(Debug, Deserialize)]
struct RawTripEntry {
    #[serde(default)]
    line: Option<String>,
    #[serde(default)]
    headsign: Option<String>,
    #[serde(default, rename = "type")]
    route_type: Option<u16>,
    #[serde(default, rename = "desc")]
    description: Option<String>,
}

impl RawTripEntry {
    fn into_info(self) -> Option<TripInfo> {
        let line = self.line.filter(|l| !l.trim().is_empty())?;
        Some(TripInfo {
            line,
            headsign: self.headsign.filter(|h| !h.is_empty()),
            route_type: self.route_type,
            description: self.description,
        })
    }
}

/// In-memory trip table.
#[derive(Debug, Clone, Default)]
pub struct TripTable {
    trips: HashMap<String, TripInfo>,
}

impl TripTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a trip table from a JSON file.
    pub fn load(path: &Path) -> Result<Self, TripTableError> {
        let data = std::fs::read_to_string(path).map_err(|source| TripTableError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_json_str(&data).map_err(|source| TripTableError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            count = table.len(),
            "Loaded trip table"
        );
        Ok(table)
    }

    /// Parse a trip table from JSON text.
    pub fn from_json_str(data: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, RawTripEntry> = serde_json::from_str(data)?;
        let trips = raw
            .into_iter()
            .filter_map(|(id, entry)| entry.into_info().map(|info| (id, info)))
            .collect();
        Ok(Self { trips })
    }

    pub fn insert(&mut self, trip_id: impl Into<String>, info: TripInfo) {
        self.trips.insert(trip_id.into(), info);
    }

    /// Builder-style insert.
    pub fn with_trip(mut self, trip_id: impl Into<String>, info: TripInfo) -> Self {
        self.insert(trip_id, info);
        self
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

impl TripLookup for TripTable {
    fn lookup(&self, trip_id: &str) -> Option<TripInfo> {
        self.trips.get(trip_id).cloned()
    }
}

impl TripInfo {
    /// Minimal info with only a line and route type.
    pub fn new(line: impl Into<String>, route_type: Option<u16>) -> Self {
        Self {
            line: line.into(),
            headsign: None,
            route_type,
            description: None,
        }
    }

    pub fn with_headsign(mut self, headsign: impl Into<String>) -> Self {
        self.headsign = Some(headsign.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "T1": {"line": "14", "headsign": "Mörby centrum", "type": 401},
        "T2": {"line": "1", "type": 700, "desc": "Blåbuss"},
        "T3": {"headsign": "nowhere"},
        "T4": {"line": "  ", "type": 700}
    }"#;

    #[test]
    fn test_parse_table() {
        let table = TripTable::from_json_str(SAMPLE).unwrap();
        assert_eq!(table.len(), 2);

        let t1 = table.lookup("T1").unwrap();
        assert_eq!(t1.line, "14");
        assert_eq!(t1.headsign.as_deref(), Some("Mörby centrum"));
        assert_eq!(t1.route_type, Some(401));

        let t2 = table.lookup("T2").unwrap();
        assert_eq!(t2.description.as_deref(), Some("Blåbuss"));
    }

    #[test]
    fn test_entries_without_line_are_misses() {
        let table = TripTable::from_json_str(SAMPLE).unwrap();
        assert!(table.lookup("T3").is_none());
        assert!(table.lookup("T4").is_none());
        assert!(table.lookup("T99").is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("trips.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let table = TripTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.json");
        assert!(matches!(
            TripTable::load(&missing),
            Err(TripTableError::Read { .. })
        ));

        let bad = temp.path().join("bad.json");
        std::fs::write(&bad, "[1, 2, 3]").unwrap();
        assert!(matches!(
            TripTable::load(&bad),
            Err(TripTableError::Parse { .. })
        ));
    }
}
