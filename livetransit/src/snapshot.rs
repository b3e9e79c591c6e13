//! Vehicle records as delivered by the live feed.
//!
//! The feed is a JSON array of loosely typed objects. Records are decoded one
//! at a time so that a single malformed entry is dropped without failing the
//! whole snapshot; only a body that is not an array at all is an error.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SourceError;
use crate::geo::GeoPoint;

// Accepted spellings per field, preferred first. When several are present
// the first usable one wins.
const ID_KEYS: &[&str] = &["id"];
const TYPE_KEYS: &[&str] = &["type"];
const LAT_KEYS: &[&str] = &["lat", "latitude"];
const LON_KEYS: &[&str] = &["lon", "longitude", "lng"];
const BEARING_KEYS: &[&str] = &["bearing", "heading"];
const SPEED_KEYS: &[&str] = &["speedKmh", "speed"];
const TRIP_KEYS: &[&str] = &["tripId", "trip_id"];
const TIMESTAMP_KEYS: &[&str] = &["ts", "timestamp"];
const DESCRIPTION_KEYS: &[&str] = &["desc", "description"];

/// One vehicle record as it appears on the wire, with every field already
/// coerced to its expected type.
///
/// Only id, lat and lon are required. Optional fields of an unexpected JSON
/// type are treated as absent rather than invalidating the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawVehicleRecord {
    /// Vehicle id; string or number on the wire.
    pub id: Option<String>,
    /// Mode tag; string ("bus") or route type number on the wire.
    pub type_tag: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub bearing: Option<f64>,
    /// Speed in km/h.
    pub speed_kmh: Option<f64>,
    /// Trip id; string or number on the wire.
    pub trip_id: Option<String>,
    pub timestamp: Option<i64>,
    pub description: Option<String>,
}

/// A validated vehicle record.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSnapshot {
    pub id: String,
    /// Raw mode tag, used when the trip lookup has no route type.
    pub type_tag: Option<String>,
    pub position: GeoPoint,
    pub bearing: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub trip_id: Option<String>,
    pub timestamp: Option<i64>,
    pub description: Option<String>,
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn value_to_timestamp(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value_to_f64(value).map(|v| v.floor() as i64))
}

/// First key in `keys` whose value converts.
fn pick<T>(
    object: &Map<String, Value>,
    keys: &[&str],
    convert: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(convert)
}

impl RawVehicleRecord {
    /// Read a record from a JSON value. Returns `None` if it is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            id: pick(object, ID_KEYS, value_to_string),
            type_tag: pick(object, TYPE_KEYS, value_to_string),
            lat: pick(object, LAT_KEYS, value_to_f64),
            lon: pick(object, LON_KEYS, value_to_f64),
            bearing: pick(object, BEARING_KEYS, value_to_f64),
            speed_kmh: pick(object, SPEED_KEYS, value_to_f64),
            trip_id: pick(object, TRIP_KEYS, value_to_string),
            timestamp: pick(object, TIMESTAMP_KEYS, value_to_timestamp),
            description: pick(object, DESCRIPTION_KEYS, |v| v.as_str().map(str::to_string)),
        })
    }

    /// Validate the record. Records without an id or finite coordinates are
    /// rejected.
    pub fn into_snapshot(self) -> Option<VehicleSnapshot> {
        let id = self.id?;
        let lat = self.lat?;
        let lon = self.lon?;

        Some(VehicleSnapshot {
            id,
            type_tag: self.type_tag,
            position: GeoPoint::new(lat, lon),
            bearing: self.bearing,
            speed_kmh: self.speed_kmh,
            trip_id: self.trip_id,
            timestamp: self.timestamp,
            description: self.description,
        })
    }
}

impl VehicleSnapshot {
    /// Minimal snapshot at a position.
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            type_tag: None,
            position: GeoPoint::new(lat, lon),
            bearing: None,
            speed_kmh: None,
            trip_id: None,
            timestamp: None,
            description: None,
        }
    }

    pub fn with_trip(mut self, trip_id: impl Into<String>) -> Self {
        self.trip_id = Some(trip_id.into());
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = Some(speed_kmh);
        self
    }

    pub fn with_type_tag(mut self, tag: impl Into<String>) -> Self {
        self.type_tag = Some(tag.into());
        self
    }
}

/// Decode a snapshot body.
///
/// Returns the valid records in feed order; invalid ones are skipped.
pub fn decode_snapshot(body: &[u8]) -> Result<Vec<VehicleSnapshot>, SourceError> {
    let items: Vec<Value> = serde_json::from_slice(body)?;
    let total = items.len();

    let records: Vec<VehicleSnapshot> = items
        .into_iter()
        .filter_map(|item| RawVehicleRecord::from_value(&item))
        .filter_map(RawVehicleRecord::into_snapshot)
        .collect();

    if records.len() < total {
        debug!(
            count = records.len(),
            dropped = total - records.len(),
            "Decoded snapshot with malformed records"
        );
    }
    Ok(records)
}
