/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the record store and the UI layer.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{StateError, StoreError};
use crate::store::Record;

/// User-reported occupancy of a study space
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(from = "String", into = "String")]
pub enum CrowdStatus {
    #[default]
    Unknown,
    Empty,
    NotCrowded,
    VeryBusy,
}

impl CrowdStatus {
    /// Statuses a user can report
    pub const REPORTABLE: [CrowdStatus; 3] = [
        CrowdStatus::Empty,
        CrowdStatus::NotCrowded,
        CrowdStatus::VeryBusy,
    ];

    /// Wire and display text
    pub fn as_str(&self) -> &'static str {
        match self {
            CrowdStatus::Unknown => "Unknown",
            CrowdStatus::Empty => "Empty",
            CrowdStatus::NotCrowded => "Not Crowded",
            CrowdStatus::VeryBusy => "Very Busy",
        }
    }

    /// Parse wire text; anything unrecognised becomes `Unknown`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "Empty" => CrowdStatus::Empty,
            "Not Crowded" => CrowdStatus::NotCrowded,
            "Very Busy" => CrowdStatus::VeryBusy,
            "Unknown" => CrowdStatus::Unknown,
            other => {
                warn!("Unrecognised crowd status '{other}', treating as Unknown");
                CrowdStatus::Unknown
            }
        }
    }
}

impl From<String> for CrowdStatus {
    fn from(value: String) -> Self {
        CrowdStatus::from_wire(&value)
    }
}

impl From<CrowdStatus> for String {
    fn from(status: CrowdStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for CrowdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape of a study-space record.
///
/// Missing, `null` and wrongly typed fields default on ingest instead of
/// failing the whole record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
struct SpaceDocument {
    #[serde(deserialize_with = "lenient")]
    building: String,
    #[serde(deserialize_with = "lenient")]
    name: String,
    #[serde(deserialize_with = "lenient")]
    location: String,
    #[serde(deserialize_with = "lenient")]
    hours: String,
    #[serde(deserialize_with = "lenient")]
    restrictions: String,
    #[serde(deserialize_with = "lenient")]
    crowd_status: CrowdStatus,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    last_updated: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    updated_by: Option<String>,
}

/// Decode one field, falling back to its default when the value is `null`
/// or of the wrong type.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }

    Ok(serde_json::from_value(value.clone()).unwrap_or_else(|e| {
        warn!("⚠️  Ignoring unreadable field value {value}: {e}");
        T::default()
    }))
}

/// A study space whose crowdedness users report
#[derive(Debug, Clone, PartialEq)]
pub struct StudySpace {
    /// Stable record key, e.g. "fncc-1"
    pub id: String,
    pub building: String,
    pub name: String,
    pub location: String,
    pub hours: String,
    pub restrictions: String,
    pub crowd_status: CrowdStatus,
    /// Assigned by the store on every write
    pub last_updated: Option<DateTime<Utc>>,
    /// Identity of the last writer, or "system" for seeded records
    pub updated_by: Option<String>,
}

impl StudySpace {
    pub fn new(
        id: impl Into<String>,
        building: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        hours: impl Into<String>,
        restrictions: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            building: building.into(),
            name: name.into(),
            location: location.into(),
            hours: hours.into(),
            restrictions: restrictions.into(),
            crowd_status: CrowdStatus::Unknown,
            last_updated: None,
            updated_by: None,
        }
    }

    /// Decode a store record, defaulting missing or unreadable fields.
    pub fn from_record(record: Record) -> Result<Self, StoreError> {
        let doc: SpaceDocument =
            serde_json::from_value(Value::Object(record.fields)).map_err(|e| {
                StoreError::Malformed {
                    id: record.id.clone(),
                    reason: e.to_string(),
                }
            })?;

        Ok(Self {
            id: record.id,
            building: doc.building,
            name: doc.name,
            location: doc.location,
            hours: doc.hours,
            restrictions: doc.restrictions,
            crowd_status: doc.crowd_status,
            last_updated: doc.last_updated.and_then(DateTime::<Utc>::from_timestamp_millis),
            updated_by: doc.updated_by,
        })
    }

    /// Full field map for a write. The store adds the timestamp and author.
    pub fn to_fields(&self) -> Map<String, Value> {
        let doc = SpaceDocument {
            building: self.building.clone(),
            name: self.name.clone(),
            location: self.location.clone(),
            hours: self.hours.clone(),
            restrictions: self.restrictions.clone(),
            crowd_status: self.crowd_status,
            last_updated: None,
            updated_by: None,
        };

        match serde_json::to_value(doc) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        }
    }

    /// Fields for a status report: everything unchanged except crowd status
    pub fn fields_with_status(&self, status: CrowdStatus) -> Map<String, Value> {
        let mut fields = self.to_fields();
        fields.insert("crowdStatus".to_string(), Value::from(String::from(status)));
        fields
    }

    pub fn to_record(&self) -> Record {
        Record {
            id: self.id.clone(),
            fields: self.to_fields(),
        }
    }
}

/// Deterministic building identifier (slug of the building name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildingId(String);

impl BuildingId {
    /// "Fred Nichols Campus Centre" -> "fred-nichols-campus-centre"
    pub fn from_name(name: &str) -> Self {
        let mut slug = String::with_capacity(name.len());
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        while slug.ends_with('-') {
            slug.pop();
        }
        Self(slug)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BuildingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latitude/longitude bounds of the campus
pub const CAMPUS_LAT_RANGE: (f64, f64) = (43.465, 43.480);
pub const CAMPUS_LON_RANGE: (f64, f64) = (-80.540, -80.520);

/// A (latitude, longitude) pair inside campus bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, StateError> {
        let (lat_min, lat_max) = CAMPUS_LAT_RANGE;
        let (lon_min, lon_max) = CAMPUS_LON_RANGE;

        if !(lat_min..=lat_max).contains(&lat) || !(lon_min..=lon_max).contains(&lon) {
            return Err(StateError::Catalog(format!(
                "coordinate ({lat}, {lon}) is outside campus bounds"
            )));
        }

        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

/// A campus building shown on the map. Built from the static catalog, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CampusBuilding {
    pub id: BuildingId,
    pub name: String,
    /// Short code, e.g. "FNCC". Not unique.
    pub code: String,
    pub description: String,
    pub coordinate: Coordinate,
    /// Service tags, e.g. "Food Court"
    pub services: Vec<String>,
    pub image_names: Vec<String>,
}

/// Background style of the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapStyle {
    #[default]
    Standard,
    Satellite,
    Hybrid,
}

impl MapStyle {
    pub const ALL: [MapStyle; 3] = [MapStyle::Standard, MapStyle::Satellite, MapStyle::Hybrid];

    pub fn label(&self) -> &'static str {
        match self {
            MapStyle::Standard => "Standard",
            MapStyle::Satellite => "Satellite",
            MapStyle::Hybrid => "Hybrid",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_crowd_status_wire_text() {
        for status in [
            CrowdStatus::Unknown,
            CrowdStatus::Empty,
            CrowdStatus::NotCrowded,
            CrowdStatus::VeryBusy,
        ] {
            assert_eq!(CrowdStatus::from_wire(status.as_str()), status);
        }
        assert_eq!(CrowdStatus::from_wire("Packed"), CrowdStatus::Unknown);
    }

    #[test]
    fn test_missing_fields_default_on_ingest() {
        let record = Record {
            id: "library-1".into(),
            fields: json!({ "name": "Library Inside" }).as_object().cloned().unwrap(),
        };

        let space = StudySpace::from_record(record).unwrap();
        assert_eq!(space.id, "library-1");
        assert_eq!(space.name, "Library Inside");
        assert_eq!(space.building, "");
        assert_eq!(space.crowd_status, CrowdStatus::Unknown);
        assert_eq!(space.last_updated, None);
    }

    #[test]
    fn test_null_fields_default_on_ingest() {
        let record = Record {
            id: "fncc-1".into(),
            fields: json!({
                "name": null,
                "building": "FNCC",
                "crowdStatus": null,
                "lastUpdated": null,
                "updatedBy": null,
            })
            .as_object()
            .cloned()
            .unwrap(),
        };

        let space = StudySpace::from_record(record).unwrap();
        assert_eq!(space.id, "fncc-1");
        assert_eq!(space.name, "");
        assert_eq!(space.building, "FNCC");
        assert_eq!(space.crowd_status, CrowdStatus::Unknown);
        assert_eq!(space.last_updated, None);
        assert_eq!(space.updated_by, None);
    }

    #[test]
    fn test_wrongly_typed_fields_default_on_ingest() {
        let record = Record {
            id: "x".into(),
            fields: json!({
                "name": 7,
                "hours": "24/7",
                "crowdStatus": ["Empty"],
                "lastUpdated": "yesterday",
            })
            .as_object()
            .cloned()
            .unwrap(),
        };

        let space = StudySpace::from_record(record).unwrap();
        assert_eq!(space.name, "");
        assert_eq!(space.hours, "24/7");
        assert_eq!(space.crowd_status, CrowdStatus::Unknown);
        assert_eq!(space.last_updated, None);
    }

    #[test]
    fn test_fields_use_wire_names() {
        let space = StudySpace::new("fncc-2", "FNCC", "Concourse", "First Floor", "Always Open", "None");
        let fields = space.fields_with_status(CrowdStatus::NotCrowded);

        assert_eq!(fields["crowdStatus"], json!("Not Crowded"));
        assert_eq!(fields["name"], json!("Concourse"));
        assert!(!fields.contains_key("lastUpdated"));
        assert!(!fields.contains_key("updatedBy"));
    }

    #[test]
    fn test_timestamp_ingest() {
        let record = Record {
            id: "a".into(),
            fields: json!({ "lastUpdated": 1_700_000_000_000i64, "updatedBy": "system" })
                .as_object()
                .cloned()
                .unwrap(),
        };

        let space = StudySpace::from_record(record).unwrap();
        assert_eq!(space.last_updated.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(space.updated_by.as_deref(), Some("system"));
    }

    #[test]
    fn test_building_id_slug() {
        assert_eq!(BuildingId::from_name("Fred Nichols Campus Centre").as_str(), "fred-nichols-campus-centre");
        assert_eq!(BuildingId::from_name("53 Bricker Avenue").as_str(), "53-bricker-avenue");
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(Coordinate::new(43.47511, -80.5295).is_ok());
        assert!(Coordinate::new(45.0, -80.5295).is_err());
        assert!(Coordinate::new(43.47, -79.0).is_err());
    }
}
