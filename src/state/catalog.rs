/// Static campus catalog
///
/// The six seeded study spaces and the fourteen buildings shown on the map.
/// Loaded at startup; not user-editable.

use super::data::{BuildingId, CampusBuilding, Coordinate, StudySpace};
use crate::error::StateError;
use crate::store::Record;

/// (name, code, description, (lat, lon), services)
type BuildingEntry = (&'static str, &'static str, &'static str, (f64, f64), &'static [&'static str]);

const BUILDINGS: [BuildingEntry; 14] = [
    (
        "Lazaridis Hall",
        "LH",
        "Home to the Lazaridis School of Business & Economics and Department of Mathematics",
        (43.47511, -80.5295),
        &["Business School", "Mathematics Department", "Starbucks", "Study Rooms", "Computer Labs"],
    ),
    (
        "Fred Nichols Campus Centre",
        "FNCC",
        "Student union building with food court and student services",
        (43.473366604806664, -80.52876895007834),
        &["Food Court", "Wilf's Pub", "Student Services", "Bookstore", "OneCard Office"],
    ),
    (
        "Schlegel Building",
        "SBE",
        "Part of the School of Business & Economics",
        (43.47325, -80.53027),
        &["Classrooms", "Faculty Offices", "Study Areas"],
    ),
    (
        "Little House Residence",
        "LH",
        "Traditional-style residence building",
        (43.47332, -80.52774),
        &["Student Housing", "Common Rooms", "Laundry Facilities"],
    ),
    (
        "Leopold Residence",
        "LP",
        "Modern residence building",
        (43.47264, -80.52822),
        &["Student Housing", "Study Rooms", "Laundry Facilities"],
    ),
    (
        "Bricker Residence",
        "BR",
        "Apartment-style residence building",
        (43.47245, -80.52743),
        &["Student Housing", "Kitchen Facilities", "Laundry Facilities"],
    ),
    (
        "Bouckaert Residence",
        "BC",
        "Traditional-style residence building",
        (43.47288, -80.52714),
        &["Student Housing", "Common Areas", "Laundry Facilities"],
    ),
    (
        "53 Bricker Avenue",
        "53B",
        "Student residence building",
        (43.47137, -80.52788),
        &["Student Housing", "Study Areas", "Laundry Facilities"],
    ),
    (
        "Willison Residence",
        "WH",
        "Traditional-style residence building",
        (43.47367, -80.52672),
        &["Student Housing", "Common Rooms", "Laundry Facilities"],
    ),
    (
        "Alumni Field",
        "AF",
        "Outdoor athletic field with artificial turf",
        (43.47415, -80.52552),
        &["Sports Field", "Outdoor Events", "Recreation Area"],
    ),
    (
        "Athletic Complex",
        "AC",
        "Main athletic and recreation facility",
        (43.47522, -80.52571),
        &["Gymnasium", "Fitness Center", "Pool", "Change Rooms", "Athletic Services"],
    ),
    (
        "Parking Lot 4",
        "P4",
        "Main campus parking lot",
        (43.47384, -80.52707),
        &["Student Parking", "Faculty Parking", "Visitor Parking"],
    ),
    (
        "Parking Lot 20",
        "P20",
        "Athletic Complex parking lot",
        (43.47426, -80.52721),
        &["Student Parking", "Event Parking", "Visitor Parking"],
    ),
    (
        "Arts Building",
        "AB",
        "Home to arts and humanities departments",
        (43.4738, -80.5292),
        &["Classrooms", "Performance Spaces", "Faculty Offices"],
    ),
];

/// Build the building list in catalog order.
///
/// Fails if any entry lies outside campus bounds.
pub fn buildings() -> Result<Vec<CampusBuilding>, StateError> {
    BUILDINGS
        .iter()
        .map(|&(name, code, description, (lat, lon), services)| -> Result<CampusBuilding, StateError> {
            Ok(CampusBuilding {
                id: BuildingId::from_name(name),
                name: name.to_string(),
                code: code.to_string(),
                description: description.to_string(),
                coordinate: Coordinate::new(lat, lon)?,
                services: services.iter().map(|s| s.to_string()).collect(),
                image_names: Vec::new(),
            })
        })
        .collect()
}

/// Default study spaces written when the collection is empty
pub fn default_study_spaces() -> Vec<StudySpace> {
    vec![
        StudySpace::new(
            "bricker-1",
            "Bricker Academic Building",
            "Second and Third Floor",
            "Second and Third Floor",
            "7:00 AM - 11:00 PM",
            "None",
        ),
        StudySpace::new(
            "fncc-1",
            "Fred Nichols Campus Centre",
            "24-Hour Lounge",
            "Second Floor",
            "Always Open",
            "None",
        ),
        StudySpace::new(
            "fncc-2",
            "Fred Nichols Campus Centre",
            "Concourse",
            "First Floor",
            "Always Open",
            "None; OneCard required to access from 11 p.m. – 7 a.m.",
        ),
        StudySpace::new(
            "fncc-3",
            "Fred Nichols Campus Centre",
            "Solarium",
            "First Floor",
            "Always Open",
            "None; OneCard required to access from 11 p.m. – 7 a.m.",
        ),
        StudySpace::new(
            "lazaridis-1",
            "Lazaridis Hall",
            "Lazaridis Hall",
            "All Floors",
            "7:00 AM - Midnight",
            "None; OneCard required from 11 p.m. – midnight",
        ),
        StudySpace::new(
            "library-1",
            "Library",
            "Library Inside",
            "All Floors",
            "Weekdays 8:30 AM - 10:00 PM; Saturdays and Sundays 11:00 AM - 5:00 PM",
            "None; seventh floor is a quiet study zone",
        ),
    ]
}

/// Seed records for `RemoteStore::ensure_seeded`
pub fn seed_records() -> Vec<Record> {
    default_study_spaces().iter().map(StudySpace::to_record).collect()
}
