//! Core record types for the activity interchange model.
//!
//! This module defines the building blocks an activity is made of:
//! - Timestamps that may or may not carry a UTC offset yet
//! - Locations and waypoints (one sample along the track)
//! - Laps, which group waypoints and carry their own statistics
//! - Device information passed through from the source

use crate::statistics::StatisticsSet;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Timestamps
// ============================================================================

/// A point in time as reported by a source.
///
/// Many sources report local wall-clock times with no offset. Those stay
/// `Naive` until the activity's timezone is known and attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Timestamp {
    pub fn is_qualified(&self) -> bool {
        matches!(self, Timestamp::Zoned(_))
    }

    /// Wall-clock reading, whatever the offset
    pub fn wall_clock(&self) -> NaiveDateTime {
        match self {
            Timestamp::Zoned(dt) => dt.naive_local(),
            Timestamp::Naive(naive) => *naive,
        }
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        match self {
            Timestamp::Zoned(dt) => Some(*dt.offset()),
            Timestamp::Naive(_) => None,
        }
    }

    /// Elapsed time from `earlier` to `self`.
    ///
    /// Two qualified timestamps are compared as instants; anything involving
    /// a naive timestamp falls back to comparing wall clocks.
    pub fn duration_since(&self, earlier: &Timestamp) -> Duration {
        match (self, earlier) {
            (Timestamp::Zoned(a), Timestamp::Zoned(b)) => a.signed_duration_since(*b),
            _ => self.wall_clock().signed_duration_since(earlier.wall_clock()),
        }
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Timestamp::Zoned(dt)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::Zoned(dt.fixed_offset())
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(naive: NaiveDateTime) -> Self {
        Timestamp::Naive(naive)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Zoned(dt) => write!(f, "{}", dt),
            Timestamp::Naive(naive) => write!(f, "{}", naive),
        }
    }
}

// ============================================================================
// Location & Waypoints
// ============================================================================

/// Position in degrees, altitude in meters
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, altitude: Option<f64>) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            altitude,
        }
    }

    /// Latitude and longitude, when both are known
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Role a waypoint plays in the track
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointType {
    /// First point of the activity
    Start,
    #[default]
    Regular,
    /// Every point inside a paused period
    Pause,
    /// First point after a pause
    Resume,
    End,
}

impl WaypointType {
    /// Numeric code used by the interchange format
    pub fn code(self) -> u8 {
        match self {
            WaypointType::Start => 0,
            WaypointType::Regular => 1,
            WaypointType::Pause => 11,
            WaypointType::Resume => 12,
            WaypointType::End => 100,
        }
    }
}

/// A single sample along an activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub timestamp: Timestamp,
    #[serde(rename = "type", default)]
    pub kind: WaypointType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// BPM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hr: Option<f64>,
    /// kcal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    /// W
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    /// ºC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    /// RPM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence: Option<f64>,
    /// SPM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_cadence: Option<f64>,
    /// m
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// m/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl Waypoint {
    pub fn new(timestamp: impl Into<Timestamp>) -> Self {
        Self {
            timestamp: timestamp.into(),
            kind: WaypointType::Regular,
            location: None,
            hr: None,
            calories: None,
            power: None,
            temp: None,
            cadence: None,
            run_cadence: None,
            distance: None,
            speed: None,
        }
    }

    pub fn with_kind(mut self, kind: WaypointType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Coordinates of this point, if it has a full position
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.location.as_ref().and_then(Location::coordinates)
    }
}

fn show(reading: Option<f64>) -> String {
    reading.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.kind, self.timestamp)?;
        if let Some(loc) = &self.location {
            write!(
                f,
                " {}|{}^{}",
                show(loc.latitude),
                show(loc.longitude),
                show(loc.altitude.map(f64::round))
            )?;
        }
        write!(
            f,
            " HR {} CAD {} RCAD {} TEMP {} PWR {} CAL {} SPD {} DST {}",
            show(self.hr),
            show(self.cadence),
            show(self.run_cadence),
            show(self.temp),
            show(self.power),
            show(self.calories),
            show(self.speed),
            show(self.distance)
        )
    }
}

// ============================================================================
// Laps
// ============================================================================

/// What the athlete was doing during a lap
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapIntensity {
    #[default]
    Active,
    Rest,
    Warmup,
    Cooldown,
}

impl LapIntensity {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// What ended a lap
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapTriggerMethod {
    #[default]
    Manual,
    Time,
    Distance,
    PositionStart,
    PositionLap,
    PositionWaypoint,
    PositionMarked,
    SessionEnd,
    FitnessEquipment,
}

impl LapTriggerMethod {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A lap: its own statistics plus the waypoints recorded during it, in time order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    #[serde(default)]
    pub intensity: LapIntensity,
    #[serde(default)]
    pub trigger: LapTriggerMethod,
    #[serde(default)]
    pub stats: StatisticsSet,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

impl Lap {
    pub fn new(start_time: impl Into<Timestamp>, end_time: impl Into<Timestamp>) -> Self {
        Self {
            start_time: Some(start_time.into()),
            end_time: Some(end_time.into()),
            ..Self::default()
        }
    }

    pub fn with_waypoints(mut self, waypoints: Vec<Waypoint>) -> Self {
        self.waypoints = waypoints;
        self
    }

    pub fn with_stats(mut self, stats: StatisticsSet) -> Self {
        self.stats = stats;
        self
    }
}

fn show_time(ts: &Option<Timestamp>) -> String {
    ts.map_or_else(|| "?".to_string(), |t| t.to_string())
}

impl fmt::Display for Lap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} {:?} ({:?}) {} wps",
            show_time(&self.start_time),
            show_time(&self.end_time),
            self.intensity,
            self.trigger,
            self.waypoints.len()
        )
    }
}

// ============================================================================
// Device
// ============================================================================

/// Recording device, carried through untouched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub software_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn naive(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_timestamp_serde_shapes() {
        let zoned: Timestamp = serde_json::from_str("\"2024-05-01T08:00:00+02:00\"").unwrap();
        assert!(zoned.is_qualified());
        assert_eq!(zoned.wall_clock(), naive(8, 0));
        assert_eq!(zoned.offset().unwrap().local_minus_utc(), 7200);

        let plain: Timestamp = serde_json::from_str("\"2024-05-01T08:00:00\"").unwrap();
        assert_eq!(plain, Timestamp::Naive(naive(8, 0)));
    }

    #[test]
    fn test_duration_between_offsets_uses_instants() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let start: Timestamp = plus_two.from_local_datetime(&naive(10, 0)).unwrap().into();
        let end: Timestamp = utc.from_local_datetime(&naive(9, 0)).unwrap().into();

        assert_eq!(end.duration_since(&start), Duration::hours(1));

        let naive_end = Timestamp::Naive(naive(9, 0));
        assert_eq!(naive_end.duration_since(&start), Duration::hours(-1));
    }

    #[test]
    fn test_location_coordinates() {
        assert_eq!(Location::new(47.1, 8.5, None).coordinates(), Some((47.1, 8.5)));
        let partial = Location {
            latitude: Some(47.1),
            ..Location::default()
        };
        assert_eq!(partial.coordinates(), None);
    }

    #[test]
    fn test_codes() {
        assert_eq!(WaypointType::Pause.code(), 11);
        assert_eq!(WaypointType::End.code(), 100);
        assert_eq!(LapIntensity::Cooldown.code(), 3);
        assert_eq!(LapTriggerMethod::FitnessEquipment.code(), 8);
    }

    #[test]
    fn test_waypoint_defaults_and_display() {
        let wp: Waypoint = serde_json::from_str(
            r#"{"timestamp":"2024-05-01T08:00:00","location":{"latitude":1.5,"longitude":2.5,"altitude":10.4},"hr":150}"#,
        )
        .unwrap();
        assert_eq!(wp.kind, WaypointType::Regular);
        assert_eq!(wp.hr, Some(150.0));

        let text = wp.to_string();
        assert!(text.starts_with("Regular@2024-05-01 08:00:00"));
        assert!(text.contains("1.5|2.5^10"));
        assert!(text.contains("HR 150"));
    }

    #[test]
    fn test_lap_display() {
        let lap = Lap::new(naive(8, 0), naive(9, 0))
            .with_waypoints(vec![Waypoint::new(naive(8, 0)), Waypoint::new(naive(9, 0))]);
        assert_eq!(
            lap.to_string(),
            "2024-05-01 08:00:00-2024-05-01 09:00:00 Active (Manual) 2 wps"
        );
    }
}
