//! Plausibility checks run before an activity is accepted.
//!
//! The checks reject data that is obviously broken rather than repairing it.
//! They run in a fixed order and stop at the first problem found.

use crate::activity::Activity;
use crate::statistics::Metric;
use crate::types::WaypointType;
use crate::units::Unit;
use crate::{Error, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Starts further ahead than this are rejected
const MAX_START_AHEAD_DAYS: i64 = 5;
/// Ends further ahead than this are rejected
const MAX_END_AHEAD_DAYS: i64 = 10;
const MAX_DURATION_DAYS: i64 = 5;
const MAX_DISTANCE_METERS: f64 = 1_000_000.0;

/// Which plausibility rule an activity broke
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SanityViolation {
    #[error("No laps")]
    NoLaps,

    #[error("Don't know if activity is stationary")]
    StationaryUnknown,

    #[error("Activity is missing waypoints")]
    NoWaypoints,

    #[error("Only one waypoint")]
    SingleWaypoint,

    #[error("Exceeded distance limit ({0} m)")]
    DistanceTooLong(f64),

    #[error("Missing start time")]
    MissingStartTime,

    #[error("Activity starts in the future ({0})")]
    StartInFuture(NaiveDateTime),

    #[error("Activity starts before 1995 ({0})")]
    StartTooEarly(NaiveDateTime),

    #[error("Activity ends in the future ({0})")]
    EndInFuture(NaiveDateTime),

    #[error("Activity ends before it starts")]
    EndBeforeStart,

    #[error("0-duration activity")]
    ZeroDuration,

    #[error("Activity is longer than 5 days")]
    TooLong,

    #[error("Single lap stats don't match activity")]
    LapStatsMismatch,

    #[error("Lap {0} is missing a start time")]
    LapMissingStart(usize),

    #[error("Lap {0} is missing an end time")]
    LapMissingEnd(usize),

    #[error("Invalid lat/lng (0,0)")]
    NullIsland,

    #[error("Invalid lat/lng ({latitude:?}, {longitude:?})")]
    CoordinatesOutOfRange {
        latitude: Option<f64>,
        longitude: Option<f64>,
    },

    #[error("Only one unpaused waypoint")]
    SingleUnpausedWaypoint,

    #[error("Only one located waypoint")]
    SingleLocatedWaypoint,

    #[error("Invalid altitudes / all zero")]
    FlatZeroAltitude,
}

fn earliest_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1995, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

impl Activity {
    /// Check the activity against the current local time
    pub fn check_sanity(&self) -> Result<()> {
        self.check_sanity_at(chrono::Local::now().naive_local())
    }

    /// Check the activity, treating `now` as the current local wall-clock time
    pub fn check_sanity_at(&self, now: NaiveDateTime) -> Result<()> {
        match self.find_violation(now)? {
            None => Ok(()),
            Some(violation) => {
                tracing::warn!(source = ?self.source, "Activity failed sanity check: {}", violation);
                Err(Error::Validation(violation))
            }
        }
    }

    fn find_violation(&self, now: NaiveDateTime) -> Result<Option<SanityViolation>> {
        use SanityViolation::*;

        if self.laps.is_empty() {
            return Ok(Some(NoLaps));
        }

        let Some(stationary) = self.stationary else {
            return Ok(Some(StationaryUnknown));
        };

        if !stationary {
            match self.count_total_waypoints() {
                0 => return Ok(Some(NoWaypoints)),
                1 => return Ok(Some(SingleWaypoint)),
                _ => {}
            }
        }

        let distance = self.stats[Metric::Distance].as_units(Unit::Meters)?.value();
        if let Some(meters) = distance.filter(|m| *m > MAX_DISTANCE_METERS) {
            return Ok(Some(DistanceTooLong(meters)));
        }

        let Some(start) = self.start_time else {
            return Ok(Some(MissingStartTime));
        };
        let start_wall = start.wall_clock();
        if start_wall > now + Duration::days(MAX_START_AHEAD_DAYS) {
            return Ok(Some(StartInFuture(start_wall)));
        }
        if start_wall < earliest_start() {
            return Ok(Some(StartTooEarly(start_wall)));
        }

        if let Some(end) = self.end_time {
            let end_wall = end.wall_clock();
            if end_wall > now + Duration::days(MAX_END_AHEAD_DAYS) {
                return Ok(Some(EndInFuture(end_wall)));
            }

            let duration = end.duration_since(&start);
            if duration < Duration::zero() {
                return Ok(Some(EndBeforeStart));
            }
            if duration == Duration::zero() {
                return Ok(Some(ZeroDuration));
            }
            if duration > Duration::days(MAX_DURATION_DAYS) {
                return Ok(Some(TooLong));
            }
        }

        if let [lap] = self.laps.as_slice() {
            if lap.stats != self.stats {
                return Ok(Some(LapStatsMismatch));
            }
        }

        let mut altitude_range: Option<(f64, f64)> = None;
        let mut unpaused = 0usize;
        let mut located = 0usize;

        for (idx, lap) in self.laps.iter().enumerate() {
            if lap.start_time.is_none() {
                return Ok(Some(LapMissingStart(idx)));
            }
            if lap.end_time.is_none() {
                return Ok(Some(LapMissingEnd(idx)));
            }

            for wp in &lap.waypoints {
                if wp.kind != WaypointType::Pause {
                    unpaused += 1;
                }

                let Some(loc) = wp.location else {
                    continue;
                };

                if loc.latitude == Some(0.0) && loc.longitude == Some(0.0) {
                    return Ok(Some(NullIsland));
                }
                let lat_bad = loc.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat));
                let lon_bad = loc.longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon));
                if lat_bad || lon_bad {
                    return Ok(Some(CoordinatesOutOfRange {
                        latitude: loc.latitude,
                        longitude: loc.longitude,
                    }));
                }

                if loc.coordinates().is_some() {
                    located += 1;
                }
                if let Some(alt) = loc.altitude {
                    altitude_range = Some(match altitude_range {
                        Some((min, max)) => (min.min(alt), max.max(alt)),
                        None => (alt, alt),
                    });
                }
            }
        }

        if unpaused == 1 {
            return Ok(Some(SingleUnpausedWaypoint));
        }
        if located == 1 {
            return Ok(Some(SingleLocatedWaypoint));
        }
        if altitude_range == Some((0.0, 0.0)) {
            return Ok(Some(FlatZeroAltitude));
        }

        Ok(None)
    }
}
