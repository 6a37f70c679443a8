//! The activity aggregate: laps, statistics, timezone state and identity.
//!
//! Ingestion adapters build an [`Activity`] in whatever shape their source
//! provides, then run it through timezone normalization, cleaning, sanity
//! checks and UID calculation before it is treated as canonical.

use crate::activity_type::ActivityType;
use crate::statistics::{Metric, StatisticsSet};
use crate::timezone::{ActivityTz, TimezoneCache, TimezoneLookup, TimezoneResolver};
use crate::types::{Device, Lap, Location, Timestamp, Waypoint};
use crate::{Error, Result};
use chrono::SubsecRound;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single workout, normalized from any source
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    #[serde(rename = "type", default)]
    pub activity_type: ActivityType,
    #[serde(default)]
    pub laps: Vec<Lap>,
    #[serde(default)]
    pub stats: StatisticsSet,
    /// Resolved timezone, set by [`Activity::calculate_tz`]
    #[serde(default)]
    pub tz: Option<ActivityTz>,
    /// Used only when no waypoint carries a position
    #[serde(default)]
    pub fallback_tz: Option<ActivityTz>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub private: bool,
    /// Whether the activity involved no movement. `None` means nobody decided yet.
    #[serde(default)]
    pub stationary: Option<bool>,
    #[serde(default)]
    pub device: Option<Device>,
    /// Originating service data, kept only for error context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<serde_json::Value>,
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    uid: Option<String>,
}

impl Activity {
    pub fn new(
        start_time: impl Into<Timestamp>,
        end_time: impl Into<Timestamp>,
        activity_type: ActivityType,
    ) -> Self {
        Self {
            start_time: Some(start_time.into()),
            end_time: Some(end_time.into()),
            activity_type,
            ..Self::default()
        }
    }

    /// Content-derived identity, available once [`Activity::calculate_uid`] has run
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn count_total_waypoints(&self) -> usize {
        self.laps.iter().map(|lap| lap.waypoints.len()).sum()
    }

    /// Every waypoint across all laps, in order
    pub fn flat_waypoints(&self) -> impl Iterator<Item = &Waypoint> {
        self.laps.iter().flat_map(|lap| lap.waypoints.iter())
    }

    pub fn flat_waypoints_mut(&mut self) -> impl Iterator<Item = &mut Waypoint> {
        self.laps.iter_mut().flat_map(|lap| lap.waypoints.iter_mut())
    }

    /// First waypoint with both latitude and longitude
    pub fn first_located_waypoint(&self) -> Option<&Waypoint> {
        self.flat_waypoints().find(|wp| wp.coordinates().is_some())
    }

    /// Sum every lap's statistics into a fresh set
    pub fn aggregate_lap_stats(&self) -> Result<StatisticsSet> {
        let mut total = StatisticsSet::new();
        for lap in &self.laps {
            total.sum_with(&lap.stats)?;
        }
        Ok(total)
    }

    // ========================================================================
    // Timezones
    // ========================================================================

    /// Work out which timezone the activity took place in.
    ///
    /// Returns the already-resolved zone unless `recalculate` is set. The zone
    /// comes from `loc` if given, else from the first located waypoint, else
    /// from the fallback timezone.
    pub fn calculate_tz<C, L>(
        &mut self,
        resolver: &TimezoneResolver<C, L>,
        loc: Option<Location>,
        recalculate: bool,
    ) -> Result<ActivityTz>
    where
        C: TimezoneCache,
        L: TimezoneLookup,
    {
        if let (Some(tz), false) = (self.tz, recalculate) {
            return Ok(tz);
        }

        let coordinates = match loc {
            Some(loc) => Some(loc.coordinates().ok_or_else(|| {
                Error::Resolution("Given location has no latitude/longitude".into())
            })?),
            None => self.first_located_waypoint().and_then(Waypoint::coordinates),
        };

        let tz = match coordinates {
            Some((latitude, longitude)) => resolver.resolve(latitude, longitude)?,
            None => self.fallback_tz.ok_or_else(|| {
                Error::Resolution(
                    "Can't find TZ without a waypoint with a location, or a fallback TZ".into(),
                )
            })?,
        };

        tracing::info!("Resolved activity timezone to {}", tz);
        self.tz = Some(tz);
        Ok(tz)
    }

    fn require_tz(&self) -> Result<ActivityTz> {
        self.tz
            .ok_or_else(|| Error::Precursor("Activity timezone has not been resolved".into()))
    }

    fn for_each_timestamp(&mut self, mut f: impl FnMut(&mut Timestamp)) {
        self.start_time.iter_mut().chain(self.end_time.iter_mut()).for_each(&mut f);
        for lap in &mut self.laps {
            lap.start_time.iter_mut().chain(lap.end_time.iter_mut()).for_each(&mut f);
            lap.waypoints.iter_mut().for_each(|wp| f(&mut wp.timestamp));
        }
    }

    /// Tag every naive timestamp with the activity timezone, keeping its wall-clock reading
    pub fn define_tz(&mut self) -> Result<()> {
        let tz = self.require_tz()?;
        self.for_each_timestamp(|ts| {
            if let Timestamp::Naive(naive) = *ts {
                *ts = Timestamp::Zoned(tz.localize(&naive));
            }
        });
        self.calculate_uid();
        Ok(())
    }

    /// Move every qualified timestamp into the activity timezone, keeping its instant
    pub fn adjust_tz(&mut self) -> Result<()> {
        let tz = self.require_tz()?;
        self.for_each_timestamp(|ts| {
            if let Timestamp::Zoned(dt) = *ts {
                *ts = Timestamp::Zoned(tz.convert(&dt));
            }
        });
        self.calculate_uid();
        Ok(())
    }

    /// Resolve the timezone, then define or adjust depending on whether the start time is qualified
    pub fn ensure_tz<C, L>(&mut self, resolver: &TimezoneResolver<C, L>, recalculate: bool) -> Result<()>
    where
        C: TimezoneCache,
        L: TimezoneLookup,
    {
        self.calculate_tz(resolver, None, recalculate)?;
        match self.start_time {
            Some(Timestamp::Zoned(_)) => self.adjust_tz(),
            _ => self.define_tz(),
        }
    }

    /// Hash the local start time, to the second, into the activity's UID.
    ///
    /// The offset is left out of the hashed text on purpose: the same local
    /// start second reported by two services must produce the same UID.
    pub fn calculate_uid(&mut self) {
        let Some(start) = self.start_time else {
            return;
        };

        let local = match (start, self.tz) {
            (Timestamp::Zoned(dt), Some(tz)) => tz.convert(&dt.trunc_subsecs(0)).naive_local(),
            _ => start.wall_clock().trunc_subsecs(0),
        };

        let mut hasher = Md5::new();
        hasher.update(local.format("%Y-%m-%d %H:%M:%S").to_string().as_bytes());
        self.uid = Some(format!("{:x}", hasher.finalize()));
    }
}

impl PartialEq for Activity {
    /// Identity-relevant fields only; notes, flags and most statistics are ignored
    fn eq(&self, other: &Self) -> bool {
        self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.activity_type == other.activity_type
            && self.laps == other.laps
            && self.stats[Metric::Distance] == other.stats[Metric::Distance]
            && self.name == other.name
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |ts: &Option<Timestamp>| ts.map_or_else(|| "?".to_string(), |t| t.to_string());
        write!(
            f,
            "Activity ({}) Start {} {} End {} stat {:?}",
            self.activity_type,
            show(&self.start_time),
            self.tz.map_or_else(|| "no TZ".to_string(), |tz| tz.to_string()),
            show(&self.end_time),
            self.stationary
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timezone::{FixedLookup, MemoryTzCache, TzValue};
    use crate::StatField;
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn zoned(offset_hours: i32, wall: NaiveDateTime) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_hours * 3600)
            .unwrap()
            .from_local_datetime(&wall)
            .unwrap()
    }

    fn located_activity() -> Activity {
        let mut activity = Activity::new(at(8, 0, 0), at(9, 0, 0), ActivityType::Running);
        activity.laps.push(Lap::new(at(8, 0, 0), at(9, 0, 0)).with_waypoints(vec![
            Waypoint::new(at(8, 0, 0)),
            Waypoint::new(at(8, 30, 0)).with_location(Location::new(46.95, 7.44, Some(540.0))),
            Waypoint::new(at(9, 0, 0)).with_location(Location::new(46.96, 7.45, Some(550.0))),
        ]));
        activity
    }

    fn resolver(zone: &str) -> TimezoneResolver<MemoryTzCache, FixedLookup> {
        TimezoneResolver::new(MemoryTzCache::new(), FixedLookup(TzValue::Named(zone.into())))
    }

    #[test]
    fn test_calculate_tz_from_first_located_waypoint() {
        let mut activity = located_activity();
        let resolver = resolver("Europe/Zurich");

        let tz = activity.calculate_tz(&resolver, None, false).unwrap();

        assert_eq!(tz, ActivityTz::named("Europe/Zurich").unwrap());
        assert_eq!(
            resolver.cache().get(46.95, 7.44),
            Some(TzValue::Named("Europe/Zurich".into()))
        );
        assert_eq!(resolver.cache().get(46.96, 7.45), None);
    }

    #[test]
    fn test_calculate_tz_is_memoized() {
        let mut activity = located_activity();
        activity.calculate_tz(&resolver("Europe/Zurich"), None, false).unwrap();

        let again = activity.calculate_tz(&resolver("Asia/Tokyo"), None, false).unwrap();
        assert_eq!(again, ActivityTz::named("Europe/Zurich").unwrap());

        let fresh = activity.calculate_tz(&resolver("Asia/Tokyo"), None, true).unwrap();
        assert_eq!(fresh, ActivityTz::named("Asia/Tokyo").unwrap());
    }

    #[test]
    fn test_calculate_tz_explicit_location() {
        let mut activity = located_activity();
        let resolver = resolver("America/Denver");
        activity
            .calculate_tz(&resolver, Some(Location::new(39.7, -105.0, None)), false)
            .unwrap();
        assert!(resolver.cache().get(39.7, -105.0).is_some());
        assert!(resolver.cache().get(46.95, 7.44).is_none());
    }

    #[test]
    fn test_calculate_tz_fallback_and_failure() {
        let mut activity = Activity::new(at(8, 0, 0), at(9, 0, 0), ActivityType::Gym);
        activity.laps.push(Lap::new(at(8, 0, 0), at(9, 0, 0)));

        let resolver = resolver("UTC");

        let err = activity.calculate_tz(&resolver, None, false).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));

        activity.fallback_tz = Some(ActivityTz::fixed_minutes(-300).unwrap());
        let tz = activity.calculate_tz(&resolver, None, false).unwrap();
        assert_eq!(tz, ActivityTz::fixed_minutes(-300).unwrap());
        assert!(resolver.cache().is_empty());
    }

    #[test]
    fn test_define_tz_attaches_without_moving_wall_clock() {
        let mut activity = located_activity();
        activity.calculate_tz(&resolver("Europe/Zurich"), None, false).unwrap();
        activity.define_tz().unwrap();

        let start = activity.start_time.unwrap();
        assert!(start.is_qualified());
        assert_eq!(start.wall_clock(), at(8, 0, 0));
        assert_eq!(start.offset().unwrap().local_minus_utc(), 7200);
        assert!(activity.flat_waypoints().all(|wp| wp.timestamp.is_qualified()));
        assert!(activity.laps[0].end_time.unwrap().is_qualified());
        assert!(activity.uid().is_some());
    }

    #[test]
    fn test_adjust_tz_moves_wall_clock() {
        let mut activity = Activity::new(
            zoned(0, at(6, 0, 0)),
            zoned(0, at(7, 0, 0)),
            ActivityType::Cycling,
        );
        activity.laps.push(Lap::new(zoned(0, at(6, 0, 0)), zoned(0, at(7, 0, 0))));
        activity.tz = Some(ActivityTz::named("Europe/Zurich").unwrap());

        activity.adjust_tz().unwrap();

        let start = activity.start_time.unwrap();
        assert_eq!(start.wall_clock(), at(8, 0, 0));
        assert_eq!(start, Timestamp::Zoned(zoned(0, at(6, 0, 0))));
        assert_eq!(activity.laps[0].end_time.unwrap().wall_clock(), at(9, 0, 0));
    }

    #[test]
    fn test_define_and_adjust_need_tz() {
        let mut activity = located_activity();
        assert!(matches!(activity.define_tz(), Err(Error::Precursor(_))));
        assert!(matches!(activity.adjust_tz(), Err(Error::Precursor(_))));
    }

    #[test]
    fn test_ensure_tz_picks_define_or_adjust() {
        let mut naive = located_activity();
        naive.ensure_tz(&resolver("Asia/Tokyo"), false).unwrap();
        assert_eq!(naive.start_time.unwrap().wall_clock(), at(8, 0, 0));
        assert_eq!(naive.start_time.unwrap().offset().unwrap().local_minus_utc(), 9 * 3600);

        let mut qualified = located_activity();
        qualified.start_time = Some(zoned(0, at(8, 0, 0)).into());
        qualified.ensure_tz(&resolver("Asia/Tokyo"), false).unwrap();
        assert_eq!(qualified.start_time.unwrap().wall_clock(), at(17, 0, 0));
    }

    #[test]
    fn test_uid_known_digest() {
        let mut activity = Activity::new(at(8, 0, 0), at(9, 0, 0), ActivityType::Running);
        assert_eq!(activity.uid(), None);
        activity.calculate_uid();
        assert_eq!(activity.uid(), Some("3192c8d4d4d7710d4535e0169e32574c"));
    }

    #[test]
    fn test_uid_ignores_subseconds() {
        let mut precise = Activity::new(
            at(8, 0, 0) + chrono::Duration::milliseconds(870),
            at(9, 0, 0),
            ActivityType::Running,
        );
        precise.calculate_uid();
        assert_eq!(precise.uid(), Some("3192c8d4d4d7710d4535e0169e32574c"));
    }

    #[test]
    fn test_uid_same_local_second_across_zones() {
        let mut zurich = Activity::new(zoned(2, at(8, 0, 0)), zoned(2, at(9, 0, 0)), ActivityType::Running);
        zurich.tz = Some(ActivityTz::fixed_minutes(120).unwrap());
        let mut denver = Activity::new(zoned(-6, at(8, 0, 0)), zoned(-6, at(9, 0, 0)), ActivityType::Running);
        denver.tz = Some(ActivityTz::fixed_minutes(-360).unwrap());

        zurich.calculate_uid();
        denver.calculate_uid();

        assert_eq!(zurich.uid(), denver.uid());
    }

    #[test]
    fn test_uid_same_instant_different_zones() {
        let instant = zoned(0, at(8, 0, 0));
        let mut london = Activity::new(instant, instant, ActivityType::Running);
        london.tz = Some(ActivityTz::fixed_minutes(0).unwrap());
        let mut tokyo = Activity::new(instant, instant, ActivityType::Running);
        tokyo.tz = Some(ActivityTz::named("Asia/Tokyo").unwrap());

        london.calculate_uid();
        tokyo.calculate_uid();

        assert_ne!(london.uid(), tokyo.uid());
    }

    #[test]
    fn test_uid_without_start_is_noop() {
        let mut activity = Activity::default();
        activity.calculate_uid();
        assert_eq!(activity.uid(), None);
    }

    #[test]
    fn test_aggregate_lap_stats() {
        let mut activity = located_activity();
        activity.laps[0].stats = StatisticsSet::with_distance(1000.0);
        let mut second = Lap::new(at(9, 0, 0), at(9, 30, 0)).with_stats(StatisticsSet::with_distance(2.5 * 1000.0));
        second.stats[Metric::Elevation].set(StatField::Max, Some(620.0));
        activity.laps.push(second);

        let total = activity.aggregate_lap_stats().unwrap();
        assert_eq!(total[Metric::Distance].value(), Some(3500.0));
        assert_eq!(total[Metric::Elevation].max(), Some(620.0));
    }

    #[test]
    fn test_equality_uses_identity_fields() {
        let a = located_activity();
        let mut b = located_activity();
        b.notes = Some("felt great".into());
        b.stats[Metric::Hr].set(StatField::Average, Some(150.0));
        assert_eq!(a, b);

        b.name = Some("Morning run".into());
        assert_ne!(a, b);
    }

    #[test]
    fn test_waypoint_helpers() {
        let activity = located_activity();
        assert_eq!(activity.count_total_waypoints(), 3);
        assert_eq!(activity.first_located_waypoint().unwrap().timestamp, Timestamp::Naive(at(8, 30, 0)));
    }

    #[test]
    fn test_deserialize_activity() {
        let activity: Activity = serde_json::from_str(
            r#"{
                "start_time": "2024-05-01T08:00:00",
                "end_time": "2024-05-01T09:00:00",
                "type": "MtnBiking",
                "fallback_tz": "Europe/Zurich",
                "stationary": false,
                "laps": [{"start_time": "2024-05-01T08:00:00", "end_time": "2024-05-01T09:00:00"}],
                "uid": "ignored"
            }"#,
        )
        .unwrap();

        assert_eq!(activity.activity_type, ActivityType::MountainBiking);
        assert_eq!(activity.fallback_tz, Some(ActivityTz::named("Europe/Zurich").unwrap()));
        assert_eq!(activity.stationary, Some(false));
        assert_eq!(activity.uid(), None);
        assert!(!activity.private);
    }

    #[test]
    fn test_display() {
        let activity = located_activity();
        assert_eq!(
            activity.to_string(),
            "Activity (Running) Start 2024-05-01 08:00:00 no TZ End 2024-05-01 09:00:00 stat None"
        );
    }
}
