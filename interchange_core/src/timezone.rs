//! Timezone descriptors and the cache/lookup collaborators used to resolve them.
//!
//! Resolving a timezone from coordinates is somebody else's job: callers plug
//! in a [`TimezoneLookup`] (usually a geocoding service) and a
//! [`TimezoneCache`] in front of it. Both exchange [`TzValue`]s, which are
//! either an IANA zone name or a fixed offset in minutes.

use crate::{Error, Result};
use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

/// Timezone as stored in the cache or returned by a lookup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TzValue {
    /// IANA name, e.g. `Europe/Zurich`
    Named(String),
    /// Fixed offset east of UTC, in minutes
    OffsetMinutes(i32),
}

impl FromStr for TzValue {
    type Err = Error;

    /// Integers are offsets in minutes, anything else is taken as a zone name
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Parse("Empty timezone".into()));
        }
        Ok(s.parse::<i32>()
            .map(TzValue::OffsetMinutes)
            .unwrap_or_else(|_| TzValue::Named(s.to_string())))
    }
}

/// A resolved timezone an activity's timestamps can be placed in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TzValue", into = "TzValue")]
pub enum ActivityTz {
    Named(Tz),
    Fixed(FixedOffset),
}

impl TryFrom<TzValue> for ActivityTz {
    type Error = Error;

    fn try_from(value: TzValue) -> Result<Self> {
        match value {
            TzValue::Named(name) => name
                .parse::<Tz>()
                .map(ActivityTz::Named)
                .map_err(|_| Error::Resolution(format!("Unknown timezone '{}'", name))),
            TzValue::OffsetMinutes(minutes) => minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .map(ActivityTz::Fixed)
                .ok_or_else(|| Error::Resolution(format!("Invalid UTC offset of {} minutes", minutes))),
        }
    }
}

impl From<ActivityTz> for TzValue {
    fn from(tz: ActivityTz) -> Self {
        match tz {
            ActivityTz::Named(tz) => TzValue::Named(tz.name().to_string()),
            ActivityTz::Fixed(offset) => TzValue::OffsetMinutes(offset.local_minus_utc() / 60),
        }
    }
}

impl ActivityTz {
    /// A zone at a fixed offset from UTC
    pub fn fixed_minutes(minutes: i32) -> Result<Self> {
        Self::try_from(TzValue::OffsetMinutes(minutes))
    }

    /// A named IANA zone
    pub fn named(name: &str) -> Result<Self> {
        Self::try_from(TzValue::Named(name.to_string()))
    }

    /// Attach this zone to a wall-clock time without changing the reading.
    ///
    /// Readings that occur twice (clocks going back) take the later, standard
    /// time offset. Readings that never occur (clocks going forward) take the
    /// offset in force before the jump.
    pub fn localize(&self, naive: &NaiveDateTime) -> DateTime<FixedOffset> {
        match self {
            ActivityTz::Named(tz) => localize_in(tz, naive),
            ActivityTz::Fixed(offset) => localize_in(offset, naive),
        }
    }

    /// The same instant, read in this zone
    pub fn convert(&self, dt: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        match self {
            ActivityTz::Named(tz) => dt.with_timezone(tz).fixed_offset(),
            ActivityTz::Fixed(offset) => dt.with_timezone(offset),
        }
    }
}

fn localize_in<Z: TimeZone>(zone: &Z, naive: &NaiveDateTime) -> DateTime<FixedOffset> {
    match zone.from_local_datetime(naive) {
        LocalResult::Single(dt) => dt.fixed_offset(),
        LocalResult::Ambiguous(_, later) => later.fixed_offset(),
        LocalResult::None => {
            let before = zone.offset_from_utc_datetime(&(*naive - Duration::days(1))).fix();
            let utc = *naive - Duration::seconds(i64::from(before.local_minus_utc()));
            DateTime::from_naive_utc_and_offset(utc, before)
        }
    }
}

impl fmt::Display for ActivityTz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityTz::Named(tz) => f.write_str(tz.name()),
            ActivityTz::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Coordinate-keyed store of previous lookups.
///
/// Keys are exact coordinates. Storing the same key twice is harmless.
pub trait TimezoneCache {
    fn get(&self, latitude: f64, longitude: f64) -> Option<TzValue>;
    fn put(&self, latitude: f64, longitude: f64, value: TzValue);
}

impl<T: TimezoneCache + ?Sized> TimezoneCache for &T {
    fn get(&self, latitude: f64, longitude: f64) -> Option<TzValue> {
        (**self).get(latitude, longitude)
    }

    fn put(&self, latitude: f64, longitude: f64, value: TzValue) {
        (**self).put(latitude, longitude, value)
    }
}

/// Source of truth for which timezone a coordinate falls in
pub trait TimezoneLookup {
    fn lookup(&self, latitude: f64, longitude: f64) -> Result<TzValue>;
}

impl<F> TimezoneLookup for F
where
    F: Fn(f64, f64) -> Result<TzValue>,
{
    fn lookup(&self, latitude: f64, longitude: f64) -> Result<TzValue> {
        self(latitude, longitude)
    }
}

/// In-process cache keyed by the exact bit patterns of the coordinates
#[derive(Debug, Default)]
pub struct MemoryTzCache {
    entries: Mutex<HashMap<(u64, u64), TzValue>>,
}

impl MemoryTzCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TimezoneCache for MemoryTzCache {
    fn get(&self, latitude: f64, longitude: f64) -> Option<TzValue> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(latitude.to_bits(), longitude.to_bits()))
            .cloned()
    }

    fn put(&self, latitude: f64, longitude: f64, value: TzValue) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((latitude.to_bits(), longitude.to_bits()), value);
    }
}

/// Lookup that answers every coordinate with the same zone
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedLookup(pub TzValue);

impl TimezoneLookup for FixedLookup {
    fn lookup(&self, _latitude: f64, _longitude: f64) -> Result<TzValue> {
        Ok(self.0.clone())
    }
}

/// Cache-first timezone resolution
#[derive(Debug)]
pub struct TimezoneResolver<C, L> {
    cache: C,
    lookup: L,
}

impl<C: TimezoneCache, L: TimezoneLookup> TimezoneResolver<C, L> {
    pub fn new(cache: C, lookup: L) -> Self {
        Self { cache, lookup }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Timezone at a coordinate, consulting the lookup only on a cache miss
    pub fn resolve(&self, latitude: f64, longitude: f64) -> Result<ActivityTz> {
        let value = match self.cache.get(latitude, longitude) {
            Some(value) => {
                tracing::debug!("Timezone cache hit for ({}, {})", latitude, longitude);
                value
            }
            None => {
                tracing::debug!("Timezone cache miss for ({}, {}), looking up", latitude, longitude);
                let value = self.lookup.lookup(latitude, longitude)?;
                self.cache.put(latitude, longitude, value.clone());
                value
            }
        };
        ActivityTz::try_from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_tz_value_shapes() {
        let named: TzValue = serde_json::from_str("\"America/Denver\"").unwrap();
        assert_eq!(named, TzValue::Named("America/Denver".into()));
        let offset: TzValue = serde_json::from_str("-300").unwrap();
        assert_eq!(offset, TzValue::OffsetMinutes(-300));

        assert_eq!("-300".parse::<TzValue>().unwrap(), TzValue::OffsetMinutes(-300));
        assert_eq!(" Asia/Tokyo ".parse::<TzValue>().unwrap(), TzValue::Named("Asia/Tokyo".into()));
        assert!("".parse::<TzValue>().is_err());
    }

    #[test]
    fn test_activity_tz_from_value() {
        let fixed = ActivityTz::fixed_minutes(330).unwrap();
        assert_eq!(fixed, ActivityTz::Fixed(FixedOffset::east_opt(330 * 60).unwrap()));
        assert_eq!(TzValue::from(fixed), TzValue::OffsetMinutes(330));

        assert!(matches!(ActivityTz::named("Mars/Olympus_Mons"), Err(Error::Resolution(_))));
        assert!(matches!(ActivityTz::fixed_minutes(24 * 60), Err(Error::Resolution(_))));
        assert_eq!(ActivityTz::named("Europe/Zurich").unwrap().to_string(), "Europe/Zurich");
    }

    #[test]
    fn test_localize_keeps_wall_clock() {
        let zurich = ActivityTz::named("Europe/Zurich").unwrap();
        let summer = zurich.localize(&at(2024, 7, 1, 9, 30));
        assert_eq!(summer.naive_local(), at(2024, 7, 1, 9, 30));
        assert_eq!(summer.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_localize_transitions() {
        let london = ActivityTz::named("Europe/London").unwrap();

        // 01:30 happens twice on 2024-10-27; the standard-time reading wins
        let repeated = london.localize(&at(2024, 10, 27, 1, 30));
        assert_eq!(repeated.offset().local_minus_utc(), 0);

        // 01:30 never happens on 2024-03-31; keep the pre-jump offset
        let skipped = london.localize(&at(2024, 3, 31, 1, 30));
        assert_eq!(skipped.naive_local(), at(2024, 3, 31, 1, 30));
        assert_eq!(skipped.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_convert_preserves_instant() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let dt = utc.from_local_datetime(&at(2024, 1, 15, 12, 0)).unwrap();
        let tokyo = ActivityTz::named("Asia/Tokyo").unwrap().convert(&dt);
        assert_eq!(tokyo, dt);
        assert_eq!(tokyo.naive_local(), at(2024, 1, 15, 21, 0));
    }

    #[test]
    fn test_resolver_fills_cache_once() {
        let calls = Cell::new(0);
        let lookup = |_lat: f64, _lon: f64| -> Result<TzValue> {
            calls.set(calls.get() + 1);
            Ok(TzValue::Named("Europe/Oslo".into()))
        };
        let cache = MemoryTzCache::new();
        let resolver = TimezoneResolver::new(&cache, lookup);

        let first = resolver.resolve(59.91, 10.75).unwrap();
        let second = resolver.resolve(59.91, 10.75).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(59.91, 10.75), Some(TzValue::Named("Europe/Oslo".into())));
    }

    #[test]
    fn test_resolver_uses_cached_offset() {
        let cache = MemoryTzCache::new();
        cache.put(10.0, 20.0, TzValue::OffsetMinutes(-180));
        let resolver = TimezoneResolver::new(&cache, |_: f64, _: f64| -> Result<TzValue> {
            Err(Error::Resolution("lookup should not run".into()))
        });

        assert_eq!(
            resolver.resolve(10.0, 20.0).unwrap(),
            ActivityTz::Fixed(FixedOffset::west_opt(3 * 3600).unwrap())
        );
    }

    #[test]
    fn test_lookup_errors_propagate() {
        let resolver = TimezoneResolver::new(MemoryTzCache::new(), |_: f64, _: f64| -> Result<TzValue> {
            Err(Error::Resolution("service down".into()))
        });
        assert!(resolver.resolve(1.0, 1.0).is_err());
        assert!(resolver.cache().is_empty());
    }
}
