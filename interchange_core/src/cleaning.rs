//! Scrubbing of implausible values that sources occasionally report.
//!
//! Unlike the sanity checks, cleaning repairs in place: out-of-range statistic
//! fields are dropped and negative waypoint readings are clamped to zero.

use crate::activity::Activity;
use crate::statistic::StatField;
use crate::statistics::{StatisticsSet, METRICS};
use crate::types::Waypoint;
use crate::Result;

/// Fields checked against a metric's valid range. Gain and loss are left alone.
const CHECKED_FIELDS: [StatField; 4] = [
    StatField::Average,
    StatField::Max,
    StatField::Min,
    StatField::Value,
];

fn clean_set(set: &mut StatisticsSet) -> Result<()> {
    for spec in &METRICS {
        let Some(range) = spec.valid_range else {
            continue;
        };

        let stat = &mut set[spec.metric];
        let converted = stat.as_units(range.unit)?;
        for field in CHECKED_FIELDS {
            let Some(value) = converted.get(field) else {
                continue;
            };
            if !range.contains(value) {
                tracing::debug!(
                    "Dropping {} {:?} of {} {} (allowed {}..={})",
                    spec.name,
                    field,
                    value,
                    range.unit,
                    range.min,
                    range.max
                );
                stat.clear(field);
            }
        }
    }
    Ok(())
}

fn clamp_negative(reading: &mut Option<f64>) {
    if let Some(v) = reading.as_mut() {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

fn clean_waypoint(wp: &mut Waypoint) {
    for reading in [
        &mut wp.distance,
        &mut wp.speed,
        &mut wp.cadence,
        &mut wp.run_cadence,
        &mut wp.power,
        &mut wp.calories,
        &mut wp.hr,
    ] {
        clamp_negative(reading);
    }
}

impl Activity {
    /// Drop statistic fields outside each metric's plausible range, for the
    /// activity and every lap
    pub fn clean_stats(&mut self) -> Result<()> {
        clean_set(&mut self.stats)?;
        for lap in &mut self.laps {
            clean_set(&mut lap.stats)?;
        }
        Ok(())
    }

    /// Clamp negative sensor readings on every waypoint to zero
    pub fn clean_waypoints(&mut self) {
        self.flat_waypoints_mut().for_each(clean_waypoint);
    }
}
