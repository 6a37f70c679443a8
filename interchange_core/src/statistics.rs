//! The fixed set of statistics attached to an activity or a lap.

use crate::statistic::Statistic;
use crate::units::Unit;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Names of the statistics every set carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    Distance,
    TimerTime,
    MovingTime,
    Energy,
    Speed,
    Elevation,
    #[serde(rename = "HR")]
    Hr,
    Cadence,
    RunCadence,
    Strides,
    Temperature,
    Power,
}

/// Inclusive range a statistic's values must fall in, after conversion to `unit`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValidRange {
    pub unit: Unit,
    pub min: f64,
    pub max: f64,
}

impl ValidRange {
    const fn new(unit: Unit, min: f64, max: f64) -> Self {
        Self { unit, min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Static description of a metric
#[derive(Clone, Copy, Debug)]
pub struct MetricSpec {
    pub metric: Metric,
    pub name: &'static str,
    pub default_unit: Unit,
    /// Plausible values; `None` means the metric is never cleaned
    pub valid_range: Option<ValidRange>,
}

/// Metric table, indexed by `Metric as usize`.
///
/// Upper limits mostly follow what the FIT format can carry.
pub static METRICS: [MetricSpec; 12] = [
    MetricSpec {
        metric: Metric::Distance,
        name: "Distance",
        default_unit: Unit::Meters,
        valid_range: Some(ValidRange::new(Unit::Kilometers, 0.0, 1000.0)),
    },
    MetricSpec {
        metric: Metric::TimerTime,
        name: "TimerTime",
        default_unit: Unit::Seconds,
        valid_range: None,
    },
    MetricSpec {
        metric: Metric::MovingTime,
        name: "MovingTime",
        default_unit: Unit::Seconds,
        valid_range: None,
    },
    MetricSpec {
        metric: Metric::Energy,
        name: "Energy",
        default_unit: Unit::Kilocalories,
        valid_range: Some(ValidRange::new(Unit::Kilocalories, 1.0, 65535.0)),
    },
    MetricSpec {
        metric: Metric::Speed,
        name: "Speed",
        default_unit: Unit::KilometersPerHour,
        valid_range: Some(ValidRange::new(Unit::KilometersPerHour, 0.0, 150.0)),
    },
    MetricSpec {
        metric: Metric::Elevation,
        name: "Elevation",
        default_unit: Unit::Meters,
        // Everest is fine, the Dead Sea shore is about as low as it goes
        valid_range: Some(ValidRange::new(Unit::Meters, -500.0, 8850.0)),
    },
    MetricSpec {
        metric: Metric::Hr,
        name: "HR",
        default_unit: Unit::BeatsPerMinute,
        valid_range: Some(ValidRange::new(Unit::BeatsPerMinute, 15.0, 300.0)),
    },
    MetricSpec {
        metric: Metric::Cadence,
        name: "Cadence",
        default_unit: Unit::RevolutionsPerMinute,
        valid_range: Some(ValidRange::new(Unit::RevolutionsPerMinute, 0.0, 255.0)),
    },
    MetricSpec {
        metric: Metric::RunCadence,
        name: "RunCadence",
        default_unit: Unit::StepsPerMinute,
        valid_range: Some(ValidRange::new(Unit::StepsPerMinute, 0.0, 255.0)),
    },
    MetricSpec {
        metric: Metric::Strides,
        name: "Strides",
        default_unit: Unit::Strides,
        valid_range: Some(ValidRange::new(Unit::Strides, 1.0, 9_999_999.0)),
    },
    MetricSpec {
        metric: Metric::Temperature,
        name: "Temperature",
        default_unit: Unit::DegreesCelsius,
        valid_range: Some(ValidRange::new(Unit::DegreesCelsius, -62.0, 50.0)),
    },
    MetricSpec {
        metric: Metric::Power,
        name: "Power",
        default_unit: Unit::Watts,
        valid_range: Some(ValidRange::new(Unit::Watts, 0.0, 5000.0)),
    },
];

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::Distance,
        Metric::TimerTime,
        Metric::MovingTime,
        Metric::Energy,
        Metric::Speed,
        Metric::Elevation,
        Metric::Hr,
        Metric::Cadence,
        Metric::RunCadence,
        Metric::Strides,
        Metric::Temperature,
        Metric::Power,
    ];

    pub fn spec(self) -> &'static MetricSpec {
        &METRICS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn default_unit(self) -> Unit {
        self.spec().default_unit
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One statistic per [`Metric`], each starting empty in the metric's default unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Metric, Statistic>", into = "BTreeMap<Metric, Statistic>")]
pub struct StatisticsSet {
    stats: [Statistic; 12],
}

impl Default for StatisticsSet {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsSet {
    pub fn new() -> Self {
        Self {
            stats: std::array::from_fn(|i| Statistic::new(METRICS[i].default_unit)),
        }
    }

    /// A set holding only a total distance in meters
    pub fn with_distance(meters: f64) -> Self {
        let mut set = Self::new();
        set[Metric::Distance].set(crate::StatField::Value, Some(meters));
        set
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &Statistic)> {
        Metric::ALL.into_iter().zip(self.stats.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Metric, &mut Statistic)> {
        Metric::ALL.into_iter().zip(self.stats.iter_mut())
    }

    /// Replace a statistic wholesale, unit included
    pub fn replace(&mut self, metric: Metric, stat: Statistic) -> Statistic {
        std::mem::replace(&mut self.stats[metric as usize], stat)
    }

    /// [`Statistic::coalesce_with`] for every metric
    pub fn coalesce_with(&mut self, other: &StatisticsSet) -> Result<()> {
        for (mine, theirs) in self.stats.iter_mut().zip(other.stats.iter()) {
            mine.coalesce_with(theirs)?;
        }
        Ok(())
    }

    /// [`Statistic::sum_with`] for every metric
    pub fn sum_with(&mut self, other: &StatisticsSet) -> Result<()> {
        for (mine, theirs) in self.stats.iter_mut().zip(other.stats.iter()) {
            mine.sum_with(theirs)?;
        }
        Ok(())
    }

    /// [`Statistic::update`] for every metric
    pub fn update(&mut self, other: &StatisticsSet) -> Result<()> {
        for (mine, theirs) in self.stats.iter_mut().zip(other.stats.iter()) {
            mine.update(theirs)?;
        }
        Ok(())
    }
}

impl Index<Metric> for StatisticsSet {
    type Output = Statistic;

    fn index(&self, metric: Metric) -> &Statistic {
        &self.stats[metric as usize]
    }
}

impl IndexMut<Metric> for StatisticsSet {
    fn index_mut(&mut self, metric: Metric) -> &mut Statistic {
        &mut self.stats[metric as usize]
    }
}

impl From<BTreeMap<Metric, Statistic>> for StatisticsSet {
    fn from(map: BTreeMap<Metric, Statistic>) -> Self {
        let mut set = Self::new();
        for (metric, stat) in map {
            set.replace(metric, stat);
        }
        set
    }
}

impl From<StatisticsSet> for BTreeMap<Metric, Statistic> {
    fn from(set: StatisticsSet) -> Self {
        Metric::ALL
            .into_iter()
            .zip(set.stats)
            .filter(|(_, stat)| !stat.is_empty())
            .collect()
    }
}
