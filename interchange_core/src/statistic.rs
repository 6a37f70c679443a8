//! A single named measurement and the ways two of them combine.
//!
//! Each of the six fields carries a sample count alongside its value. The
//! count is how many observations have been folded into the value so far, and
//! a field is present exactly when its count is non-zero.

use crate::units::Unit;
use crate::Result;
use serde::{Deserialize, Serialize};

/// The value-bearing fields of a [`Statistic`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatField {
    Value,
    Average,
    Min,
    Max,
    Gain,
    Loss,
}

impl StatField {
    pub const ALL: [StatField; 6] = [
        StatField::Value,
        StatField::Average,
        StatField::Min,
        StatField::Max,
        StatField::Gain,
        StatField::Loss,
    ];

    /// Fields that add up across laps
    pub const SUMMABLE: [StatField; 3] = [StatField::Value, StatField::Gain, StatField::Loss];

    fn idx(self) -> usize {
        self as usize
    }
}

/// One measurement (distance, heart rate, ...) in a particular unit
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "StatisticRecord", into = "StatisticRecord")]
pub struct Statistic {
    unit: Unit,
    values: [Option<f64>; 6],
    samples: [u32; 6],
}

impl Statistic {
    /// An empty statistic bound to `unit`
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            values: [None; 6],
            samples: [0; 6],
        }
    }

    /// Builder-style setter, counts the field as one sample
    pub fn with(mut self, field: StatField, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    pub fn with_value(self, value: f64) -> Self {
        self.with(StatField::Value, value)
    }

    pub fn with_average(self, value: f64) -> Self {
        self.with(StatField::Average, value)
    }

    pub fn with_min(self, value: f64) -> Self {
        self.with(StatField::Min, value)
    }

    pub fn with_max(self, value: f64) -> Self {
        self.with(StatField::Max, value)
    }

    pub fn with_gain(self, value: f64) -> Self {
        self.with(StatField::Gain, value)
    }

    pub fn with_loss(self, value: f64) -> Self {
        self.with(StatField::Loss, value)
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn get(&self, field: StatField) -> Option<f64> {
        self.values[field.idx()]
    }

    pub fn value(&self) -> Option<f64> {
        self.get(StatField::Value)
    }

    pub fn average(&self) -> Option<f64> {
        self.get(StatField::Average)
    }

    pub fn min(&self) -> Option<f64> {
        self.get(StatField::Min)
    }

    pub fn max(&self) -> Option<f64> {
        self.get(StatField::Max)
    }

    pub fn gain(&self) -> Option<f64> {
        self.get(StatField::Gain)
    }

    pub fn loss(&self) -> Option<f64> {
        self.get(StatField::Loss)
    }

    /// Number of observations behind a field, 0 when absent
    pub fn samples(&self, field: StatField) -> u32 {
        self.samples[field.idx()]
    }

    /// Assign a field directly. A fresh value counts as a single sample.
    pub fn set(&mut self, field: StatField, value: Option<f64>) {
        self.values[field.idx()] = value;
        self.samples[field.idx()] = u32::from(value.is_some());
    }

    /// Remove a field and its sample count
    pub fn clear(&mut self, field: StatField) {
        self.set(field, None);
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    fn put(&mut self, field: StatField, value: Option<f64>, samples: u32) {
        self.values[field.idx()] = value;
        self.samples[field.idx()] = samples;
    }

    /// A copy of this statistic expressed in `unit`.
    ///
    /// Sample counts are copied, so mutating the result never touches `self`.
    pub fn as_units(&self, unit: Unit) -> Result<Statistic> {
        if unit == self.unit {
            return Ok(self.clone());
        }

        let mut converted = Statistic {
            unit,
            values: [None; 6],
            samples: self.samples,
        };
        for (slot, value) in converted.values.iter_mut().zip(self.values.iter()) {
            if let Some(v) = value {
                *slot = Some(self.unit.convert(*v, unit)?);
            }
        }
        Ok(converted)
    }

    /// Fold another report of the same measurement into this one.
    ///
    /// Absent fields are copied over. Present ones move towards the other value
    /// by `(other - self) / (n_self + 1 / n_other)` and accumulate the other's
    /// sample count. That weighting is deliberately not a plain weighted mean.
    pub fn coalesce_with(&mut self, other: &Statistic) -> Result<()> {
        let other = other.as_units(self.unit)?;

        for field in StatField::ALL {
            let Some(theirs) = other.get(field) else {
                continue;
            };
            // a value assigned without going through set() still counts once
            let their_samples = other.samples(field).max(1);

            match self.get(field) {
                None => self.put(field, Some(theirs), their_samples),
                Some(mine) => {
                    let my_samples = f64::from(self.samples(field));
                    let merged = mine + (theirs - mine) / (my_samples + 1.0 / f64::from(their_samples));
                    let total = self.samples(field) + their_samples;
                    self.put(field, Some(merged), total);
                }
            }
        }

        Ok(())
    }

    /// Accumulate another lap's worth of this measurement.
    ///
    /// Value, gain and loss add up; a sum is a new measurement so its sample
    /// count restarts at 1. Averages can't be summed and are dropped. Min and
    /// max keep the more extreme operand.
    pub fn sum_with(&mut self, other: &Statistic) -> Result<()> {
        let other = other.as_units(self.unit)?;

        for field in StatField::SUMMABLE {
            let Some(theirs) = other.get(field) else {
                continue;
            };
            match self.get(field) {
                Some(mine) => self.put(field, Some(mine + theirs), 1),
                None => self.put(field, Some(theirs), other.samples(field)),
            }
        }

        self.clear(StatField::Average);

        let take_max = match (self.max(), other.max()) {
            (None, _) => true,
            (Some(mine), Some(theirs)) => theirs > mine,
            (Some(_), None) => false,
        };
        if take_max {
            self.put(StatField::Max, other.max(), other.samples(StatField::Max));
        }

        let take_min = match (self.min(), other.min()) {
            (None, _) => true,
            (Some(mine), Some(theirs)) => theirs < mine,
            (Some(_), None) => false,
        };
        if take_min {
            self.put(StatField::Min, other.min(), other.samples(StatField::Min));
        }

        Ok(())
    }

    /// Overwrite with every field the other statistic has. Last writer wins.
    pub fn update(&mut self, other: &Statistic) -> Result<()> {
        let other = other.as_units(self.unit)?;

        for field in StatField::ALL {
            if let Some(theirs) = other.get(field) {
                self.put(field, Some(theirs), other.samples(field));
            }
        }

        Ok(())
    }
}

impl PartialEq for Statistic {
    /// Sample counts don't take part in equality
    fn eq(&self, other: &Self) -> bool {
        self.unit == other.unit && self.values == other.values
    }
}

/// Serialized shape of a statistic; sample counts restart at 1 on load
#[derive(Clone, Debug, Serialize, Deserialize)]
struct StatisticRecord {
    unit: Unit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gain: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loss: Option<f64>,
}

impl From<StatisticRecord> for Statistic {
    fn from(record: StatisticRecord) -> Self {
        let mut stat = Statistic::new(record.unit);
        stat.set(StatField::Value, record.value);
        stat.set(StatField::Average, record.average);
        stat.set(StatField::Min, record.min);
        stat.set(StatField::Max, record.max);
        stat.set(StatField::Gain, record.gain);
        stat.set(StatField::Loss, record.loss);
        stat
    }
}

impl From<Statistic> for StatisticRecord {
    fn from(stat: Statistic) -> Self {
        Self {
            unit: stat.unit,
            value: stat.value(),
            average: stat.average(),
            min: stat.min(),
            max: stat.max(),
            gain: stat.gain(),
            loss: stat.loss(),
        }
    }
}
