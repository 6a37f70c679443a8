//! Physical units and the pairwise conversion graph.
//!
//! Units are nodes, conversion edges connect pairs of them. Converting between
//! two units walks the first path a depth-first search finds through the edge
//! table, applying each edge forwards or backwards as it goes.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Units
// ============================================================================

/// Unit a statistic or reading is expressed in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "m")]
    Meters,
    #[serde(rename = "km")]
    Kilometers,
    #[serde(rename = "f")]
    Feet,
    #[serde(rename = "yd")]
    Yards,
    #[serde(rename = "mi")]
    Miles,
    #[serde(rename = "ºC")]
    DegreesCelsius,
    #[serde(rename = "ºF")]
    DegreesFahrenheit,
    #[serde(rename = "km/h")]
    KilometersPerHour,
    /// Garmin Connect reports some speeds in these
    #[serde(rename = "hm/h")]
    HectometersPerHour,
    #[serde(rename = "m/s")]
    MetersPerSecond,
    #[serde(rename = "mph")]
    MilesPerHour,
    #[serde(rename = "hydph")]
    HundredYardsPerHour,
    #[serde(rename = "BPM")]
    BeatsPerMinute,
    #[serde(rename = "RPM")]
    RevolutionsPerMinute,
    #[serde(rename = "SPM")]
    StepsPerMinute,
    /// Steps per minute counted once per stride pair
    #[serde(rename = "2SPM")]
    DoubledStepsPerMinute,
    #[serde(rename = "strides")]
    Strides,
    #[serde(rename = "kcal")]
    Kilocalories,
    #[serde(rename = "kj")]
    Kilojoules,
    #[serde(rename = "W")]
    Watts,
}

impl Unit {
    pub const ALL: [Unit; 22] = [
        Unit::Seconds,
        Unit::Milliseconds,
        Unit::Meters,
        Unit::Kilometers,
        Unit::Feet,
        Unit::Yards,
        Unit::Miles,
        Unit::DegreesCelsius,
        Unit::DegreesFahrenheit,
        Unit::KilometersPerHour,
        Unit::HectometersPerHour,
        Unit::MetersPerSecond,
        Unit::MilesPerHour,
        Unit::HundredYardsPerHour,
        Unit::BeatsPerMinute,
        Unit::RevolutionsPerMinute,
        Unit::StepsPerMinute,
        Unit::DoubledStepsPerMinute,
        Unit::Strides,
        Unit::Kilocalories,
        Unit::Kilojoules,
        Unit::Watts,
    ];

    /// Short symbol, also used as the serialized form
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Seconds => "s",
            Unit::Milliseconds => "ms",
            Unit::Meters => "m",
            Unit::Kilometers => "km",
            Unit::Feet => "f",
            Unit::Yards => "yd",
            Unit::Miles => "mi",
            Unit::DegreesCelsius => "ºC",
            Unit::DegreesFahrenheit => "ºF",
            Unit::KilometersPerHour => "km/h",
            Unit::HectometersPerHour => "hm/h",
            Unit::MetersPerSecond => "m/s",
            Unit::MilesPerHour => "mph",
            Unit::HundredYardsPerHour => "hydph",
            Unit::BeatsPerMinute => "BPM",
            Unit::RevolutionsPerMinute => "RPM",
            Unit::StepsPerMinute => "SPM",
            Unit::DoubledStepsPerMinute => "2SPM",
            Unit::Strides => "strides",
            Unit::Kilocalories => "kcal",
            Unit::Kilojoules => "kj",
            Unit::Watts => "W",
        }
    }

    /// Convert `value` from this unit into `target`
    pub fn convert(self, value: f64, target: Unit) -> Result<f64> {
        convert(value, self, target)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = Error;

    /// Accepts the symbol (`km/h`) or the variant name, case-insensitively (`kilometersperhour`)
    fn from_str(s: &str) -> Result<Self> {
        Unit::ALL
            .iter()
            .copied()
            .find(|u| u.symbol() == s || format!("{:?}", u).eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Parse(format!("Unknown unit '{}'", s)))
    }
}

// ============================================================================
// Conversion edges
// ============================================================================

type Transform = fn(f64) -> f64;

/// How an edge maps a value from its `from` unit to its `to` unit
#[derive(Clone, Copy, Debug)]
enum Conversion {
    /// Multiply walking forwards, divide walking backwards
    Factor(f64),
    /// Arbitrary mapping; backwards traversal needs an inverse
    Transform {
        forward: Transform,
        inverse: Option<Transform>,
    },
}

#[derive(Clone, Copy, Debug)]
struct Edge {
    from: Unit,
    to: Unit,
    conversion: Conversion,
}

impl Edge {
    const fn factor(from: Unit, to: Unit, factor: f64) -> Self {
        Self {
            from,
            to,
            conversion: Conversion::Factor(factor),
        }
    }

    fn touches(&self, unit: Unit) -> bool {
        self.from == unit || self.to == unit
    }

    fn opposite(&self, unit: Unit) -> Unit {
        if self.to == unit {
            self.from
        } else {
            self.to
        }
    }

    /// Walk the edge starting at `at`, returning the converted value and the unit reached
    fn traverse(&self, value: f64, at: Unit) -> Option<(f64, Unit)> {
        if at == self.from {
            let converted = match self.conversion {
                Conversion::Factor(factor) => value * factor,
                Conversion::Transform { forward, .. } => forward(value),
            };
            Some((converted, self.to))
        } else {
            let converted = match self.conversion {
                Conversion::Factor(factor) => value / factor,
                Conversion::Transform { inverse, .. } => inverse?(value),
            };
            Some((converted, self.from))
        }
    }
}

fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Edge table. Search order follows table order, so don't reorder.
static EDGES: [Edge; 12] = [
    Edge::factor(Unit::KilometersPerHour, Unit::HectometersPerHour, 10.0),
    Edge::factor(Unit::KilometersPerHour, Unit::MilesPerHour, 0.621371),
    Edge::factor(Unit::MilesPerHour, Unit::HundredYardsPerHour, 17.6),
    Edge::factor(Unit::MetersPerSecond, Unit::KilometersPerHour, 3.6),
    Edge {
        from: Unit::DegreesCelsius,
        to: Unit::DegreesFahrenheit,
        conversion: Conversion::Transform {
            forward: celsius_to_fahrenheit,
            inverse: Some(fahrenheit_to_celsius),
        },
    },
    Edge::factor(Unit::Kilometers, Unit::Meters, 1000.0),
    Edge::factor(Unit::Meters, Unit::Feet, 3.281),
    Edge::factor(Unit::Meters, Unit::Yards, 1.09361),
    Edge::factor(Unit::Miles, Unit::Feet, 5280.0),
    Edge::factor(Unit::Kilocalories, Unit::Kilojoules, 4.184),
    Edge::factor(Unit::StepsPerMinute, Unit::DoubledStepsPerMinute, 2.0),
    Edge::factor(Unit::Seconds, Unit::Milliseconds, 1000.0),
];

/// Edge indices touching each unit, in table order
static ADJACENCY: Lazy<HashMap<Unit, Vec<usize>>> = Lazy::new(|| {
    let mut adjacency: HashMap<Unit, Vec<usize>> = HashMap::new();
    for (idx, edge) in EDGES.iter().enumerate() {
        adjacency.entry(edge.from).or_default().push(idx);
        adjacency.entry(edge.to).or_default().push(idx);
    }
    adjacency
});

/// Depth-first search for a chain of edges from `unit` to `target`.
///
/// An edge already on the current path is never reused. The first complete
/// path wins; it isn't necessarily the shortest.
fn search(unit: Unit, target: Unit, path: &mut Vec<usize>) -> bool {
    let Some(candidates) = ADJACENCY.get(&unit) else {
        return false;
    };

    for &idx in candidates {
        if path.contains(&idx) {
            continue;
        }
        let edge = &EDGES[idx];
        path.push(idx);
        if edge.touches(target) || search(edge.opposite(unit), target, path) {
            return true;
        }
        path.pop();
    }

    false
}

fn find_path(from: Unit, to: Unit) -> Option<Vec<&'static Edge>> {
    let mut path = Vec::new();
    search(from, to, &mut path).then(|| path.into_iter().map(|idx| &EDGES[idx]).collect())
}

fn walk(value: f64, from: Unit, to: Unit, path: &[&Edge]) -> Result<f64> {
    let mut value = value;
    let mut at = from;
    for edge in path {
        let (converted, reached) = edge.traverse(value, at).ok_or_else(|| Error::Conversion {
            from,
            to,
            reason: format!("no inverse transform from {} to {}", edge.to, edge.from),
        })?;
        value = converted;
        at = reached;
    }
    Ok(value)
}

/// Convert a value between two units
pub fn convert(value: f64, from: Unit, to: Unit) -> Result<f64> {
    if from == to {
        return Ok(value);
    }

    let path = find_path(from, to).ok_or_else(|| Error::Conversion {
        from,
        to,
        reason: "no conversion path".into(),
    })?;

    tracing::trace!("Converting {} -> {} via {} edge(s)", from, to, path.len());
    walk(value, from, to, &path)
}

/// The unit sequence a conversion would pass through, endpoints included
///
/// Returns `None` when the units aren't connected.
pub fn conversion_route(from: Unit, to: Unit) -> Option<Vec<Unit>> {
    if from == to {
        return Some(vec![from]);
    }
    let path = find_path(from, to)?;
    let mut route = vec![from];
    for edge in path {
        let last = route[route.len() - 1];
        route.push(edge.opposite(last));
    }
    Some(route)
}
