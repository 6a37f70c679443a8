//! Activity categories and the specificity hierarchy between them.
//!
//! Some categories are refinements of others: a mountain bike ride is still
//! cycling, a hike is a kind of walk, which is a kind of run as far as most
//! services care. When sources disagree about a type we prefer the most
//! specific member of such a family.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of an activity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    Running,
    Cycling,
    #[serde(rename = "MtnBiking")]
    MountainBiking,
    Walking,
    Hiking,
    DownhillSkiing,
    #[serde(rename = "XCSkiing")]
    CrossCountrySkiing,
    Snowboarding,
    Skating,
    Swimming,
    Wheelchair,
    Rowing,
    Elliptical,
    Gym,
    #[default]
    Other,
}

/// Groups of types ordered from least to most specific
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    Cycling,
    OnFoot,
}

impl Family {
    /// Members, least specific first
    pub fn members(self) -> &'static [ActivityType] {
        match self {
            Family::Cycling => &[ActivityType::Cycling, ActivityType::MountainBiking],
            Family::OnFoot => &[
                ActivityType::Running,
                ActivityType::Walking,
                ActivityType::Hiking,
            ],
        }
    }
}

const FAMILIES: [Family; 2] = [Family::Cycling, Family::OnFoot];

impl ActivityType {
    pub const ALL: [ActivityType; 15] = [
        ActivityType::Running,
        ActivityType::Cycling,
        ActivityType::MountainBiking,
        ActivityType::Walking,
        ActivityType::Hiking,
        ActivityType::DownhillSkiing,
        ActivityType::CrossCountrySkiing,
        ActivityType::Snowboarding,
        ActivityType::Skating,
        ActivityType::Swimming,
        ActivityType::Wheelchair,
        ActivityType::Rowing,
        ActivityType::Elliptical,
        ActivityType::Gym,
        ActivityType::Other,
    ];

    /// Short name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Running => "Running",
            ActivityType::Cycling => "Cycling",
            ActivityType::MountainBiking => "MtnBiking",
            ActivityType::Walking => "Walking",
            ActivityType::Hiking => "Hiking",
            ActivityType::DownhillSkiing => "DownhillSkiing",
            ActivityType::CrossCountrySkiing => "XCSkiing",
            ActivityType::Snowboarding => "Snowboarding",
            ActivityType::Skating => "Skating",
            ActivityType::Swimming => "Swimming",
            ActivityType::Wheelchair => "Wheelchair",
            ActivityType::Rowing => "Rowing",
            ActivityType::Elliptical => "Elliptical",
            ActivityType::Gym => "Gym",
            ActivityType::Other => "Other",
        }
    }

    /// The family this type belongs to and its rank there (higher is more specific)
    pub fn family(self) -> Option<(Family, usize)> {
        FAMILIES.into_iter().find_map(|family| {
            family
                .members()
                .iter()
                .position(|t| *t == self)
                .map(|rank| (family, rank))
        })
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ActivityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s) || format!("{:?}", t).eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Parse(format!("Unknown activity type '{}'", s)))
    }
}

/// The single family containing every given type, if there is one
fn common_family(types: &[ActivityType]) -> Option<Family> {
    FAMILIES
        .into_iter()
        .find(|family| types.iter().all(|t| family.members().contains(t)))
}

/// Choose the most specific of several reported types.
///
/// `Other` entries carry no information and are dropped; nothing left means
/// `Other`. When everything left sits in one family the highest-ranked member
/// wins. Otherwise the first remaining type is returned as-is.
pub fn pick_most_specific(types: &[ActivityType]) -> ActivityType {
    let known: Vec<ActivityType> = types
        .iter()
        .copied()
        .filter(|t| *t != ActivityType::Other)
        .collect();

    let Some(&first) = known.first() else {
        return ActivityType::Other;
    };

    if common_family(&known).is_none() {
        return first;
    }

    known
        .iter()
        .copied()
        .filter_map(|t| t.family().map(|(_, rank)| (rank, t)))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, t)| t)
        .unwrap_or(first)
}

/// Whether every type is a variation of the same kind of activity
///
/// An empty list trivially qualifies.
pub fn are_variants(types: &[ActivityType]) -> bool {
    common_family(types).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActivityType::*;

    #[test]
    fn test_single_type_is_kept() {
        assert_eq!(pick_most_specific(&[Cycling]), Cycling);
        assert_eq!(pick_most_specific(&[Swimming]), Swimming);
    }

    #[test]
    fn test_most_specific_in_family() {
        assert_eq!(pick_most_specific(&[Cycling, MountainBiking]), MountainBiking);
        assert_eq!(pick_most_specific(&[MountainBiking, Cycling]), MountainBiking);
        assert_eq!(pick_most_specific(&[Walking, Running, Hiking, Running]), Hiking);
    }

    #[test]
    fn test_mixed_families_fall_back_to_first() {
        assert_eq!(pick_most_specific(&[Cycling, Running]), Cycling);
        assert_eq!(pick_most_specific(&[Hiking, MountainBiking]), Hiking);
        assert_eq!(pick_most_specific(&[Rowing, Walking]), Rowing);
    }

    #[test]
    fn test_other_is_ignored() {
        assert_eq!(pick_most_specific(&[]), Other);
        assert_eq!(pick_most_specific(&[Other, Other]), Other);
        assert_eq!(pick_most_specific(&[Other, Cycling, MountainBiking]), MountainBiking);
    }

    #[test]
    fn test_are_variants() {
        assert!(are_variants(&[Running, Hiking]));
        assert!(are_variants(&[MountainBiking]));
        assert!(are_variants(&[]));
        assert!(!are_variants(&[Running, Cycling]));
        assert!(!are_variants(&[Gym]));
        assert!(!are_variants(&[Running, Other]));
    }

    #[test]
    fn test_family_rank() {
        assert_eq!(Hiking.family(), Some((Family::OnFoot, 2)));
        assert_eq!(Cycling.family(), Some((Family::Cycling, 0)));
        assert_eq!(Elliptical.family(), None);
    }

    #[test]
    fn test_names() {
        assert_eq!("MtnBiking".parse::<ActivityType>().unwrap(), MountainBiking);
        assert_eq!("mountainbiking".parse::<ActivityType>().unwrap(), MountainBiking);
        assert_eq!("xcskiing".parse::<ActivityType>().unwrap(), CrossCountrySkiing);
        assert!("Quidditch".parse::<ActivityType>().is_err());
        assert_eq!(serde_json::to_string(&CrossCountrySkiing).unwrap(), "\"XCSkiing\"");
    }
}
