#![forbid(unsafe_code)]

//! Canonical activity model shared by every fitness service adapter.
//!
//! This crate provides:
//! - Units and the conversion graph between them
//! - Statistics and the algebra for merging them
//! - Activity types, laps, waypoints and locations
//! - Timezone normalization and content-derived activity UIDs
//! - Sanity validation and cleaning of implausible data

pub mod types;
pub mod error;
pub mod units;
pub mod statistic;
pub mod statistics;
pub mod activity_type;
pub mod timezone;
pub mod activity;
pub mod sanity;
pub mod cleaning;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use units::{convert, Unit};
pub use statistic::{StatField, Statistic};
pub use statistics::{Metric, StatisticsSet, METRICS};
pub use activity_type::{are_variants, pick_most_specific, ActivityType};
pub use timezone::{
    ActivityTz, FixedLookup, MemoryTzCache, TimezoneCache, TimezoneLookup, TimezoneResolver,
    TzValue,
};
pub use activity::Activity;
pub use sanity::SanityViolation;
pub use config::Config;
