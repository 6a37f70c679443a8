//! Error types for the interchange_core library.

use crate::units::Unit;
use crate::sanity::SanityViolation;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for interchange_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No conversion path between two units, or an edge can't be walked backwards
    #[error("Conversion error from {from} to {to}: {reason}")]
    Conversion { from: Unit, to: Unit, reason: String },

    /// Timezone couldn't be determined for an activity
    #[error("Timezone resolution error: {0}")]
    Resolution(String),

    /// An operation ran before the state it depends on existed
    #[error("Precursor error: {0}")]
    Precursor(String),

    /// Activity failed a plausibility check
    #[error("Validation error: {0}")]
    Validation(#[from] SanityViolation),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unrecognised unit, activity type or similar token
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Which sanity rule was violated, if this is a validation error
    pub fn violation(&self) -> Option<&SanityViolation> {
        match self {
            Error::Validation(v) => Some(v),
            _ => None,
        }
    }
}
