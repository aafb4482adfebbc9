//! Error types for the ILR engine
//!
//! Eligibility outcomes (incomplete trips, overlaps, excessive absence) are
//! never errors; they are carried by [`crate::types::ValidationResult`].
//! These variants cover transport problems around the engine.

use thiserror::Error;

/// Errors that can occur around an assessment
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Unsupported qualifying track: {0}")]
    UnsupportedTrack(u8),

    #[error("Invalid rule set: {0}")]
    InvalidRules(String),
}
