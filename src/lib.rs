//! ILR Flux - Deterministic rules engine for continuous-residence eligibility
//!
//! The engine turns a list of trips abroad into an eligibility verdict through a
//! deterministic pipeline: trip normalization → absence intervals → qualifying
//! window evaluation → application date resolution → result composition.
//!
//! ## Modules
//!
//! - **Pipeline**: `calculate_ilr` / `IlrCalculator`, the public entry points
//! - **Evaluator**: rolling 180-in-12-months check and the transitional regime
//! - **Resolver**: override or forward search for the earliest compliant date
//! - **Composer**: summary counters and chart series for the result bundle

pub mod composer;
pub mod dates;
pub mod error;
pub mod evaluator;
pub mod intervals;
pub mod normalizer;
pub mod pipeline;
pub mod resolver;
pub mod rules;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use error::ComputeError;
pub use pipeline::{calculate_ilr, ilr_to_json, IlrCalculator};
pub use rules::RuleSet;

pub use types::{
    AnnotatedTrip, IlrCalculationInput, IlrTrack, IneligibilityReason, TravelCalculationResult,
    TravelSummary, TripRecord, ValidationResult,
};

/// Engine version, reported by the CLI and FFI
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
