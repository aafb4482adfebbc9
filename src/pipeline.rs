//! Pipeline orchestration
//!
//! This module provides the public API of the engine. It runs the full
//! pipeline from a calculation input to a serializable result bundle.

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::composer::ResultComposer;
use crate::dates::parse_date;
use crate::error::ComputeError;
use crate::intervals::{pre_entry_period, IntervalBuilder};
use crate::normalizer::TripNormalizer;
use crate::resolver::EligibilityResolver;
use crate::rules::RuleSet;
use crate::types::{
    AnnotatedTrip, IlrCalculationInput, IlrTrack, IneligibilityReason, PreEntryPeriod,
    TravelCalculationResult,
};

/// Run one assessment with the statutory rules.
///
/// # Example
/// ```ignore
/// let result = calculate_ilr(&input);
/// if result.validation.is_eligible() { /* ... */ }
/// ```
pub fn calculate_ilr(input: &IlrCalculationInput) -> TravelCalculationResult {
    IlrCalculator::new().calculate(input)
}

/// Run one assessment from JSON and return the pretty-printed result bundle.
///
/// # Arguments
/// * `input_json` - Serialized `IlrCalculationInput`
///
/// # Returns
/// Serialized `TravelCalculationResult`
pub fn ilr_to_json(input_json: String) -> Result<String, ComputeError> {
    IlrCalculator::new().calculate_json(&input_json)
}

/// Assessment date and qualifying start accepted by input validation
struct AcceptedInput {
    track: IlrTrack,
    qualifying_start: NaiveDate,
    override_date: Option<NaiveDate>,
}

/// Calculator holding the rule set and the reference date for relative counters.
///
/// Holds no mutable state; one instance can serve concurrent assessments.
#[derive(Debug, Clone)]
pub struct IlrCalculator {
    rules: RuleSet,
    today: Option<NaiveDate>,
}

impl Default for IlrCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl IlrCalculator {
    /// Create a calculator with the statutory rules
    pub fn new() -> Self {
        Self {
            rules: RuleSet::default(),
            today: None,
        }
    }

    /// Create a calculator with an alternative rule set
    pub fn with_rules(rules: RuleSet) -> Result<Self, ComputeError> {
        rules.validate()?;
        Ok(Self { rules, today: None })
    }

    /// Fix the date used for `daysUntilEligible` instead of the system clock
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Run the full pipeline.
    ///
    /// Pipeline stages:
    /// 1. TripNormalizer - Annotate trips with day counts
    /// 2. IntervalBuilder - Derive sorted absence intervals
    /// 3. QualifyingWindowEvaluator - Test absence rules for a date
    /// 4. EligibilityResolver - Pick or search the assessment date
    /// 5. ResultComposer - Build the result bundle
    pub fn calculate(&self, input: &IlrCalculationInput) -> TravelCalculationResult {
        // Stage 1: Annotate trips
        let annotated = TripNormalizer::normalize(&input.trips);

        let visa_start = parse_date(&input.visa_start_date);
        let entry = parse_date(&input.vignette_entry_date);
        let pre_entry = pre_entry_period(visa_start, entry, &self.rules);
        let composer = ResultComposer::new(&self.rules, self.today());

        let accepted = match validate_input(input, &annotated, &pre_entry) {
            Ok(accepted) => accepted,
            Err(reason) => {
                debug!(reason = reason.message(), "assessment rejected before evaluation");
                return composer.rejected(input.ilr_track, annotated, pre_entry, reason);
            }
        };

        // Stage 2: Build absence intervals
        let intervals = IntervalBuilder::build(&annotated, Some(&pre_entry));

        // Stages 3-4: Resolve the verdict
        let resolution = EligibilityResolver::new(&self.rules).resolve(
            &intervals,
            accepted.qualifying_start,
            accepted.track,
            accepted.override_date,
        );

        // Stage 5: Compose the bundle
        composer.compose(accepted.track, annotated, pre_entry, &intervals, resolution)
    }

    /// Run the input checks alone, without evaluating any application date.
    ///
    /// Returns the first rejection `calculate` would report, in the same order.
    pub fn check(&self, input: &IlrCalculationInput) -> Result<(), IneligibilityReason> {
        let annotated = TripNormalizer::normalize(&input.trips);
        let pre_entry = pre_entry_period(
            parse_date(&input.visa_start_date),
            parse_date(&input.vignette_entry_date),
            &self.rules,
        );
        validate_input(input, &annotated, &pre_entry).map(|_| ())
    }

    /// Parse JSON input, run the pipeline and serialize the result
    pub fn calculate_json(&self, input_json: &str) -> Result<String, ComputeError> {
        let input: IlrCalculationInput = serde_json::from_str(input_json)?;
        let result = self.calculate(&input);
        serde_json::to_string_pretty(&result).map_err(ComputeError::JsonError)
    }
}

/// Input checks, in order; the first failure is terminal
fn validate_input(
    input: &IlrCalculationInput,
    annotated: &[AnnotatedTrip],
    pre_entry: &PreEntryPeriod,
) -> Result<AcceptedInput, IneligibilityReason> {
    let incomplete = TripNormalizer::count_incomplete(annotated);
    if incomplete > 0 {
        return Err(IneligibilityReason::IncompletedTrips {
            message: format!(
                "{} trip(s) are missing a valid departure or return date",
                incomplete
            ),
        });
    }

    let track = input.ilr_track.ok_or_else(|| {
        IneligibilityReason::incorrect_input("Select a qualifying track before calculating")
    })?;

    for (label, raw) in [
        ("visa start", &input.visa_start_date),
        ("entry", &input.vignette_entry_date),
    ] {
        if !raw.trim().is_empty() && parse_date(raw).is_none() {
            return Err(IneligibilityReason::incorrect_input(format!(
                "The {} date '{}' is not a valid date",
                label, raw
            )));
        }
    }

    if let (Some(visa), Some(entry)) = (pre_entry.visa_start_date, pre_entry.entry_date) {
        if visa > entry {
            return Err(IneligibilityReason::incorrect_input(format!(
                "The visa start date {} is after the entry date {}",
                visa, entry
            )));
        }
    }

    let qualifying_start = pre_entry.qualifying_start_date.ok_or_else(|| {
        IneligibilityReason::incorrect_input("Enter a visa start date or an entry date")
    })?;

    let mut trips: Vec<(NaiveDate, NaiveDate)> =
        annotated.iter().filter_map(AnnotatedTrip::dates).collect();
    if let Some((out, back)) = trips.iter().find(|(out, back)| back < out) {
        return Err(IneligibilityReason::incorrect_input(format!(
            "A trip returns on {} before it departs on {}",
            back, out
        )));
    }

    trips.sort();
    let mut latest_return: Option<NaiveDate> = None;
    for (out, back) in &trips {
        if let Some(previous) = latest_return {
            if *out <= previous {
                return Err(IneligibilityReason::incorrect_input(format!(
                    "The trip departing on {} overlaps or touches an earlier trip returning on {}",
                    out, previous
                )));
            }
        }
        latest_return = Some(latest_return.map_or(*back, |prev| prev.max(*back)));
    }

    let override_date = match input.application_date_override.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(parse_date(raw).ok_or_else(|| {
            IneligibilityReason::incorrect_input(format!(
                "The application date '{}' is not a valid date",
                raw
            ))
        })?),
        _ => None,
    };

    Ok(AcceptedInput {
        track,
        qualifying_start,
        override_date,
    })
}
