//! Core types for the ILR engine
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw trip records, annotated trips, absence intervals, verdicts and
//! the serializable result bundle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Qualifying period length in years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum IlrTrack {
    Two,
    Three,
    Five,
    /// Long residence; uses the transitional absence regime
    Ten,
}

impl IlrTrack {
    pub fn years(&self) -> u32 {
        match self {
            IlrTrack::Two => 2,
            IlrTrack::Three => 3,
            IlrTrack::Five => 5,
            IlrTrack::Ten => 10,
        }
    }

    pub fn is_transitional(&self) -> bool {
        matches!(self, IlrTrack::Ten)
    }
}

impl TryFrom<u8> for IlrTrack {
    type Error = ComputeError;

    fn try_from(years: u8) -> Result<Self, Self::Error> {
        match years {
            2 => Ok(IlrTrack::Two),
            3 => Ok(IlrTrack::Three),
            5 => Ok(IlrTrack::Five),
            10 => Ok(IlrTrack::Ten),
            other => Err(ComputeError::UnsupportedTrack(other)),
        }
    }
}

impl From<IlrTrack> for u8 {
    fn from(track: IlrTrack) -> Self {
        track.years() as u8
    }
}

/// A trip abroad as entered by the user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TripRecord {
    pub id: String,
    /// Departure date (YYYY-MM-DD, may be empty)
    pub out_date: String,
    /// Return date (YYYY-MM-DD, may be empty)
    pub in_date: String,
    pub out_route: String,
    pub in_route: String,
}

impl TripRecord {
    /// Create a trip with a fresh identifier
    pub fn new(out_date: impl Into<String>, in_date: impl Into<String>) -> Self {
        TripRecord {
            id: uuid::Uuid::new_v4().to_string(),
            out_date: out_date.into(),
            in_date: in_date.into(),
            out_route: String::new(),
            in_route: String::new(),
        }
    }

    /// Attach departure and return routes
    pub fn with_routes(mut self, out_route: impl Into<String>, in_route: impl Into<String>) -> Self {
        self.out_route = out_route.into();
        self.in_route = in_route.into();
        self
    }

    /// Override the generated identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Trip record plus derived day counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedTrip {
    #[serde(flatten)]
    pub trip: TripRecord,
    /// Calendar difference `inDate - outDate`
    pub calendar_days: Option<i64>,
    /// Days abroad excluding departure and return days
    pub full_days: Option<i64>,
    pub is_incomplete: bool,
}

impl AnnotatedTrip {
    /// Parsed departure and return dates, present only for complete trips
    pub fn dates(&self) -> Option<(NaiveDate, NaiveDate)> {
        if self.is_incomplete {
            return None;
        }
        let out = crate::dates::parse_date(&self.trip.out_date)?;
        let back = crate::dates::parse_date(&self.trip.in_date)?;
        Some((out, back))
    }
}

/// Closed inclusive range of days spent outside the country
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
}

/// Gap between visa issue and physical entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreEntryPeriod {
    pub visa_start_date: Option<NaiveDate>,
    pub entry_date: Option<NaiveDate>,
    pub has_gap: bool,
    pub delay_days: i64,
    pub can_count_toward_period: bool,
    pub qualifying_start_date: Option<NaiveDate>,
}

/// A concrete span whose absence total breached a limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffendingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
}

/// Why an assessment did not produce an eligible date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IneligibilityReason {
    TooEarly {
        #[serde(rename = "earliestAllowedDate")]
        earliest_allowed_date: NaiveDate,
        message: String,
    },
    ExcessiveAbsence {
        #[serde(rename = "offendingWindows")]
        offending_windows: Vec<OffendingWindow>,
        message: String,
    },
    IncorrectInput {
        message: String,
    },
    IncompletedTrips {
        message: String,
    },
}

impl IneligibilityReason {
    pub fn message(&self) -> &str {
        match self {
            IneligibilityReason::TooEarly { message, .. }
            | IneligibilityReason::ExcessiveAbsence { message, .. }
            | IneligibilityReason::IncorrectInput { message }
            | IneligibilityReason::IncompletedTrips { message } => message,
        }
    }

    pub fn incorrect_input(message: impl Into<String>) -> Self {
        IneligibilityReason::IncorrectInput {
            message: message.into(),
        }
    }
}

/// Final verdict of one assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationResult {
    Eligible {
        #[serde(rename = "applicationDate")]
        application_date: NaiveDate,
    },
    Ineligible {
        reason: IneligibilityReason,
    },
}

impl ValidationResult {
    pub fn ineligible(reason: IneligibilityReason) -> Self {
        ValidationResult::Ineligible { reason }
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self, ValidationResult::Eligible { .. })
    }

    pub fn application_date(&self) -> Option<NaiveDate> {
        match self {
            ValidationResult::Eligible { application_date } => Some(*application_date),
            ValidationResult::Ineligible { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&IneligibilityReason> {
        match self {
            ValidationResult::Eligible { .. } => None,
            ValidationResult::Ineligible { reason } => Some(reason),
        }
    }
}

/// How the assessment date was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentMode {
    /// Earliest compliant date searched forward from the legal earliest date
    #[default]
    Auto,
    /// Caller supplied the application date
    Override,
}

/// Engine input
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IlrCalculationInput {
    pub trips: Vec<TripRecord>,
    /// Date of physical entry (YYYY-MM-DD or empty)
    pub vignette_entry_date: String,
    /// Date the visa was issued / became valid (YYYY-MM-DD or empty)
    pub visa_start_date: String,
    pub ilr_track: Option<IlrTrack>,
    pub application_date_override: Option<String>,
}

/// Summary counters for display
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelSummary {
    pub track: Option<IlrTrack>,
    pub assessment_mode: AssessmentMode,
    pub total_trips: usize,
    pub complete_trips: usize,
    pub incomplete_trips: usize,
    /// Sum of full days abroad over all complete trips
    pub total_full_days: i64,
    /// Absence days contributed by the pre-entry gap
    pub pre_entry_absence_days: u32,
    pub qualifying_start_date: Option<NaiveDate>,
    /// Qualifying start plus the track length, less the lead time
    pub earliest_application_date: Option<NaiveDate>,
    pub application_date: Option<NaiveDate>,
    /// Days from "today" to the application date; never negative
    pub days_until_eligible: Option<i64>,
    /// Highest trailing-window absence, sampled at a coarse stride
    pub max_rolling_absence: u32,
    #[serde(rename = "hasExceededAllowedAbsense")]
    pub has_exceeded_allowed_absence: bool,
    /// The eligibility search ran out of candidate dates
    pub search_horizon_exhausted: bool,
}

/// Trailing-window absence at one date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingAbsencePoint {
    pub date: NaiveDate,
    pub days: u32,
}

/// Per-day presence state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub present: bool,
    /// Trips departed on or before this date
    pub trip_count: u32,
}

/// Simplified trip record for Gantt-style charts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripBar {
    pub id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub full_days: i64,
    pub out_route: String,
    pub in_route: String,
}

/// Complete result of one assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelCalculationResult {
    pub annotated_trips: Vec<AnnotatedTrip>,
    pub pre_entry_period: PreEntryPeriod,
    pub validation: ValidationResult,
    pub summary: TravelSummary,
    pub rolling_absence_series: Vec<RollingAbsencePoint>,
    pub timeline_points: Vec<TimelinePoint>,
    pub trip_bars: Vec<TripBar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_serializes_as_number() {
        let json = serde_json::to_string(&IlrTrack::Ten).unwrap();
        assert_eq!(json, "10");
        let track: IlrTrack = serde_json::from_str("3").unwrap();
        assert_eq!(track, IlrTrack::Three);
        assert!(serde_json::from_str::<IlrTrack>("4").is_err());
    }

    #[test]
    fn test_validation_result_tags() {
        let result = ValidationResult::ineligible(IneligibilityReason::incorrect_input("bad"));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "INELIGIBLE");
        assert_eq!(value["reason"]["type"], "INCORRECT_INPUT");
        assert_eq!(value["reason"]["message"], "bad");

        let eligible = ValidationResult::Eligible {
            application_date: NaiveDate::from_ymd_opt(2027, 12, 4).unwrap(),
        };
        let value = serde_json::to_value(&eligible).unwrap();
        assert_eq!(value["status"], "ELIGIBLE");
        assert_eq!(value["applicationDate"], "2027-12-04");
    }

    #[test]
    fn test_input_defaults_for_missing_fields() {
        let input: IlrCalculationInput = serde_json::from_str(
            r#"{"trips": [{"outDate": "2024-01-01", "inDate": "2024-01-05"}], "ilrTrack": 5}"#,
        )
        .unwrap();
        assert_eq!(input.trips[0].out_route, "");
        assert_eq!(input.visa_start_date, "");
        assert_eq!(input.ilr_track, Some(IlrTrack::Five));
        assert!(input.application_date_override.is_none());
    }

    #[test]
    fn test_annotated_trip_flattens_record() {
        let annotated = AnnotatedTrip {
            trip: TripRecord::new("2024-01-01", "2024-01-05").with_id("t1"),
            calendar_days: Some(4),
            full_days: Some(3),
            is_incomplete: false,
        };
        let value = serde_json::to_value(&annotated).unwrap();
        assert_eq!(value["id"], "t1");
        assert_eq!(value["outDate"], "2024-01-01");
        assert_eq!(value["fullDays"], 3);
        assert_eq!(value["isIncomplete"], false);
    }

    #[test]
    fn test_new_trip_gets_unique_id() {
        let a = TripRecord::new("2024-01-01", "2024-01-02");
        let b = TripRecord::new("2024-01-01", "2024-01-02");
        assert_ne!(a.id, b.id);
    }
}
