//! Statutory thresholds
//!
//! Every legal constant the engine relies on lives here. The values bundled in
//! [`RuleSet::default`] are the published ones; an alternative set can be
//! supplied to [`crate::pipeline::IlrCalculator::with_rules`] when modelling a
//! rule revision.

use crate::error::ComputeError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maximum cumulative absence days in any rolling window
pub const ROLLING_ABSENCE_LIMIT_DAYS: u32 = 180;

/// Length of the rolling window in calendar months
pub const ROLLING_WINDOW_MONTHS: u32 = 12;

/// Longest single pre-cutover absence allowed on the long residence track
pub const TRANSITIONAL_SINGLE_ABSENCE_LIMIT_DAYS: u32 = 184;

/// Aggregate pre-cutover absence allowed on the long residence track
pub const TRANSITIONAL_AGGREGATE_LIMIT_DAYS: u32 = 548;

/// Date from which long residence absences follow the rolling rule (y, m, d)
pub const TRANSITIONAL_CUTOVER: (i32, u32, u32) = (2024, 4, 11);

/// An application may be submitted this many days before the period completes
pub const APPLICATION_LEAD_DAYS: u32 = 28;

/// Longest gap between visa issue and entry that may count toward the period
pub const MAX_PRE_ENTRY_DELAY_DAYS: u32 = 90;

/// Number of candidate dates probed by the eligibility search
pub const SEARCH_HORIZON_DAYS: u32 = 730;

/// Target number of points in the rolling absence chart series
pub const ROLLING_SERIES_POINTS: u32 = 100;

/// Day-range cap for the rolling absence chart series
pub const ROLLING_SERIES_MAX_DAYS: u32 = 5000;

/// Day-range cap for the presence timeline
pub const TIMELINE_MAX_DAYS: u32 = 4000;

/// Stride used when sampling the maximum rolling absence for the summary
pub const RISK_SAMPLE_STRIDE_DAYS: u32 = 7;

/// The full set of thresholds used by one calculator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleSet {
    pub rolling_absence_limit_days: u32,
    pub rolling_window_months: u32,
    pub transitional_single_absence_limit_days: u32,
    pub transitional_aggregate_limit_days: u32,
    pub transitional_cutover_date: NaiveDate,
    pub application_lead_days: u32,
    pub max_pre_entry_delay_days: u32,
    pub search_horizon_days: u32,
    pub rolling_series_points: u32,
    pub rolling_series_max_days: u32,
    pub timeline_max_days: u32,
    pub risk_sample_stride_days: u32,
}

impl Default for RuleSet {
    fn default() -> Self {
        let (y, m, d) = TRANSITIONAL_CUTOVER;
        Self {
            rolling_absence_limit_days: ROLLING_ABSENCE_LIMIT_DAYS,
            rolling_window_months: ROLLING_WINDOW_MONTHS,
            transitional_single_absence_limit_days: TRANSITIONAL_SINGLE_ABSENCE_LIMIT_DAYS,
            transitional_aggregate_limit_days: TRANSITIONAL_AGGREGATE_LIMIT_DAYS,
            transitional_cutover_date: NaiveDate::from_ymd_opt(y, m, d)
                .expect("cutover constant is a valid calendar date"),
            application_lead_days: APPLICATION_LEAD_DAYS,
            max_pre_entry_delay_days: MAX_PRE_ENTRY_DELAY_DAYS,
            search_horizon_days: SEARCH_HORIZON_DAYS,
            rolling_series_points: ROLLING_SERIES_POINTS,
            rolling_series_max_days: ROLLING_SERIES_MAX_DAYS,
            timeline_max_days: TIMELINE_MAX_DAYS,
            risk_sample_stride_days: RISK_SAMPLE_STRIDE_DAYS,
        }
    }
}

impl RuleSet {
    /// Reject sets that would make the window sweep or the search meaningless
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.rolling_window_months == 0 {
            return Err(ComputeError::InvalidRules(
                "rollingWindowMonths must be at least 1".to_string(),
            ));
        }
        if self.search_horizon_days == 0 {
            return Err(ComputeError::InvalidRules(
                "searchHorizonDays must be at least 1".to_string(),
            ));
        }
        if self.rolling_series_points == 0 || self.risk_sample_stride_days == 0 {
            return Err(ComputeError::InvalidRules(
                "series point count and sample stride must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a rule set from JSON; missing keys take default values
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let rules: RuleSet = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Serialize the rule set to pretty JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_valid() {
        let rules = RuleSet::default();
        assert!(rules.validate().is_ok());
        assert_eq!(rules.rolling_absence_limit_days, 180);
        assert_eq!(
            rules.transitional_cutover_date,
            NaiveDate::from_ymd_opt(2024, 4, 11).unwrap()
        );
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let rules = RuleSet::from_json(r#"{"rollingAbsenceLimitDays": 90}"#).unwrap();
        assert_eq!(rules.rolling_absence_limit_days, 90);
        assert_eq!(rules.application_lead_days, APPLICATION_LEAD_DAYS);
    }

    #[test]
    fn test_zero_window_rejected() {
        let result = RuleSet::from_json(r#"{"rollingWindowMonths": 0}"#);
        assert!(matches!(result, Err(ComputeError::InvalidRules(_))));
    }

    #[test]
    fn test_rules_json_roundtrip() {
        let json = RuleSet::default().to_json().unwrap();
        assert!(json.contains("\"transitionalCutoverDate\": \"2024-04-11\""));
        assert_eq!(RuleSet::from_json(&json).unwrap(), RuleSet::default());
    }
}
