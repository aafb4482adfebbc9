//! Eligibility resolution
//!
//! Chooses the assessment date and turns the evaluator's outcome into a
//! verdict. With a caller-supplied date the evaluator runs once; otherwise the
//! resolver probes forward one day at a time from the legal earliest date until
//! a date passes or the search horizon runs out.

use chrono::NaiveDate;
use tracing::debug;

use crate::dates::{add_days, add_years};
use crate::evaluator::{Evaluation, QualifyingWindowEvaluator};
use crate::rules::RuleSet;
use crate::types::{
    AbsenceInterval, AssessmentMode, IlrTrack, IneligibilityReason, ValidationResult,
};

/// Verdict plus the dates that explain it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub validation: ValidationResult,
    pub mode: AssessmentMode,
    pub qualifying_start: NaiveDate,
    pub earliest_application_date: NaiveDate,
    /// Candidate dates evaluated
    pub probes: u32,
    /// No compliant date was found before the horizon ran out
    pub search_horizon_exhausted: bool,
}

/// Resolver for one rule set
pub struct EligibilityResolver<'a> {
    rules: &'a RuleSet,
    evaluator: QualifyingWindowEvaluator<'a>,
}

impl<'a> EligibilityResolver<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            evaluator: QualifyingWindowEvaluator::new(rules),
        }
    }

    /// Qualifying start plus the track length, less the application lead time
    pub fn legal_earliest_date(&self, qualifying_start: NaiveDate, track: IlrTrack) -> NaiveDate {
        add_days(
            add_years(qualifying_start, track.years()),
            -i64::from(self.rules.application_lead_days),
        )
    }

    pub fn resolve(
        &self,
        intervals: &[AbsenceInterval],
        qualifying_start: NaiveDate,
        track: IlrTrack,
        override_date: Option<NaiveDate>,
    ) -> Resolution {
        let earliest = self.legal_earliest_date(qualifying_start, track);
        match override_date {
            Some(date) => self.resolve_override(intervals, qualifying_start, earliest, track, date),
            None => self.search(intervals, qualifying_start, earliest, track),
        }
    }

    fn resolve_override(
        &self,
        intervals: &[AbsenceInterval],
        qualifying_start: NaiveDate,
        earliest: NaiveDate,
        track: IlrTrack,
        date: NaiveDate,
    ) -> Resolution {
        let mut resolution = Resolution {
            validation: ValidationResult::Eligible {
                application_date: date,
            },
            mode: AssessmentMode::Override,
            qualifying_start,
            earliest_application_date: earliest,
            probes: 0,
            search_horizon_exhausted: false,
        };

        if date < earliest {
            debug!(application_date = %date, earliest = %earliest, "application date too early");
            resolution.validation = ValidationResult::ineligible(IneligibilityReason::TooEarly {
                earliest_allowed_date: earliest,
                message: format!(
                    "An application on {} is too early; the earliest allowed date is {}",
                    date, earliest
                ),
            });
            return resolution;
        }

        let evaluation = self.evaluator.evaluate(intervals, date, track);
        resolution.probes = 1;
        if !evaluation.passed() {
            resolution.validation = self.excessive_absence(evaluation, None);
        }
        resolution
    }

    fn search(
        &self,
        intervals: &[AbsenceInterval],
        qualifying_start: NaiveDate,
        earliest: NaiveDate,
        track: IlrTrack,
    ) -> Resolution {
        let horizon = self.rules.search_horizon_days;
        let mut last_failure: Option<Evaluation> = None;

        for offset in 0..horizon {
            let candidate = add_days(earliest, i64::from(offset));
            let evaluation = self.evaluator.evaluate(intervals, candidate, track);
            if evaluation.passed() {
                debug!(application_date = %candidate, probes = offset + 1, "eligible date found");
                return Resolution {
                    validation: ValidationResult::Eligible {
                        application_date: candidate,
                    },
                    mode: AssessmentMode::Auto,
                    qualifying_start,
                    earliest_application_date: earliest,
                    probes: offset + 1,
                    search_horizon_exhausted: false,
                };
            }
            last_failure = Some(evaluation);
        }

        debug!(earliest = %earliest, horizon, "search horizon exhausted");
        let validation = match last_failure {
            Some(evaluation) => self.excessive_absence(evaluation, Some(earliest)),
            // Unreachable with a validated rule set; the horizon is at least one day
            None => ValidationResult::ineligible(IneligibilityReason::incorrect_input(
                "The eligibility search horizon is empty",
            )),
        };
        Resolution {
            validation,
            mode: AssessmentMode::Auto,
            qualifying_start,
            earliest_application_date: earliest,
            probes: horizon,
            search_horizon_exhausted: true,
        }
    }

    fn excessive_absence(
        &self,
        evaluation: Evaluation,
        search_from: Option<NaiveDate>,
    ) -> ValidationResult {
        let detail = evaluation
            .message(self.rules)
            .unwrap_or_else(|| "Absence limits exceeded".to_string());
        let message = match search_from {
            Some(from) => format!(
                "No application date within {} days of {} satisfies the absence rules. {}",
                self.rules.search_horizon_days, from, detail
            ),
            None => detail,
        };
        ValidationResult::ineligible(IneligibilityReason::ExcessiveAbsence {
            offending_windows: evaluation.offending_windows,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn absence(start: NaiveDate, days: i64) -> AbsenceInterval {
        AbsenceInterval::new(start, add_days(start, days - 1)).unwrap()
    }

    #[test]
    fn test_legal_earliest_date() {
        let rules = RuleSet::default();
        let resolver = EligibilityResolver::new(&rules);
        assert_eq!(
            resolver.legal_earliest_date(d(2023, 1, 1), IlrTrack::Five),
            d(2027, 12, 4)
        );
        assert_eq!(
            resolver.legal_earliest_date(d(2020, 2, 29), IlrTrack::Two),
            d(2022, 1, 31)
        );
    }

    #[test]
    fn test_auto_search_without_absence() {
        let rules = RuleSet::default();
        let resolution =
            EligibilityResolver::new(&rules).resolve(&[], d(2023, 1, 1), IlrTrack::Five, None);
        assert_eq!(resolution.validation.application_date(), Some(d(2027, 12, 4)));
        assert_eq!(resolution.mode, AssessmentMode::Auto);
        assert_eq!(resolution.probes, 1);
    }

    #[test]
    fn test_override_too_early_skips_absence_check() {
        let rules = RuleSet::default();
        let intervals = [absence(d(2023, 2, 1), 300)];
        let resolution = EligibilityResolver::new(&rules).resolve(
            &intervals,
            d(2023, 1, 1),
            IlrTrack::Five,
            Some(d(2027, 12, 3)),
        );
        assert_eq!(resolution.probes, 0);
        match resolution.validation.reason() {
            Some(IneligibilityReason::TooEarly {
                earliest_allowed_date,
                ..
            }) => assert_eq!(*earliest_allowed_date, d(2027, 12, 4)),
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[test]
    fn test_override_on_earliest_date_is_evaluated() {
        let rules = RuleSet::default();
        let resolution = EligibilityResolver::new(&rules).resolve(
            &[],
            d(2023, 1, 1),
            IlrTrack::Five,
            Some(d(2027, 12, 4)),
        );
        assert_eq!(resolution.mode, AssessmentMode::Override);
        assert_eq!(resolution.validation.application_date(), Some(d(2027, 12, 4)));
    }

    #[test]
    fn test_override_with_excessive_absence() {
        let rules = RuleSet::default();
        let intervals = [absence(d(2026, 1, 1), 200)];
        let resolution = EligibilityResolver::new(&rules).resolve(
            &intervals,
            d(2023, 1, 1),
            IlrTrack::Five,
            Some(d(2028, 6, 1)),
        );
        match resolution.validation.reason() {
            Some(IneligibilityReason::ExcessiveAbsence {
                offending_windows, ..
            }) => {
                // First breaching window catches the absence as it crosses the limit
                assert_eq!(offending_windows[0].days, 181);
                assert_eq!(offending_windows[0].end, d(2026, 6, 30));
            }
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[test]
    fn test_search_moves_past_old_absence() {
        // 200 days abroad at the very start of the period: the search has to
        // wait until the oldest absence days drop out of the period.
        let rules = RuleSet::default();
        let intervals = [absence(d(2023, 1, 1), 200)];
        let resolution =
            EligibilityResolver::new(&rules).resolve(&intervals, d(2023, 1, 1), IlrTrack::Two, None);
        let date = resolution.validation.application_date().unwrap();
        assert!(date > d(2024, 12, 4));
        assert!(!resolution.search_horizon_exhausted);

        let check = QualifyingWindowEvaluator::new(&rules).evaluate(&intervals, date, IlrTrack::Two);
        assert!(check.passed());
        let day_before = QualifyingWindowEvaluator::new(&rules).evaluate(
            &intervals,
            add_days(date, -1),
            IlrTrack::Two,
        );
        assert!(!day_before.passed());
    }

    #[test]
    fn test_exhausted_horizon_is_not_eligible() {
        let rules = RuleSet {
            search_horizon_days: 5,
            ..RuleSet::default()
        };
        let intervals = [absence(d(2024, 1, 1), 250)];
        let resolution =
            EligibilityResolver::new(&rules).resolve(&intervals, d(2023, 1, 1), IlrTrack::Two, None);
        assert!(resolution.search_horizon_exhausted);
        assert_eq!(resolution.probes, 5);
        assert!(!resolution.validation.is_eligible());
        assert!(matches!(
            resolution.validation.reason(),
            Some(IneligibilityReason::ExcessiveAbsence { .. })
        ));
    }
}
