//! Qualifying-window evaluation
//!
//! Tests whether the absence rules hold over the qualifying period that ends on
//! an assessment date. Two regimes exist:
//!
//! - **Standard** (2, 3 and 5 year tracks): no rolling 12-month window starting
//!   inside the period may hold more than 180 absence days.
//! - **Transitional** (10 year track): absences starting before the cutover
//!   date are held to a per-absence cap and an aggregate cap; absences starting
//!   on or after it follow the rolling rule, with windows starting no earlier
//!   than the cutover.
//!
//! Caps are inclusive: a total equal to the cap passes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dates::{add_days, add_months, days_between, sub_months, sub_years};
use crate::intervals::IntervalBuilder;
use crate::rules::RuleSet;
use crate::types::{AbsenceInterval, IlrTrack, OffendingWindow};

/// Closed range `[assessment date - track years, assessment date]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifyingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl QualifyingPeriod {
    pub fn ending_on(assessment_date: NaiveDate, track: IlrTrack) -> Self {
        QualifyingPeriod {
            start: sub_years(assessment_date, track.years()),
            end: assessment_date,
        }
    }
}

/// Which limit an absence pattern breached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceBreach {
    /// Too many days inside one rolling window
    RollingLimit,
    /// One pre-cutover absence longer than the per-absence cap
    SingleAbsence,
    /// Pre-cutover absences above the aggregate cap
    AggregateLimit,
}

/// Outcome of evaluating one assessment date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub period: QualifyingPeriod,
    /// In-period absence days
    pub total_absence_days: u32,
    pub breach: Option<AbsenceBreach>,
    pub offending_windows: Vec<OffendingWindow>,
}

impl Evaluation {
    pub fn passed(&self) -> bool {
        self.breach.is_none()
    }

    /// User-facing explanation of the breach, if any
    pub fn message(&self, rules: &RuleSet) -> Option<String> {
        let window = self.offending_windows.first()?;
        let text = match self.breach? {
            AbsenceBreach::RollingLimit => format!(
                "{} days absent between {} and {}, above the limit of {} days in any {} months",
                window.days,
                window.start,
                window.end,
                rules.rolling_absence_limit_days,
                rules.rolling_window_months
            ),
            AbsenceBreach::SingleAbsence => format!(
                "Single absence of {} days from {} to {} exceeds the limit of {} days",
                window.days, window.start, window.end, rules.transitional_single_absence_limit_days
            ),
            AbsenceBreach::AggregateLimit => format!(
                "{} days absent before {} exceed the total limit of {} days",
                window.days,
                rules.transitional_cutover_date,
                rules.transitional_aggregate_limit_days
            ),
        };
        Some(text)
    }
}

/// Evaluator for the absence rules of one rule set
pub struct QualifyingWindowEvaluator<'a> {
    rules: &'a RuleSet,
}

impl<'a> QualifyingWindowEvaluator<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Evaluate the qualifying period ending on `assessment_date`.
    ///
    /// `intervals` must be sorted by start date.
    pub fn evaluate(
        &self,
        intervals: &[AbsenceInterval],
        assessment_date: NaiveDate,
        track: IlrTrack,
    ) -> Evaluation {
        let period = QualifyingPeriod::ending_on(assessment_date, track);
        let relevant: Vec<AbsenceInterval> = intervals
            .iter()
            .filter_map(|i| i.clip(period.start, period.end))
            .collect();
        let total_absence_days = IntervalBuilder::total_days(&relevant);

        let failure = if track.is_transitional() {
            self.check_transitional(intervals, period)
        } else {
            self.rolling_check(&relevant, period.start, period.end)
                .map(|w| (AbsenceBreach::RollingLimit, w))
        };

        match failure {
            Some((breach, window)) => {
                debug!(
                    assessment_date = %assessment_date,
                    ?breach,
                    window_start = %window.start,
                    window_end = %window.end,
                    days = window.days,
                    "absence rule breached"
                );
                Evaluation {
                    period,
                    total_absence_days,
                    breach: Some(breach),
                    offending_windows: vec![window],
                }
            }
            None => Evaluation {
                period,
                total_absence_days,
                breach: None,
                offending_windows: Vec::new(),
            },
        }
    }

    /// Pre-cutover caps, then the rolling rule for the remainder.
    ///
    /// Absences are assigned to a rule by their actual start date, before
    /// clipping, so one straddling the cutover stays under the legacy caps
    /// even when the period itself starts after the cutover.
    fn check_transitional(
        &self,
        intervals: &[AbsenceInterval],
        period: QualifyingPeriod,
    ) -> Option<(AbsenceBreach, OffendingWindow)> {
        let cutover = self.rules.transitional_cutover_date;
        let (before, after): (Vec<AbsenceInterval>, Vec<AbsenceInterval>) =
            intervals.iter().partition(|i| i.start < cutover);
        let clip = |group: Vec<AbsenceInterval>| -> Vec<AbsenceInterval> {
            group
                .iter()
                .filter_map(|i| i.clip(period.start, period.end))
                .collect()
        };
        let (before, after) = (clip(before), clip(after));

        if let Some(long) = before
            .iter()
            .find(|i| i.days > self.rules.transitional_single_absence_limit_days)
        {
            return Some((AbsenceBreach::SingleAbsence, window_of(long)));
        }

        if period.start < cutover {
            let last_legacy_day = add_days(cutover, -1);
            let legacy_days: u32 = before
                .iter()
                .map(|i| i.overlap_days(period.start, last_legacy_day))
                .sum();
            if legacy_days > self.rules.transitional_aggregate_limit_days {
                return Some((
                    AbsenceBreach::AggregateLimit,
                    OffendingWindow {
                        start: period.start,
                        end: last_legacy_day,
                        days: legacy_days,
                    },
                ));
            }
        }

        if period.end < cutover {
            return None;
        }
        self.rolling_check(&after, period.start.max(cutover), period.end)
            .map(|w| (AbsenceBreach::RollingLimit, w))
    }

    /// First rolling window starting in `[sweep_start, period_end - 12 months]`
    /// whose absence exceeds the limit.
    ///
    /// `intervals` must already be clipped to `[sweep_start, period_end]`.
    fn rolling_check(
        &self,
        intervals: &[AbsenceInterval],
        sweep_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Option<OffendingWindow> {
        let limit = self.rules.rolling_absence_limit_days;
        let months = self.rules.rolling_window_months;

        let total: u32 = intervals.iter().map(|i| i.days).sum();
        if total <= limit {
            return None;
        }

        let last_start = sub_months(period_end, months);
        if last_start < sweep_start {
            return intervals.iter().find(|i| i.days > limit).map(window_of);
        }

        let ledger = AbsenceLedger::new(intervals, sweep_start, period_end);
        let mut window_start = sweep_start;
        while window_start <= last_start {
            let window_end = add_months(window_start, months).min(period_end);
            let days = ledger.count(window_start, window_end);
            if days > limit {
                return Some(OffendingWindow {
                    start: window_start,
                    end: window_end,
                    days,
                });
            }
            trace!(window_start = %window_start, days, "rolling window within limit");
            match window_start.succ_opt() {
                Some(next) => window_start = next,
                None => break,
            }
        }
        None
    }
}

/// Absence days in the trailing window `[date - window months, date]`.
///
/// Used for charting; the verdict never depends on it.
pub fn trailing_absence(intervals: &[AbsenceInterval], date: NaiveDate, rules: &RuleSet) -> u32 {
    let from = sub_months(date, rules.rolling_window_months);
    intervals.iter().map(|i| i.overlap_days(from, date)).sum()
}

fn window_of(interval: &AbsenceInterval) -> OffendingWindow {
    OffendingWindow {
        start: interval.start,
        end: interval.end,
        days: interval.days,
    }
}

/// Prefix sums of absent days over a fixed range, so each window total is O(1)
struct AbsenceLedger {
    origin: NaiveDate,
    prefix: Vec<u32>,
}

impl AbsenceLedger {
    fn new(intervals: &[AbsenceInterval], from: NaiveDate, to: NaiveDate) -> Self {
        let len = (days_between(from, to).max(-1) + 1) as usize;
        let mut absent = vec![false; len];
        for interval in intervals {
            if let Some(clipped) = interval.clip(from, to) {
                let first = days_between(from, clipped.start) as usize;
                let last = days_between(from, clipped.end) as usize;
                absent[first..=last].iter_mut().for_each(|day| *day = true);
            }
        }

        let mut prefix = Vec::with_capacity(len + 1);
        prefix.push(0);
        let mut running = 0u32;
        for day in absent {
            running += u32::from(day);
            prefix.push(running);
        }
        Self { origin: from, prefix }
    }

    /// Absent days in the closed range `[from, to]`, clamped to the ledger
    fn count(&self, from: NaiveDate, to: NaiveDate) -> u32 {
        let max_index = self.prefix.len() as i64 - 1;
        let lo = days_between(self.origin, from).clamp(0, max_index) as usize;
        let hi = (days_between(self.origin, to) + 1).clamp(0, max_index) as usize;
        if hi <= lo {
            return 0;
        }
        self.prefix[hi] - self.prefix[lo]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Absence of `days` full days starting on `start`
    fn absence(start: NaiveDate, days: i64) -> AbsenceInterval {
        AbsenceInterval::new(start, add_days(start, days - 1)).unwrap()
    }

    fn evaluate(intervals: &[AbsenceInterval], date: NaiveDate, track: IlrTrack) -> Evaluation {
        let rules = RuleSet::default();
        QualifyingWindowEvaluator::new(&rules).evaluate(intervals, date, track)
    }

    #[test]
    fn test_no_absence_passes() {
        let result = evaluate(&[], d(2027, 12, 4), IlrTrack::Five);
        assert!(result.passed());
        assert_eq!(result.period.start, d(2022, 12, 4));
        assert_eq!(result.total_absence_days, 0);
    }

    #[test]
    fn test_exactly_180_days_passes() {
        let result = evaluate(&[absence(d(2023, 2, 2), 180)], d(2026, 1, 1), IlrTrack::Three);
        assert!(result.passed());
        assert_eq!(result.total_absence_days, 180);
    }

    #[test]
    fn test_181_days_fails_with_window() {
        let result = evaluate(&[absence(d(2023, 2, 2), 181)], d(2026, 1, 1), IlrTrack::Three);
        assert!(!result.passed());
        assert_eq!(result.breach, Some(AbsenceBreach::RollingLimit));
        let window = result.offending_windows[0];
        assert_eq!(window.days, 181);
        assert!(window.start <= d(2023, 2, 2));
    }

    #[test]
    fn test_split_absences_in_one_window_fail() {
        let intervals = [absence(d(2023, 3, 1), 100), absence(d(2023, 9, 1), 90)];
        let result = evaluate(&intervals, d(2026, 1, 1), IlrTrack::Three);
        assert_eq!(result.breach, Some(AbsenceBreach::RollingLimit));
        assert_eq!(result.offending_windows[0].days, 190);
    }

    #[test]
    fn test_spread_absences_pass() {
        // 120 days each, more than twelve months apart
        let intervals = [absence(d(2022, 1, 10), 120), absence(d(2023, 6, 1), 120)];
        let result = evaluate(&intervals, d(2026, 1, 1), IlrTrack::Five);
        assert!(result.passed());
        assert_eq!(result.total_absence_days, 240);
    }

    #[test]
    fn test_absence_clipped_to_period_start() {
        // 300 days, but only 150 of them fall inside the period
        let period_start = d(2021, 1, 1);
        let interval = absence(add_days(period_start, -150), 300);
        let result = evaluate(&[interval], d(2026, 1, 1), IlrTrack::Five);
        assert!(result.passed());
        assert_eq!(result.total_absence_days, 150);
    }

    #[test]
    fn test_transitional_single_absence_cap() {
        let ok = evaluate(&[absence(d(2020, 1, 1), 184)], d(2026, 1, 1), IlrTrack::Ten);
        assert!(ok.passed());

        let too_long = evaluate(&[absence(d(2020, 1, 1), 185)], d(2026, 1, 1), IlrTrack::Ten);
        assert_eq!(too_long.breach, Some(AbsenceBreach::SingleAbsence));
        assert_eq!(too_long.offending_windows[0].start, d(2020, 1, 1));
        assert_eq!(too_long.offending_windows[0].days, 185);
    }

    #[test]
    fn test_transitional_post_cutover_uses_rolling_rule() {
        let result = evaluate(&[absence(d(2024, 6, 1), 185)], d(2030, 1, 1), IlrTrack::Ten);
        assert_eq!(result.breach, Some(AbsenceBreach::RollingLimit));
        assert_eq!(result.offending_windows[0].days, 185);
    }

    #[test]
    fn test_transitional_aggregate_cap() {
        // Four absences of 150 days, one per year, all before the cutover
        let intervals: Vec<AbsenceInterval> = (2016..2020)
            .map(|year| absence(d(year, 2, 1), 150))
            .collect();
        let result = evaluate(&intervals, d(2025, 1, 1), IlrTrack::Ten);
        assert_eq!(result.breach, Some(AbsenceBreach::AggregateLimit));
        let window = result.offending_windows[0];
        assert_eq!(window.start, d(2015, 1, 1));
        assert_eq!(window.end, d(2024, 4, 10));
        assert_eq!(window.days, 600);
    }

    #[test]
    fn test_transitional_aggregate_at_cap_passes() {
        // 150 + 150 + 150 + 98 = 548
        let intervals = vec![
            absence(d(2016, 2, 1), 150),
            absence(d(2017, 2, 1), 150),
            absence(d(2018, 2, 1), 150),
            absence(d(2019, 2, 1), 98),
        ];
        let result = evaluate(&intervals, d(2025, 1, 1), IlrTrack::Ten);
        assert!(result.passed());
    }

    #[test]
    fn test_straddling_absence_not_double_counted() {
        // Starts before the cutover: judged by the per-absence cap only
        let straddle = absence(d(2024, 1, 1), 170);
        let after = absence(d(2024, 7, 1), 100);
        let result = evaluate(&[straddle, after], d(2030, 1, 1), IlrTrack::Ten);
        assert!(result.passed());
    }

    #[test]
    fn test_straddling_absence_stays_legacy_when_period_starts_after_cutover() {
        // Period starts 2024-05-01; clipping moves the straddling absence past
        // the cutover, but it still belongs to the legacy caps.
        let straddle = AbsenceInterval::new(d(2024, 1, 1), d(2024, 8, 1)).unwrap();
        let after = absence(d(2024, 9, 1), 100);
        let result = evaluate(&[straddle, after], d(2034, 5, 1), IlrTrack::Ten);
        assert_eq!(result.period.start, d(2024, 5, 1));
        assert!(result.passed());
        assert_eq!(result.total_absence_days, 93 + 100);
    }

    #[test]
    fn test_transitional_short_rolling_span_checks_each_absence() {
        // Less than 12 months between the cutover and the period end
        let long = evaluate(&[absence(d(2024, 5, 1), 181)], d(2024, 12, 1), IlrTrack::Ten);
        assert_eq!(long.breach, Some(AbsenceBreach::RollingLimit));
        assert_eq!(
            long.offending_windows,
            vec![OffendingWindow {
                start: d(2024, 5, 1),
                end: d(2024, 10, 28),
                days: 181,
            }]
        );

        // 190 days in total, but no single absence above the limit
        let split = evaluate(
            &[absence(d(2024, 5, 1), 100), absence(d(2024, 9, 1), 90)],
            d(2024, 12, 1),
            IlrTrack::Ten,
        );
        assert!(split.passed());
        assert_eq!(split.total_absence_days, 190);
    }

    #[test]
    fn test_message_mentions_limit() {
        let rules = RuleSet::default();
        let result = QualifyingWindowEvaluator::new(&rules).evaluate(
            &[absence(d(2023, 2, 2), 200)],
            d(2026, 1, 1),
            IlrTrack::Three,
        );
        let message = result.message(&rules).unwrap();
        assert!(message.contains("200 days"));
        assert!(message.contains("180"));
    }

    #[test]
    fn test_trailing_absence() {
        let rules = RuleSet::default();
        let intervals = [absence(d(2024, 1, 1), 10)];
        assert_eq!(trailing_absence(&intervals, d(2024, 6, 1), &rules), 10);
        assert_eq!(trailing_absence(&intervals, d(2024, 1, 5), &rules), 5);
        assert_eq!(trailing_absence(&intervals, d(2025, 6, 1), &rules), 0);
    }

    #[test]
    fn test_ledger_counts() {
        let intervals = [absence(d(2024, 1, 5), 3)];
        let ledger = AbsenceLedger::new(&intervals, d(2024, 1, 1), d(2024, 1, 31));
        assert_eq!(ledger.count(d(2024, 1, 1), d(2024, 1, 31)), 3);
        assert_eq!(ledger.count(d(2024, 1, 6), d(2024, 1, 6)), 1);
        assert_eq!(ledger.count(d(2023, 12, 1), d(2024, 1, 5)), 1);
        assert_eq!(ledger.count(d(2024, 2, 1), d(2024, 3, 1)), 0);
    }
}
