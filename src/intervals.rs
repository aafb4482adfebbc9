//! Absence interval construction
//!
//! Converts complete trips and the optional pre-entry gap into a sorted list of
//! closed day ranges spent abroad. The same full-day boundary rule applies to
//! both sources: a trip contributes `[out + 1, in - 1]`, the pre-entry gap
//! contributes `[visa start, entry - 1]`.

use chrono::NaiveDate;

use crate::dates::{add_days, days_between, inclusive_days, intersect};
use crate::rules::RuleSet;
use crate::types::{AbsenceInterval, AnnotatedTrip, PreEntryPeriod};

impl AbsenceInterval {
    /// Build a closed interval; degenerate ranges (`start > end`) yield `None`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then(|| AbsenceInterval {
            start,
            end,
            days: inclusive_days(start, end),
        })
    }

    /// Portion of this interval inside `[from, to]`
    pub fn clip(&self, from: NaiveDate, to: NaiveDate) -> Option<Self> {
        intersect(self.start, self.end, from, to).and_then(|(s, e)| Self::new(s, e))
    }

    /// Absence days shared with `[from, to]`
    pub fn overlap_days(&self, from: NaiveDate, to: NaiveDate) -> u32 {
        self.clip(from, to).map(|i| i.days).unwrap_or(0)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Derive the pre-entry period from the visa issue and entry dates
pub fn pre_entry_period(
    visa_start: Option<NaiveDate>,
    entry: Option<NaiveDate>,
    rules: &RuleSet,
) -> PreEntryPeriod {
    match (visa_start, entry) {
        (Some(visa), Some(entry)) => {
            let delay_days = days_between(visa, entry);
            let has_gap = delay_days > 0;
            let can_count = delay_days <= i64::from(rules.max_pre_entry_delay_days);
            PreEntryPeriod {
                visa_start_date: Some(visa),
                entry_date: Some(entry),
                has_gap,
                delay_days: delay_days.max(0),
                can_count_toward_period: has_gap && can_count,
                qualifying_start_date: Some(if has_gap && can_count { visa } else { entry }),
            }
        }
        (Some(visa), None) => PreEntryPeriod {
            visa_start_date: Some(visa),
            qualifying_start_date: Some(visa),
            ..PreEntryPeriod::default()
        },
        (None, Some(entry)) => PreEntryPeriod {
            entry_date: Some(entry),
            qualifying_start_date: Some(entry),
            ..PreEntryPeriod::default()
        },
        (None, None) => PreEntryPeriod::default(),
    }
}

/// Builder for sorted absence intervals
pub struct IntervalBuilder;

impl IntervalBuilder {
    /// Build intervals from complete trips plus the pre-entry gap, if any.
    ///
    /// Incomplete trips are skipped; callers are expected to have rejected
    /// them before evaluation.
    pub fn build(trips: &[AnnotatedTrip], pre_entry: Option<&PreEntryPeriod>) -> Vec<AbsenceInterval> {
        let mut intervals: Vec<AbsenceInterval> = trips
            .iter()
            .filter_map(AnnotatedTrip::dates)
            .filter_map(|(out, back)| AbsenceInterval::new(add_days(out, 1), add_days(back, -1)))
            .collect();

        if let Some(gap) = pre_entry.and_then(pre_entry_interval) {
            intervals.push(gap);
        }

        intervals.sort_by_key(|i| (i.start, i.end));
        merge_overlapping(intervals)
    }

    /// Total days across a set of intervals
    pub fn total_days(intervals: &[AbsenceInterval]) -> u32 {
        intervals.iter().map(|i| i.days).sum()
    }
}

/// Coalesce intervals sharing at least one day, so no day is counted twice.
/// A trip logged inside the pre-entry gap is the usual source. Touching
/// intervals stay separate.
fn merge_overlapping(sorted: Vec<AbsenceInterval>) -> Vec<AbsenceInterval> {
    let mut merged: Vec<AbsenceInterval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                if interval.end > last.end {
                    last.end = interval.end;
                    last.days = inclusive_days(last.start, last.end);
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// The visa issue day counts as absence; the entry day counts as presence
fn pre_entry_interval(period: &PreEntryPeriod) -> Option<AbsenceInterval> {
    if !period.has_gap {
        return None;
    }
    let (visa, entry) = (period.visa_start_date?, period.entry_date?);
    AbsenceInterval::new(visa, add_days(entry, -1))
}
