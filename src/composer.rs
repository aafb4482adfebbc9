//! Result composition
//!
//! Builds the externally consumed bundle from the outputs of the earlier
//! stages: summary counters, the rolling absence chart series, the per-day
//! presence timeline and trip bars. Nothing here influences the verdict.

use chrono::NaiveDate;

use crate::dates::{add_days, days_between, inclusive_days};
use crate::evaluator::trailing_absence;
use crate::resolver::Resolution;
use crate::rules::RuleSet;
use crate::types::{
    AbsenceInterval, AnnotatedTrip, IlrTrack, IneligibilityReason, PreEntryPeriod,
    RollingAbsencePoint, TimelinePoint, TravelCalculationResult, TravelSummary, TripBar,
    ValidationResult,
};

/// Result composer bound to a rule set and a reference "today"
pub struct ResultComposer<'a> {
    rules: &'a RuleSet,
    today: NaiveDate,
}

impl<'a> ResultComposer<'a> {
    pub fn new(rules: &'a RuleSet, today: NaiveDate) -> Self {
        Self { rules, today }
    }

    /// Bundle for input rejected before evaluation; all series stay empty
    pub fn rejected(
        &self,
        track: Option<IlrTrack>,
        annotated_trips: Vec<AnnotatedTrip>,
        pre_entry_period: PreEntryPeriod,
        reason: IneligibilityReason,
    ) -> TravelCalculationResult {
        let summary = self.base_summary(track, &annotated_trips, &pre_entry_period);
        TravelCalculationResult {
            annotated_trips,
            pre_entry_period,
            validation: ValidationResult::ineligible(reason),
            summary,
            rolling_absence_series: Vec::new(),
            timeline_points: Vec::new(),
            trip_bars: Vec::new(),
        }
    }

    /// Bundle for an evaluated assessment
    pub fn compose(
        &self,
        track: IlrTrack,
        annotated_trips: Vec<AnnotatedTrip>,
        pre_entry_period: PreEntryPeriod,
        intervals: &[AbsenceInterval],
        resolution: Resolution,
    ) -> TravelCalculationResult {
        let mut summary = self.base_summary(Some(track), &annotated_trips, &pre_entry_period);
        let application_date = resolution.validation.application_date();

        summary.assessment_mode = resolution.mode;
        summary.qualifying_start_date = Some(resolution.qualifying_start);
        summary.earliest_application_date = Some(resolution.earliest_application_date);
        summary.application_date = application_date;
        summary.days_until_eligible =
            application_date.map(|date| days_between(self.today, date).max(0));
        summary.has_exceeded_allowed_absence = matches!(
            resolution.validation.reason(),
            Some(IneligibilityReason::ExcessiveAbsence { .. })
        );
        summary.search_horizon_exhausted = resolution.search_horizon_exhausted;

        let (range_start, range_end) = observed_range(
            &annotated_trips,
            resolution.qualifying_start,
            application_date.unwrap_or(resolution.earliest_application_date),
        );
        summary.max_rolling_absence = self.max_rolling_absence(intervals, range_start, range_end);

        let rolling_absence_series = self.rolling_series(intervals, range_start, range_end);
        let timeline_points = self.timeline(&annotated_trips, intervals, range_start, range_end);
        let trip_bars = trip_bars(&annotated_trips);

        TravelCalculationResult {
            annotated_trips,
            pre_entry_period,
            validation: resolution.validation,
            summary,
            rolling_absence_series,
            timeline_points,
            trip_bars,
        }
    }

    fn base_summary(
        &self,
        track: Option<IlrTrack>,
        trips: &[AnnotatedTrip],
        pre_entry: &PreEntryPeriod,
    ) -> TravelSummary {
        let incomplete_trips = trips.iter().filter(|t| t.is_incomplete).count();
        TravelSummary {
            track,
            total_trips: trips.len(),
            complete_trips: trips.len() - incomplete_trips,
            incomplete_trips,
            total_full_days: trips.iter().filter_map(|t| t.full_days).sum(),
            pre_entry_absence_days: if pre_entry.has_gap {
                pre_entry.delay_days.max(0) as u32
            } else {
                0
            },
            qualifying_start_date: pre_entry.qualifying_start_date,
            ..TravelSummary::default()
        }
    }

    /// Highest trailing-window absence, sampled every few days
    fn max_rolling_absence(
        &self,
        intervals: &[AbsenceInterval],
        start: NaiveDate,
        end: NaiveDate,
    ) -> u32 {
        let span = inclusive_days(start, end).min(self.rules.rolling_series_max_days);
        let stride = self.rules.risk_sample_stride_days.max(1);
        let mut max = 0;
        let mut offset = 0;
        while offset < span {
            let date = add_days(start, i64::from(offset));
            max = max.max(trailing_absence(intervals, date, self.rules));
            offset += stride;
        }
        if span > 0 {
            let last = add_days(start, i64::from(span - 1));
            max = max.max(trailing_absence(intervals, last, self.rules));
        }
        max
    }

    /// Decimated trailing-window absence series for charting
    fn rolling_series(
        &self,
        intervals: &[AbsenceInterval],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<RollingAbsencePoint> {
        let span = inclusive_days(start, end).min(self.rules.rolling_series_max_days);
        if span == 0 {
            return Vec::new();
        }
        let stride = (span / self.rules.rolling_series_points.max(1)).max(1);
        (0..span)
            .step_by(stride as usize)
            .map(|offset| {
                let date = add_days(start, i64::from(offset));
                RollingAbsencePoint {
                    date,
                    days: trailing_absence(intervals, date, self.rules),
                }
            })
            .collect()
    }

    /// One point per day: presence and trips departed so far
    fn timeline(
        &self,
        trips: &[AnnotatedTrip],
        intervals: &[AbsenceInterval],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<TimelinePoint> {
        let span = inclusive_days(start, end).min(self.rules.timeline_max_days);
        let mut departures: Vec<NaiveDate> = trips
            .iter()
            .filter_map(AnnotatedTrip::dates)
            .map(|(out, _)| out)
            .collect();
        departures.sort();

        let mut points = Vec::with_capacity(span as usize);
        let mut next_interval = 0;
        let mut departed = 0;
        for offset in 0..span {
            let date = add_days(start, i64::from(offset));
            while next_interval < intervals.len() && intervals[next_interval].end < date {
                next_interval += 1;
            }
            while departed < departures.len() && departures[departed] <= date {
                departed += 1;
            }
            let absent = intervals[next_interval..]
                .iter()
                .take_while(|i| i.start <= date)
                .any(|i| i.contains(date));
            points.push(TimelinePoint {
                date,
                present: !absent,
                trip_count: departed as u32,
            });
        }
        points
    }
}

/// Range covering the qualifying start, every complete trip and the target date
fn observed_range(
    trips: &[AnnotatedTrip],
    qualifying_start: NaiveDate,
    target: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    trips
        .iter()
        .filter_map(AnnotatedTrip::dates)
        .fold((qualifying_start, target), |(start, end), (out, back)| {
            (start.min(out), end.max(back))
        })
}

fn trip_bars(trips: &[AnnotatedTrip]) -> Vec<TripBar> {
    trips
        .iter()
        .filter_map(|t| {
            let (start, end) = t.dates()?;
            Some(TripBar {
                id: t.trip.id.clone(),
                start,
                end,
                full_days: t.full_days.unwrap_or(0),
                out_route: t.trip.out_route.clone(),
                in_route: t.trip.in_route.clone(),
            })
        })
        .collect()
}
