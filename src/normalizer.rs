//! Trip normalization
//!
//! This module annotates raw trip records with derived day counts.
//! - Calendar difference between return and departure
//! - Full days abroad (travel days excluded)
//! - Incomplete-entry detection

use crate::dates::{days_between, parse_date};
use crate::types::{AnnotatedTrip, TripRecord};

/// Normalizer for converting raw trips to annotated trips
pub struct TripNormalizer;

impl TripNormalizer {
    /// Annotate every trip, preserving length and order
    pub fn normalize(trips: &[TripRecord]) -> Vec<AnnotatedTrip> {
        trips.iter().map(annotate_trip).collect()
    }

    /// Number of trips that could not be annotated
    pub fn count_incomplete(trips: &[AnnotatedTrip]) -> usize {
        trips.iter().filter(|t| t.is_incomplete).count()
    }
}

fn annotate_trip(trip: &TripRecord) -> AnnotatedTrip {
    match (parse_date(&trip.out_date), parse_date(&trip.in_date)) {
        (Some(out), Some(back)) => {
            let calendar_days = days_between(out, back);
            AnnotatedTrip {
                trip: trip.clone(),
                calendar_days: Some(calendar_days),
                full_days: Some(full_days(calendar_days)),
                is_incomplete: false,
            }
        }
        _ => AnnotatedTrip {
            trip: trip.clone(),
            calendar_days: None,
            full_days: None,
            is_incomplete: true,
        },
    }
}

/// Departure and return days are never counted as absence
fn full_days(calendar_days: i64) -> i64 {
    (calendar_days - 1).max(0)
}
