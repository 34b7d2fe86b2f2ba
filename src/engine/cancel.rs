use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::Booking;

use super::conflict::cancellable_dates;
use super::EngineError;

/// What a valid cancellation request does to the booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelPlan {
    /// Selection covered every remaining valid date: remove the booking.
    Delete,
    /// Strict subset: the booking survives with this full exclusion set.
    Exclude(BTreeSet<NaiveDate>),
}

/// Validate a cancellation and compute the resulting mutation without
/// applying it. All-or-nothing: any rejection leaves the booking untouched.
///
/// Selection rules come first (`NoCancellableDates`), then the shared-secret
/// check (`BadPassword`). A date whose reserved window has begun is never
/// cancellable, even when later dates of the same booking still are.
pub fn propose_cancellation(
    booking: &Booking,
    selected: &BTreeSet<NaiveDate>,
    password: &str,
    now: NaiveDateTime,
) -> Result<CancelPlan, EngineError> {
    if selected.is_empty() {
        return Err(EngineError::NoCancellableDates);
    }
    let cancellable = cancellable_dates(booking, now);
    if !selected.is_subset(&cancellable) {
        return Err(EngineError::NoCancellableDates);
    }
    if password != booking.password {
        return Err(EngineError::BadPassword);
    }

    let valid = booking.valid_dates();
    if *selected == valid {
        Ok(CancelPlan::Delete)
    } else {
        let mut excluded = booking.excluded_dates.clone();
        excluded.extend(selected.iter().copied());
        Ok(CancelPlan::Exclude(excluded))
    }
}
