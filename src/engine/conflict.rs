use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::model::Booking;

/// Pure slot probe: is `venue` taken at `date`, slot `time`?
///
/// Taken iff some booking matches the venue, covers the date (and the date
/// is not excluded), and `start_time <= time < end_time`. Half-open on
/// time: a booking ending 17:30 does not collide with a 17:30 start.
pub fn is_slot_taken(bookings: &[Booking], venue: &str, date: NaiveDate, time: NaiveTime) -> bool {
    bookings.iter().any(|b| {
        b.venue == venue && b.active_on(date) && b.start_time <= time && time < b.end_time
    })
}

/// A date's reserved window has begun once `now` reaches the instant formed
/// from that date and the booking's daily start time. From then on the date
/// can no longer be cancelled, even if later dates of the same booking
/// remain open.
pub fn day_started(date: NaiveDate, start_time: NaiveTime, now: NaiveDateTime) -> bool {
    now >= date.and_time(start_time)
}

/// Dates of `booking` that are still valid (in range, not excluded) and
/// whose daily window has not yet begun.
pub fn cancellable_dates(booking: &Booking, now: NaiveDateTime) -> BTreeSet<NaiveDate> {
    booking
        .valid_dates()
        .into_iter()
        .filter(|d| !day_started(*d, booking.start_time, now))
        .collect()
}
