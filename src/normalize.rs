//! Turns the remote's raw spreadsheet rows into the typed dataset.
//!
//! Sheet cells round-trip through the remote's date handling, so a value
//! written as `08:00` can come back as a full RFC 3339 instant anchored on
//! the sheet epoch (`1899-12-30T00:00:00.000Z`). Normalization accepts both
//! shapes, converts instants to local wall-clock, and skips rows it cannot
//! make sense of rather than failing the whole read.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Timelike};

use crate::engine::AppState;
use crate::model::{Booking, BorrowSession, HistoryEntry, ReturnedCondition};
use crate::observability;
use crate::remote::{RawBooking, RawDataset, RawHistory, RawSession};

/// `YYYY-MM-DD`, `YYYY/MM/DD`, or an RFC 3339 instant taken in local time.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y/%m/%d") {
        return Some(d);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Local).date_naive())
}

/// `HH:MM`, `HH:MM:SS`, or an RFC 3339 instant whose local wall-clock time
/// is taken and truncated to the minute.
pub fn normalize_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if let Ok(t) = NaiveTime::parse_from_str(raw, "%H:%M") {
        return Some(t);
    }
    if let Ok(t) = NaiveTime::parse_from_str(raw, "%H:%M:%S") {
        return Some(t);
    }
    let local = DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Local);
    NaiveTime::from_hms_opt(local.hour(), local.minute(), 0)
}

fn normalize_booking(raw: RawBooking) -> Option<Booking> {
    let start_date = normalize_date(&raw.start_date)?;
    let end_date = normalize_date(&raw.end_date)?;
    let start_time = normalize_time(&raw.start_time)?;
    let end_time = normalize_time(&raw.end_time)?;
    // Excluded dates must stay inside the booking's range; the remote is
    // not trusted to uphold that.
    let mut excluded_dates = BTreeSet::new();
    for raw_date in &raw.excluded_dates {
        let Some(date) = normalize_date(raw_date) else {
            continue;
        };
        if date < start_date || date > end_date {
            tracing::warn!(id = %raw.id, %date, "dropping excluded date outside the booking range");
            continue;
        }
        excluded_dates.insert(date);
    }
    Some(Booking {
        id: raw.id,
        venue: raw.venue,
        start_date,
        end_date,
        start_time,
        end_time,
        applicant: raw.applicant,
        dept: raw.dept,
        car_model: raw.car_model,
        purpose: raw.purpose,
        password: raw.password,
        excluded_dates,
    })
}

fn normalize_session(raw: RawSession) -> BorrowSession {
    BorrowSession {
        id: raw.id,
        items: raw.items,
        borrower: raw.borrower,
        dept: raw.dept,
        borrow_time: raw.borrow_time,
        transfer_logs: raw.transfer_logs,
        returned_items: raw.returned_items,
    }
}

/// Decode the per-item condition blob. A missing or malformed blob degrades
/// to an empty map; the rest of the row is still usable.
fn parse_history_items(entry_id: &str, blob: Option<&str>) -> BTreeMap<String, ReturnedCondition> {
    let Some(blob) = blob else {
        return BTreeMap::new();
    };
    match serde_json::from_str(blob) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(entry_id, error = %e, "unparseable history status blob");
            metrics::counter!(observability::HISTORY_PARSE_FAILURES_TOTAL).increment(1);
            BTreeMap::new()
        }
    }
}

fn normalize_history(raw: RawHistory) -> HistoryEntry {
    let items = parse_history_items(&raw.id, raw.status_json.as_deref());
    HistoryEntry {
        id: raw.id,
        session_id: raw.session_id,
        borrower: raw.borrower,
        borrow_time: raw.borrow_time,
        returner: raw.returner,
        return_time: raw.return_time,
        notes: raw.notes,
        transfer_logs: raw.transfer_logs,
        items,
    }
}

/// Full-dataset normalization. Bookings that fail date/time normalization
/// are dropped with a warning; sessions and history rows are always kept.
pub fn normalize_dataset(raw: RawDataset) -> AppState {
    let mut state = AppState::new();
    for booking in raw.venues {
        let id = booking.id.clone();
        match normalize_booking(booking) {
            Some(b) => state.bookings.push(b),
            None => tracing::warn!(id = %id, "skipping booking with unparseable dates"),
        }
    }
    state.sessions = raw
        .resource_sessions
        .into_iter()
        .map(normalize_session)
        .collect();
    state.history = raw
        .resource_history
        .into_iter()
        .map(normalize_history)
        .collect();
    state
}
