use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Serde for half-hour clock times as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(de)?;
        NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

/// Wall-clock stamp used on custody records, `YYYY/MM/DD HH:MM`.
/// Opaque to the core: stamps are recorded and displayed, never compared.
pub fn stamp(dt: chrono::NaiveDateTime) -> String {
    dt.format("%Y/%m/%d %H:%M").to_string()
}

// ── Reservations ─────────────────────────────────────────────────

/// A venue reservation over an inclusive date range with a daily time window.
///
/// The password is a plaintext five-digit shared secret gating cancellation.
/// That is the deployed contract; a hardened deployment would store a hash
/// and compare digests instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub venue: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Exclusive: a booking ending 17:30 leaves the 17:30 slot free.
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub applicant: String,
    pub dept: String,
    #[serde(default)]
    pub car_model: String,
    #[serde(default)]
    pub purpose: String,
    pub password: String,
    /// Dates inside the range that were individually cancelled.
    #[serde(default)]
    pub excluded_dates: BTreeSet<NaiveDate>,
}

impl Booking {
    /// Every calendar date in `[start_date, end_date]`, in order.
    pub fn date_range(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut d = self.start_date;
        while d <= self.end_date {
            dates.push(d);
            match d.succ_opt() {
                Some(next) => d = next,
                None => break,
            }
        }
        dates
    }

    /// Dates in range that have not been individually cancelled.
    pub fn valid_dates(&self) -> BTreeSet<NaiveDate> {
        self.date_range()
            .into_iter()
            .filter(|d| !self.excluded_dates.contains(d))
            .collect()
    }

    /// True if `date` is in range and not excluded.
    pub fn active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date && !self.excluded_dates.contains(&date)
    }
}

/// Caller-supplied fields for a new reservation; the engine assigns the id
/// and starts with no exclusions.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub venue: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub applicant: String,
    pub dept: String,
    pub car_model: String,
    pub purpose: String,
    pub password: String,
}

// ── Resource custody ─────────────────────────────────────────────

/// Item category. `Tool` items require photographic condition evidence on
/// return; the other categories record whatever the returner supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "門鎖類")]
    Lock,
    #[serde(rename = "工具類")]
    Tool,
    #[serde(rename = "設備類")]
    Equipment,
}

/// One custody handoff inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLog {
    pub from: String,
    pub to: String,
    pub time: String,
}

/// Condition recorded for one item at return time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnedCondition {
    pub is_intact: bool,
    #[serde(default)]
    pub photos: Vec<String>,
}

/// `ReturnedCondition` plus who returned it and when. Lives in the
/// session's `returned_items` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReturnDetail {
    pub is_intact: bool,
    #[serde(default)]
    pub photos: Vec<String>,
    pub returner: String,
    pub time: String,
}

/// Active custody record from initial borrow until every item is returned.
///
/// Invariant: every key of `returned_items` is an element of `items`.
/// The session leaves the active set the moment the last item is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowSession {
    pub id: String,
    pub items: Vec<String>,
    pub borrower: String,
    pub dept: String,
    pub borrow_time: String,
    #[serde(default)]
    pub transfer_logs: Vec<TransferLog>,
    #[serde(default)]
    pub returned_items: BTreeMap<String, ItemReturnDetail>,
}

impl BorrowSession {
    /// Items still out, in borrow order.
    pub fn outstanding_items(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|id| !self.returned_items.contains_key(*id))
            .map(String::as_str)
            .collect()
    }

    pub fn is_fully_returned(&self) -> bool {
        self.items.iter().all(|id| self.returned_items.contains_key(id))
    }
}

/// Immutable audit snapshot of one return event. A session that closes over
/// several return events produces several entries with the same session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub session_id: String,
    pub borrower: String,
    pub borrow_time: String,
    pub returner: String,
    pub return_time: String,
    #[serde(default)]
    pub notes: String,
    /// Transfer chain as it stood at return time.
    #[serde(default)]
    pub transfer_logs: Vec<TransferLog>,
    /// Only the items returned in this event, not the session's full list.
    #[serde(default)]
    pub items: BTreeMap<String, ReturnedCondition>,
}
