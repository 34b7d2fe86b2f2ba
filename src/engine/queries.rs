use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};

use crate::model::{Booking, BorrowSession, HistoryEntry};

use super::{conflict, custody, Engine, EngineError};

impl Engine {
    // ── Reservations ─────────────────────────────────────────

    /// Per-slot availability probe over the current dataset.
    pub async fn is_slot_taken(&self, venue: &str, date: NaiveDate, time: NaiveTime) -> bool {
        let state = self.state.read().await;
        conflict::is_slot_taken(&state.bookings, venue, date, time)
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.read().await.bookings.clone()
    }

    /// Bookings active on a given date, for the day view.
    pub async fn bookings_on(&self, date: NaiveDate) -> Vec<Booking> {
        let state = self.state.read().await;
        state
            .bookings
            .iter()
            .filter(|b| b.active_on(date))
            .cloned()
            .collect()
    }

    pub async fn bookings_for_applicant(&self, applicant: &str) -> Vec<Booking> {
        let state = self.state.read().await;
        state
            .bookings
            .iter()
            .filter(|b| b.applicant == applicant)
            .cloned()
            .collect()
    }

    /// Dates of a booking still open to cancellation right now.
    pub async fn cancellable_dates(&self, id: &str) -> Result<BTreeSet<NaiveDate>, EngineError> {
        let state = self.state.read().await;
        let booking = state
            .booking(id)
            .ok_or_else(|| EngineError::NotFound(id.to_owned()))?;
        Ok(conflict::cancellable_dates(
            booking,
            chrono::Local::now().naive_local(),
        ))
    }

    // ── Resource custody ─────────────────────────────────────

    /// Ids of items currently out, derived from open sessions.
    pub async fn borrowed_items(&self) -> BTreeSet<String> {
        let state = self.state.read().await;
        custody::borrowed_item_ids(&state.sessions)
    }

    pub async fn is_item_borrowed(&self, item_id: &str) -> bool {
        self.borrowed_items().await.contains(item_id)
    }

    /// Current accountable holder of a session's outstanding items.
    pub async fn current_holder_of(&self, session_id: &str) -> Result<String, EngineError> {
        let state = self.state.read().await;
        let session = state
            .session(session_id)
            .ok_or_else(|| EngineError::NotFound(session_id.to_owned()))?;
        Ok(custody::current_holder(session).to_owned())
    }

    pub async fn active_sessions(&self) -> Vec<BorrowSession> {
        self.state.read().await.sessions.clone()
    }

    /// Return-event audit log, newest first.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.state.read().await.history.clone()
    }
}
