use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use ulid::Ulid;

use crate::catalog;
use crate::images::{self, ImagePayload};
use crate::limits::PASSWORD_LEN;
use crate::model::{stamp, Booking, BorrowSession, NewBooking, ReturnedCondition};
use crate::normalize;
use crate::observability;
use crate::remote::Request;

use super::{cancel, custody, Engine, EngineError, SettleHandle};

/// In-flight keys for creations, which have no entity id visible to later
/// callers until the mutation settles.
const BOOKINGS_KEY: &str = "bookings";
const SESSIONS_KEY: &str = "sessions";

fn local_now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

impl Engine {
    /// Replace local state with a fresh normalized read. Used at startup
    /// and by the periodic refresh; mutations reconcile on their own.
    pub async fn load(&self) -> Result<(), EngineError> {
        let raw = self.remote.fetch_all().await?;
        let fresh = normalize::normalize_dataset(raw);
        self.state.write().await.replace_with(fresh);
        metrics::counter!(observability::RECONCILIATIONS_TOTAL).increment(1);
        Ok(())
    }

    // ── Reservations ─────────────────────────────────────────

    /// Create a reservation. Returns the locally assigned id and the settle
    /// handle; the booking is already visible to queries when this returns.
    pub async fn book_venue(
        &self,
        new: NewBooking,
    ) -> Result<(String, SettleHandle), EngineError> {
        if new.password.len() != PASSWORD_LEN
            || !new.password.chars().all(|c| c.is_ascii_digit())
        {
            return Err(EngineError::InvalidPassword);
        }
        if !catalog::is_known_venue(&new.venue) {
            return Err(EngineError::UnknownVenue(new.venue));
        }
        if new.start_date > new.end_date {
            return Err(EngineError::InvalidDateRange);
        }
        let guard = self.try_begin(BOOKINGS_KEY)?;

        let booking = Booking {
            id: Ulid::new().to_string(),
            venue: new.venue,
            start_date: new.start_date,
            end_date: new.end_date,
            start_time: new.start_time,
            end_time: new.end_time,
            applicant: new.applicant,
            dept: new.dept,
            car_model: new.car_model,
            purpose: new.purpose,
            password: new.password,
            excluded_dates: BTreeSet::new(),
        };
        let id = booking.id.clone();

        let mut state = self.state.write().await;
        let snapshot = state.snapshot();
        state.bookings.push(booking.clone());
        drop(state);

        let request = Request::BookVenue { booking };
        let handle = self.settle(id.clone(), snapshot, request, guard);
        Ok((id, handle))
    }

    /// Cancel selected dates of a booking, deleting it when the selection
    /// covers every remaining valid date. All-or-nothing on validation.
    pub async fn cancel_booking(
        &self,
        id: &str,
        password: &str,
        dates: BTreeSet<NaiveDate>,
    ) -> Result<SettleHandle, EngineError> {
        let guard = self.try_begin(id)?;

        let mut state = self.state.write().await;
        let booking = state
            .booking(id)
            .ok_or_else(|| EngineError::NotFound(id.to_owned()))?;
        let plan = cancel::propose_cancellation(booking, &dates, password, local_now())?;

        let snapshot = state.snapshot();
        match plan {
            cancel::CancelPlan::Delete => {
                state.remove_booking(id);
            }
            cancel::CancelPlan::Exclude(excluded) => {
                if let Some(b) = state.booking_mut(id) {
                    b.excluded_dates = excluded;
                }
            }
        }
        drop(state);

        let request = Request::CancelBooking {
            id: id.to_owned(),
            password: password.to_owned(),
            dates_to_remove: dates.into_iter().collect(),
        };
        Ok(self.settle(id.to_owned(), snapshot, request, guard))
    }

    // ── Resource custody ─────────────────────────────────────

    /// Open a borrow session for a set of catalog items. Every item must be
    /// in stock; the whole selection is rejected otherwise.
    pub async fn borrow_items(
        &self,
        items: Vec<String>,
        borrower: String,
        dept: String,
    ) -> Result<(String, SettleHandle), EngineError> {
        let guard = self.try_begin(SESSIONS_KEY)?;

        let mut state = self.state.write().await;
        custody::validate_borrow(&items, &state.sessions)?;

        let session = BorrowSession {
            id: Ulid::new().to_string(),
            items,
            borrower,
            dept,
            borrow_time: stamp(local_now()),
            transfer_logs: Vec::new(),
            returned_items: BTreeMap::new(),
        };
        let id = session.id.clone();

        let snapshot = state.snapshot();
        state.sessions.push(session.clone());
        drop(state);

        let request = Request::BorrowItems { session };
        let handle = self.settle(id.clone(), snapshot, request, guard);
        Ok((id, handle))
    }

    /// Hand custody of a whole session to a new holder. Return status is
    /// unaffected.
    pub async fn transfer_session(
        &self,
        session_id: &str,
        new_holder: &str,
    ) -> Result<SettleHandle, EngineError> {
        let guard = self.try_begin(session_id)?;

        let mut state = self.state.write().await;
        let snapshot = state.snapshot();
        let time = stamp(local_now());
        let session = state
            .session_mut(session_id)
            .ok_or_else(|| EngineError::NotFound(session_id.to_owned()))?;
        let from = custody::current_holder(session).to_owned();
        custody::apply_transfer(session, new_holder, time.clone());
        drop(state);

        let request = Request::TransferItems {
            session_id: session_id.to_owned(),
            from,
            to: new_holder.to_owned(),
            time,
        };
        Ok(self.settle(
            session_id.to_owned(),
            snapshot,
            request,
            guard,
        ))
    }

    /// Return some or all outstanding items of a session. Emits one audit
    /// entry for this event and closes the session once nothing is left out.
    pub async fn return_items(
        &self,
        session_id: &str,
        details: BTreeMap<String, ReturnedCondition>,
        returner: &str,
        notes: &str,
    ) -> Result<SettleHandle, EngineError> {
        let guard = self.try_begin(session_id)?;

        let mut state = self.state.write().await;
        {
            let session = state
                .session(session_id)
                .ok_or_else(|| EngineError::NotFound(session_id.to_owned()))?;
            custody::validate_return(session, &details)?;
        }
        for condition in details.values() {
            for photo in &condition.photos {
                images::validate_photo(photo)?;
            }
        }

        let snapshot = state.snapshot();
        let time = stamp(local_now());
        let uploads = images::evidence_images(&details);
        let session = state
            .session_mut(session_id)
            .ok_or_else(|| EngineError::NotFound(session_id.to_owned()))?;
        let outcome =
            custody::apply_return(session, details.clone(), returner, notes, time.clone());
        if outcome.session_closed {
            state.remove_session(session_id);
        }
        state.push_history(outcome.history);
        drop(state);

        let request = Request::ReturnItems {
            session_id: session_id.to_owned(),
            returner: returner.to_owned(),
            return_time: time,
            item_details: details,
            notes: notes.to_owned(),
            images: uploads,
        };
        Ok(self.settle(
            session_id.to_owned(),
            snapshot,
            request,
            guard,
        ))
    }

    /// One-shot photo upload outside the optimistic cycle: no local state
    /// to mutate, so the call is awaited directly.
    pub async fn upload_image(&self, image: ImagePayload) -> Result<(), EngineError> {
        images::validate_photo(&image.base64)?;
        let request = Request::UploadImage { image };
        let op = request.op();
        let result = self.remote.execute(request).await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            observability::REMOTE_REQUESTS_TOTAL,
            "op" => op, "status" => status
        )
        .increment(1);
        if result.is_err() {
            metrics::counter!(observability::REMOTE_FAILURES_TOTAL, "op" => op).increment(1);
        }
        result
    }
}
