//! Per-item custody within a session: InStock → Borrowed → [Transferred]* →
//! Returned. The functions here are pure; the engine owns when they run.

use std::collections::{BTreeMap, BTreeSet};

use ulid::Ulid;

use crate::catalog;
use crate::limits::MAX_PHOTOS_PER_ITEM;
use crate::model::{
    BorrowSession, Category, HistoryEntry, ItemReturnDetail, ReturnedCondition,
};

use super::EngineError;

/// Who is currently accountable for the session's items: the `to` of the
/// last transfer, else the original borrower.
pub fn current_holder(session: &BorrowSession) -> &str {
    session
        .transfer_logs
        .last()
        .map(|log| log.to.as_str())
        .unwrap_or(&session.borrower)
}

/// Derived, never stored: ids of items that are out in some open session
/// and not yet returned there.
pub fn borrowed_item_ids(sessions: &[BorrowSession]) -> BTreeSet<String> {
    sessions
        .iter()
        .flat_map(|s| s.outstanding_items().into_iter().map(str::to_owned))
        .collect()
}

/// Check a borrow selection against the catalog and the derived borrowed
/// set. An item may be `Borrowed` in at most one open session at a time.
pub fn validate_borrow(
    items: &[String],
    sessions: &[BorrowSession],
) -> Result<(), EngineError> {
    if items.is_empty() {
        return Err(EngineError::EmptySelection);
    }
    let out = borrowed_item_ids(sessions);
    for id in items {
        if catalog::item(id).is_none() {
            return Err(EngineError::UnknownItem(id.clone()));
        }
        if out.contains(id) {
            return Err(EngineError::ItemUnavailable(id.clone()));
        }
    }
    Ok(())
}

/// Check a return's item details against the session: only not-yet-returned
/// items of this session, photo cap, and the tool-category photo mandate.
pub fn validate_return(
    session: &BorrowSession,
    details: &BTreeMap<String, ReturnedCondition>,
) -> Result<(), EngineError> {
    if details.is_empty() {
        return Err(EngineError::EmptySelection);
    }
    for (id, condition) in details {
        if !session.items.contains(id) {
            return Err(EngineError::UnknownItem(id.clone()));
        }
        if session.returned_items.contains_key(id) {
            return Err(EngineError::AlreadyReturned(id.clone()));
        }
        if condition.photos.len() > MAX_PHOTOS_PER_ITEM {
            return Err(EngineError::TooManyPhotos(id.clone()));
        }
        if catalog::item_category(id) == Some(Category::Tool) && condition.photos.is_empty() {
            return Err(EngineError::MissingPhotos(id.clone()));
        }
    }
    Ok(())
}

/// Append a custody handoff. Return status is untouched; only
/// accountability changes.
pub fn apply_transfer(session: &mut BorrowSession, new_holder: &str, time: String) {
    let from = current_holder(session).to_owned();
    session.transfer_logs.push(crate::model::TransferLog {
        from,
        to: new_holder.to_owned(),
        time,
    });
}

pub struct ReturnOutcome {
    pub history: HistoryEntry,
    /// True once every item of the session has a return record; the caller
    /// then drops the session from the active set.
    pub session_closed: bool,
}

/// Merge one return event into the session and produce its audit entry.
/// The entry carries exactly the items returned in this event plus a copy
/// of the transfer chain as it stood. Caller has already validated.
pub fn apply_return(
    session: &mut BorrowSession,
    details: BTreeMap<String, ReturnedCondition>,
    returner: &str,
    notes: &str,
    time: String,
) -> ReturnOutcome {
    let history = HistoryEntry {
        id: Ulid::new().to_string(),
        session_id: session.id.clone(),
        borrower: session.borrower.clone(),
        borrow_time: session.borrow_time.clone(),
        returner: returner.to_owned(),
        return_time: time.clone(),
        notes: notes.to_owned(),
        transfer_logs: session.transfer_logs.clone(),
        items: details.clone(),
    };

    for (id, condition) in details {
        session.returned_items.insert(
            id,
            ItemReturnDetail {
                is_intact: condition.is_intact,
                photos: condition.photos,
                returner: returner.to_owned(),
                time: time.clone(),
            },
        );
    }

    ReturnOutcome {
        session_closed: session.is_fully_returned(),
        history,
    }
}
