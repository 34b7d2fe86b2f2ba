use crate::limits::HISTORY_CAP;
use crate::model::{Booking, BorrowSession, HistoryEntry};

/// The authoritative-as-known in-memory dataset: the last normalized remote
/// read plus any optimistic mutations not yet reconciled.
///
/// All mutation funnels through the engine's snapshot/apply/settle cycle;
/// nothing else holds a `&mut AppState` across an await point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub bookings: Vec<Booking>,
    pub sessions: Vec<BorrowSession>,
    pub history: Vec<HistoryEntry>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full copy for the rollback path. Cheap relative to a remote
    /// round-trip; taken once per mutation.
    pub fn snapshot(&self) -> AppState {
        self.clone()
    }

    /// Restore a snapshot wholesale (rollback) or adopt a freshly
    /// normalized remote read (reconciliation).
    pub fn replace_with(&mut self, other: AppState) {
        *self = other;
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn booking(&self, id: &str) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: &str) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    pub fn remove_booking(&mut self, id: &str) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    // ── Borrow sessions ──────────────────────────────────────

    pub fn session(&self, id: &str) -> Option<&BorrowSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn session_mut(&mut self, id: &str) -> Option<&mut BorrowSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn remove_session(&mut self, id: &str) -> Option<BorrowSession> {
        let pos = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(pos))
    }

    // ── History ──────────────────────────────────────────────

    /// Newest first, capped; the remote owns long-term retention.
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.insert(0, entry);
        self.history.truncate(HISTORY_CAP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn session(id: &str) -> BorrowSession {
        BorrowSession {
            id: id.into(),
            items: vec!["t1".into()],
            borrower: "a".into(),
            dept: "d".into(),
            borrow_time: "2024/06/01 09:00".into(),
            transfer_logs: vec![],
            returned_items: BTreeMap::new(),
        }
    }

    fn entry(id: &str) -> HistoryEntry {
        HistoryEntry {
            id: id.into(),
            session_id: "s".into(),
            borrower: "a".into(),
            borrow_time: "t".into(),
            returner: "a".into(),
            return_time: "t".into(),
            notes: String::new(),
            transfer_logs: vec![],
            items: BTreeMap::new(),
        }
    }

    #[test]
    fn snapshot_then_restore_is_identity() {
        let mut state = AppState::new();
        state.sessions.push(session("s1"));
        let snap = state.snapshot();

        state.sessions.push(session("s2"));
        state.push_history(entry("h1"));
        assert_ne!(state, snap);

        state.replace_with(snap.clone());
        assert_eq!(state, snap);
    }

    #[test]
    fn session_lookup_and_remove() {
        let mut state = AppState::new();
        state.sessions.push(session("s1"));
        state.sessions.push(session("s2"));

        assert!(state.session("s1").is_some());
        assert!(state.session_mut("s2").is_some());
        assert!(state.session("s3").is_none());

        let removed = state.remove_session("s1").unwrap();
        assert_eq!(removed.id, "s1");
        assert!(state.remove_session("s1").is_none());
        assert_eq!(state.sessions.len(), 1);
    }

    #[test]
    fn history_newest_first_and_capped() {
        let mut state = AppState::new();
        for i in 0..(HISTORY_CAP + 5) {
            state.push_history(entry(&format!("h{i}")));
        }
        assert_eq!(state.history.len(), HISTORY_CAP);
        assert_eq!(state.history[0].id, format!("h{}", HISTORY_CAP + 4));
    }
}
