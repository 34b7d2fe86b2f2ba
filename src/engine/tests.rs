use super::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::oneshot;

use crate::model::{BorrowSession, NewBooking, ReturnedCondition};
use crate::notify::{SignalHub, SignalOutcome};
use crate::remote::{RawDataset, RemoteApi, Request};

// "hello" in base64, stands in for photo payloads.
const PHOTO: &str = "aGVsbG8=";

/// Scripted remote. Writes succeed unless a response is queued; reads fail
/// unless a dataset is installed, which keeps optimistic state in place
/// after confirmation. Gates let a test hold a write open mid-settlement.
#[derive(Default)]
struct MockRemote {
    requests: Mutex<Vec<Request>>,
    responses: Mutex<VecDeque<Result<(), EngineError>>>,
    dataset: Mutex<Option<RawDataset>>,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
}

impl MockRemote {
    fn fail_next(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(EngineError::Remote(message.into())));
    }

    fn serve_dataset(&self, json: &str) {
        *self.dataset.lock().unwrap() = Some(serde_json::from_str(json).unwrap());
    }

    fn gate_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    fn recorded(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn fetch_all(&self) -> Result<RawDataset, EngineError> {
        self.dataset
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| EngineError::Remote("fetch unavailable".into()))
    }

    async fn execute(&self, request: Request) -> Result<(), EngineError> {
        let gate = self.gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

fn make_engine() -> (Engine, Arc<MockRemote>) {
    let remote = Arc::new(MockRemote::default());
    let engine = Engine::new(remote.clone(), Arc::new(SignalHub::new()));
    (engine, remote)
}

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn new_booking(venue: &str) -> NewBooking {
    NewBooking {
        venue: venue.into(),
        // Far future so every date stays cancellable under wall-clock now.
        start_date: d("2999-06-01"),
        end_date: d("2999-06-03"),
        start_time: t(8, 0),
        end_time: t(10, 0),
        applicant: "王小明".into(),
        dept: "開發部".into(),
        car_model: String::new(),
        purpose: String::new(),
        password: "12345".into(),
    }
}

async fn seed_session(engine: &Engine, id: &str, items: &[&str]) {
    engine.state.write().await.sessions.push(BorrowSession {
        id: id.into(),
        items: items.iter().map(|s| s.to_string()).collect(),
        borrower: "王小明".into(),
        dept: "開發部".into(),
        borrow_time: "2024/06/01 09:00".into(),
        transfer_logs: vec![],
        returned_items: BTreeMap::new(),
    });
}

fn intact(photos: usize) -> ReturnedCondition {
    ReturnedCondition {
        is_intact: true,
        photos: (0..photos).map(|_| PHOTO.to_string()).collect(),
    }
}

// ── Booking through the coordinator ──────────────────────

#[tokio::test]
async fn booking_visible_immediately_and_confirmed() {
    let (engine, remote) = make_engine();

    let (id, handle) = engine.book_venue(new_booking("工位一")).await.unwrap();
    // Optimistic: visible before settlement.
    assert!(engine.state.read().await.booking(&id).is_some());

    assert_eq!(handle.await.unwrap(), SignalOutcome::Confirmed);
    // Reconciliation fetch failed (none installed); optimistic state stands.
    assert!(engine.state.read().await.booking(&id).is_some());

    let recorded = remote.recorded();
    assert_eq!(recorded.len(), 1);
    assert!(matches!(&recorded[0], Request::BookVenue { booking } if booking.id == id));
}

#[tokio::test]
async fn rejected_booking_rolls_back_to_snapshot() {
    let (engine, remote) = make_engine();
    let (_, handle) = engine.book_venue(new_booking("工位一")).await.unwrap();
    handle.await.unwrap();
    let before = engine.state.read().await.snapshot();

    remote.fail_next("quota exceeded");
    let (id, handle) = engine.book_venue(new_booking("工位二")).await.unwrap();
    assert!(engine.state.read().await.booking(&id).is_some());

    assert_eq!(
        handle.await.unwrap(),
        SignalOutcome::RolledBack("remote error: quota exceeded".into())
    );
    // Field-for-field identical to the pre-mutation state.
    assert_eq!(*engine.state.read().await, before);
}

#[tokio::test]
async fn booking_validation_is_synchronous() {
    let (engine, remote) = make_engine();

    let mut bad = new_booking("工位一");
    bad.password = "123".into();
    assert_eq!(
        engine.book_venue(bad).await.unwrap_err(),
        EngineError::InvalidPassword
    );

    let mut bad = new_booking("工位一");
    bad.password = "1234a".into();
    assert_eq!(
        engine.book_venue(bad).await.unwrap_err(),
        EngineError::InvalidPassword
    );

    assert_eq!(
        engine.book_venue(new_booking("地下室")).await.unwrap_err(),
        EngineError::UnknownVenue("地下室".into())
    );

    let mut bad = new_booking("工位一");
    bad.start_date = d("2999-06-04");
    assert_eq!(
        engine.book_venue(bad).await.unwrap_err(),
        EngineError::InvalidDateRange
    );

    assert!(engine.state.read().await.bookings.is_empty());
    assert!(remote.recorded().is_empty());
}

#[tokio::test]
async fn confirmed_mutation_reconciles_from_remote() {
    let (engine, remote) = make_engine();
    remote.serve_dataset(
        r#"{"venues":[{"id":"srv1","venue":"工位一",
            "startDate":"2999-06-01","endDate":"2999-06-01",
            "startTime":"08:00","endTime":"09:00",
            "applicant":"a","dept":"d","password":"12345"}]}"#,
    );

    let (local_id, handle) = engine.book_venue(new_booking("工位二")).await.unwrap();
    assert_eq!(handle.await.unwrap(), SignalOutcome::Confirmed);

    // Local state was replaced wholesale by the normalized read.
    let state = engine.state.read().await;
    assert!(state.booking(&local_id).is_none());
    assert!(state.booking("srv1").is_some());
}

// ── Cancellation ─────────────────────────────────────────

#[tokio::test]
async fn cancel_partial_then_remainder_deletes() {
    let (engine, _remote) = make_engine();
    let (id, handle) = engine.book_venue(new_booking("工位一")).await.unwrap();
    handle.await.unwrap();

    // Exclude the middle date; the booking survives.
    let handle = engine
        .cancel_booking(&id, "12345", BTreeSet::from([d("2999-06-02")]))
        .await
        .unwrap();
    handle.await.unwrap();
    {
        let state = engine.state.read().await;
        let booking = state.booking(&id).unwrap();
        assert!(booking.excluded_dates.contains(&d("2999-06-02")));
        assert!(!engine
            .is_slot_taken("工位一", d("2999-06-02"), t(8, 0))
            .await);
        assert!(engine.is_slot_taken("工位一", d("2999-06-01"), t(8, 0)).await);
    }

    // The two remaining dates are now the full valid set: delete.
    let handle = engine
        .cancel_booking(
            &id,
            "12345",
            BTreeSet::from([d("2999-06-01"), d("2999-06-03")]),
        )
        .await
        .unwrap();
    handle.await.unwrap();
    assert!(engine.state.read().await.booking(&id).is_none());
}

#[tokio::test]
async fn wrong_password_cancel_is_a_noop() {
    let (engine, remote) = make_engine();
    let (id, handle) = engine.book_venue(new_booking("工位一")).await.unwrap();
    handle.await.unwrap();
    let before = engine.state.read().await.snapshot();
    let writes_before = remote.recorded().len();

    let err = engine
        .cancel_booking(&id, "54321", BTreeSet::from([d("2999-06-02")]))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::BadPassword);
    assert_eq!(*engine.state.read().await, before);
    assert_eq!(remote.recorded().len(), writes_before);
}

#[tokio::test]
async fn cancel_unknown_booking() {
    let (engine, _remote) = make_engine();
    let err = engine
        .cancel_booking("nope", "12345", BTreeSet::from([d("2999-06-02")]))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("nope".into()));
}

// ── Custody through the coordinator ──────────────────────

#[tokio::test]
async fn borrow_transfer_return_full_cycle() {
    let (engine, remote) = make_engine();

    let (sid, handle) = engine
        .borrow_items(
            vec!["t1".into(), "e3".into()],
            "王小明".into(),
            "開發部".into(),
        )
        .await
        .unwrap();
    handle.await.unwrap();
    assert_eq!(
        engine.borrowed_items().await,
        BTreeSet::from(["t1".to_string(), "e3".to_string()])
    );
    assert_eq!(engine.current_holder_of(&sid).await.unwrap(), "王小明");

    let handle = engine.transfer_session(&sid, "李大華").await.unwrap();
    handle.await.unwrap();
    assert_eq!(engine.current_holder_of(&sid).await.unwrap(), "李大華");

    // First return event: the tool, with its mandatory photo.
    let handle = engine
        .return_items(
            &sid,
            BTreeMap::from([("t1".to_string(), intact(1))]),
            "李大華",
            "歸還工具",
        )
        .await
        .unwrap();
    handle.await.unwrap();
    assert!(engine.is_item_borrowed("e3").await);
    assert!(!engine.is_item_borrowed("t1").await);
    assert_eq!(engine.active_sessions().await.len(), 1);

    // Second return event closes the session.
    let handle = engine
        .return_items(
            &sid,
            BTreeMap::from([("e3".to_string(), intact(0))]),
            "李大華",
            "",
        )
        .await
        .unwrap();
    handle.await.unwrap();
    assert!(engine.active_sessions().await.is_empty());
    assert!(engine.borrowed_items().await.is_empty());

    // Two audit entries, newest first, same session, transfer chain kept.
    let history = engine.history().await;
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.session_id == sid));
    assert!(history[0].items.contains_key("e3"));
    assert!(history[1].items.contains_key("t1"));
    assert_eq!(history[0].transfer_logs.len(), 1);
    assert_eq!(history[0].transfer_logs[0].to, "李大華");

    // Evidence photo travelled with the return write.
    let uploads: Vec<_> = remote
        .recorded()
        .into_iter()
        .filter_map(|r| match r {
            Request::ReturnItems { images, .. } => Some(images),
            _ => None,
        })
        .collect();
    assert_eq!(uploads[0].len(), 1);
    assert_eq!(uploads[0][0].file_name, "t1_1.jpg");
    assert!(uploads[1].is_empty());
}

#[tokio::test]
async fn borrow_rejects_item_already_out() {
    let (engine, remote) = make_engine();
    seed_session(&engine, "s1", &["e3"]).await;

    let err = engine
        .borrow_items(vec!["e3".into()], "李大華".into(), "品保部".into())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ItemUnavailable("e3".into()));
    assert_eq!(engine.active_sessions().await.len(), 1);
    assert!(remote.recorded().is_empty());
}

#[tokio::test]
async fn tool_return_without_photo_rejected() {
    let (engine, remote) = make_engine();
    seed_session(&engine, "s1", &["t1"]).await;

    let err = engine
        .return_items(
            "s1",
            BTreeMap::from([("t1".to_string(), intact(0))]),
            "王小明",
            "",
        )
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::MissingPhotos("t1".into()));
    assert!(engine.history().await.is_empty());
    assert!(remote.recorded().is_empty());
}

#[tokio::test]
async fn failed_return_rolls_back_session_and_history() {
    let (engine, remote) = make_engine();
    seed_session(&engine, "s1", &["e3"]).await;
    let before = engine.state.read().await.snapshot();

    remote.fail_next("寫入失敗");
    let handle = engine
        .return_items(
            "s1",
            BTreeMap::from([("e3".to_string(), intact(0))]),
            "王小明",
            "",
        )
        .await
        .unwrap();
    assert!(matches!(
        handle.await.unwrap(),
        SignalOutcome::RolledBack(_)
    ));
    // Session restored, history entry gone.
    assert_eq!(*engine.state.read().await, before);
}

// ── Concurrency guard ────────────────────────────────────

#[tokio::test]
async fn second_mutation_on_same_entity_rejected_while_unsettled() {
    let (engine, remote) = make_engine();
    let (id, handle) = engine.book_venue(new_booking("工位一")).await.unwrap();
    handle.await.unwrap();

    let release = remote.gate_next();
    let handle = engine
        .cancel_booking(&id, "12345", BTreeSet::from([d("2999-06-02")]))
        .await
        .unwrap();

    // Unsettled: a second cancel on the same booking is rejected outright.
    let err = engine
        .cancel_booking(&id, "12345", BTreeSet::from([d("2999-06-03")]))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::MutationInFlight(id.clone()));

    // Unrelated entities are not blocked.
    seed_session(&engine, "s1", &["e3"]).await;
    engine.transfer_session("s1", "李大華").await.unwrap();

    release.send(()).unwrap();
    assert_eq!(handle.await.unwrap(), SignalOutcome::Confirmed);

    // Settled: the entity is free again.
    let handle = engine
        .cancel_booking(&id, "12345", BTreeSet::from([d("2999-06-03")]))
        .await
        .unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn failed_validation_releases_the_guard() {
    let (engine, _remote) = make_engine();
    let (id, handle) = engine.book_venue(new_booking("工位一")).await.unwrap();
    handle.await.unwrap();

    let err = engine
        .cancel_booking(&id, "00000", BTreeSet::from([d("2999-06-02")]))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::BadPassword);

    // The failed attempt must not leave the booking locked.
    let handle = engine
        .cancel_booking(&id, "12345", BTreeSet::from([d("2999-06-02")]))
        .await
        .unwrap();
    handle.await.unwrap();
}

// ── Settlement signals ───────────────────────────────────

#[tokio::test]
async fn rollback_broadcasts_a_signal() {
    let (engine, remote) = make_engine();
    let mut rx = engine.signals.subscribe();

    remote.fail_next("容量不足");
    let (id, handle) = engine.book_venue(new_booking("工位一")).await.unwrap();
    handle.await.unwrap();

    let signal = rx.recv().await.unwrap();
    assert_eq!(signal.op, "book_venue");
    assert_eq!(signal.entity, id);
    assert!(matches!(signal.outcome, SignalOutcome::RolledBack(_)));
}

#[tokio::test]
async fn confirmed_signal_carries_the_request_op() {
    let (engine, _remote) = make_engine();
    let mut rx = engine.signals.subscribe();

    let (sid, handle) = engine
        .borrow_items(vec!["e5".into()], "王小明".into(), "開發部".into())
        .await
        .unwrap();
    handle.await.unwrap();

    let signal = rx.recv().await.unwrap();
    assert_eq!(signal.op, "borrow_items");
    assert_eq!(signal.entity, sid);
    assert_eq!(signal.outcome, SignalOutcome::Confirmed);
}

#[tokio::test]
async fn transfer_unknown_session() {
    let (engine, remote) = make_engine();
    let err = engine
        .transfer_session("missing", "李大華")
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("missing".into()));
    assert!(remote.recorded().is_empty());
}

#[tokio::test]
async fn load_replaces_state() {
    let (engine, remote) = make_engine();
    seed_session(&engine, "stale", &["e3"]).await;
    remote.serve_dataset(
        r#"{"venues":[],"resourceSessions":[
            {"id":"s9","items":["l1"],"borrower":"陳玉珊","dept":"總務部",
             "borrowTime":"2024/06/01 09:00"}]}"#,
    );

    engine.load().await.unwrap();
    let state = engine.state.read().await;
    assert!(state.session("stale").is_none());
    assert_eq!(state.sessions.len(), 1);
    assert_eq!(state.sessions[0].borrower, "陳玉珊");
}
