mod cancel;
mod conflict;
mod custody;
mod error;
mod mutations;
mod queries;
mod store;
#[cfg(test)]
mod tests;

pub use cancel::{propose_cancellation, CancelPlan};
pub use conflict::{cancellable_dates, day_started, is_slot_taken};
pub use custody::{borrowed_item_ids, current_holder};
pub use error::EngineError;
pub use store::AppState;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::notify::{SignalHub, SignalOutcome, SyncSignal};
use crate::normalize;
use crate::observability;
use crate::remote::{RemoteApi, Request};

pub type SharedState = Arc<RwLock<AppState>>;

/// Handle on a mutation's background settlement. The optimistic result has
/// already been returned; awaiting this tells you whether it stuck.
pub type SettleHandle = JoinHandle<SignalOutcome>;

/// Optimistic-sync coordinator over the shared dataset.
///
/// Every mutation runs the same cycle: snapshot the whole state, apply the
/// change locally, return, and settle against the remote in a spawned task.
/// Settlement either reconciles (remote accepted; adopt a fresh read) or
/// rolls back (remote rejected; restore the snapshot wholesale).
///
/// While one mutation on an entity is unsettled, further mutations on that
/// entity are rejected synchronously with `MutationInFlight`. Rollback
/// restores the exact pre-mutation state because nothing else can have
/// touched the involved entities in between.
pub struct Engine {
    pub state: SharedState,
    remote: Arc<dyn RemoteApi>,
    pub signals: Arc<SignalHub>,
    in_flight: Arc<DashMap<String, ()>>,
}

/// Holds an in-flight slot for one entity; the slot frees on drop, whether
/// settlement finished or validation bailed early.
pub(super) struct InFlightGuard {
    map: Arc<DashMap<String, ()>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

impl Engine {
    pub fn new(remote: Arc<dyn RemoteApi>, signals: Arc<SignalHub>) -> Self {
        Self {
            state: Arc::new(RwLock::new(AppState::new())),
            remote,
            signals,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Claim the in-flight slot for `key`, or reject if a prior mutation on
    /// it has not settled. Creations claim a collection-wide key since the
    /// new entity has no id visible to later callers yet.
    pub(super) fn try_begin(&self, key: &str) -> Result<InFlightGuard, EngineError> {
        use dashmap::mapref::entry::Entry;
        match self.in_flight.entry(key.to_owned()) {
            Entry::Occupied(_) => Err(EngineError::MutationInFlight(key.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlightGuard {
                    map: self.in_flight.clone(),
                    key: key.to_owned(),
                })
            }
        }
    }

    /// Spawn the settlement half of a mutation. The local state is already
    /// mutated; `snapshot` is the pre-mutation state for the rollback path.
    pub(super) fn settle(
        &self,
        entity: String,
        snapshot: AppState,
        request: Request,
        guard: InFlightGuard,
    ) -> SettleHandle {
        let op = request.op();
        let state = self.state.clone();
        let remote = self.remote.clone();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let outcome = match remote.execute(request).await {
                Ok(()) => {
                    metrics::counter!(
                        observability::REMOTE_REQUESTS_TOTAL,
                        "op" => op, "status" => "success"
                    )
                    .increment(1);
                    reconcile(&state, remote.as_ref(), op).await;
                    SignalOutcome::Confirmed
                }
                Err(e) => {
                    metrics::counter!(
                        observability::REMOTE_REQUESTS_TOTAL,
                        "op" => op, "status" => "error"
                    )
                    .increment(1);
                    metrics::counter!(observability::REMOTE_FAILURES_TOTAL, "op" => op)
                        .increment(1);
                    metrics::counter!(observability::ROLLBACKS_TOTAL, "op" => op).increment(1);
                    tracing::warn!(op, entity = %entity, error = %e, "remote rejected mutation, rolling back");
                    state.write().await.replace_with(snapshot);
                    SignalOutcome::RolledBack(e.to_string())
                }
            };
            signals.send(SyncSignal {
                op,
                entity,
                outcome: outcome.clone(),
            });
            outcome
        })
    }
}

/// Post-confirmation reconciliation: adopt a fresh full read so local state
/// picks up server-side ids and concurrent writers. If the read fails the
/// optimistic state stands; the mutation itself was already accepted.
async fn reconcile(state: &SharedState, remote: &dyn RemoteApi, op: &'static str) {
    match remote.fetch_all().await {
        Ok(raw) => {
            let fresh = normalize::normalize_dataset(raw);
            state.write().await.replace_with(fresh);
            metrics::counter!(observability::RECONCILIATIONS_TOTAL).increment(1);
        }
        Err(e) => {
            tracing::warn!(op, error = %e, "reconciliation fetch failed, keeping optimistic state");
        }
    }
}
