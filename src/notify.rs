use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// How an optimistic mutation settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Remote accepted; local state stands (and was reconciled if the
    /// follow-up fetch succeeded).
    Confirmed,
    /// Remote rejected or was unreachable; local state was restored to the
    /// pre-mutation snapshot.
    RolledBack(String),
}

/// Settlement signal for one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSignal {
    /// Which operation settled, e.g. "book_venue".
    pub op: &'static str,
    /// Id of the entity the mutation touched.
    pub entity: String,
    pub outcome: SignalOutcome,
}

/// Broadcast hub for mutation settlement. Callers that returned early with
/// an optimistic result subscribe here to learn whether it stuck.
pub struct SignalHub {
    sender: broadcast::Sender<SyncSignal>,
}

impl SignalHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncSignal> {
        self.sender.subscribe()
    }

    /// Send a settlement signal. No-op if nobody is listening.
    pub fn send(&self, signal: SyncSignal) {
        let _ = self.sender.send(signal);
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}
