use serde::Serialize;

/// Progress notifications emitted by the operation engine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationEvent {
    Started {
        run_id: String,
        operation: String,
        depth: usize,
    },
    NodeEntered {
        run_id: String,
        operation: String,
        node: String,
    },
    RoundFinished {
        run_id: String,
        operation: String,
        node: String,
        outcome: String,
        status: Option<String>,
        attempt: u32,
    },
    Paused {
        run_id: String,
        operation: String,
    },
    Resumed {
        run_id: String,
        operation: String,
    },
    Finished {
        run_id: String,
        operation: String,
        success: bool,
        status: Option<String>,
        elapsed_ms: u64,
    },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<OperationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: OperationEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<OperationEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
