use tokio::sync::broadcast;
use tracing::trace;

use crate::orchestrator::BatchJobState;
use crate::OrchestratorError;

/// Default channel capacity; receivers that fall further behind lose the oldest events.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Lifecycle notification carrying a snapshot of the job state.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Progress(BatchJobState),
    Completed(BatchJobState),
    Stopped(BatchJobState),
    Error {
        error: OrchestratorError,
        state: BatchJobState,
    },
}

impl BatchEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Completed(_) => "completed",
            Self::Stopped(_) => "stopped",
            Self::Error { .. } => "error",
        }
    }

    pub fn state(&self) -> &BatchJobState {
        match self {
            Self::Progress(state) | Self::Completed(state) | Self::Stopped(state) => state,
            Self::Error { state, .. } => state,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Fan-out of [`BatchEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<BatchEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishing with nobody listening is not an error.
    pub fn publish(&self, event: BatchEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            trace!(event = name, "no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
