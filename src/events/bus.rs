use tokio::sync::broadcast;
use tracing::debug;

use super::types::PieceEvent;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

pub struct EventBus {
    tx: broadcast::Sender<PieceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emitter_for(&self, run_id: impl Into<String>) -> EventEmitter {
        EventEmitter {
            tx: self.tx.clone(),
            run_id: run_id.into(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PieceEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// A cheap-to-clone handle bound to one run's id; emission is
/// fire-and-forget, so a run with no subscribers proceeds unaffected.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<PieceEvent>,
    run_id: String,
}

impl EventEmitter {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&self, event: PieceEvent) {
        debug!(run_id = %self.run_id, "EventEmitter::emit");
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EngineState;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("run-1");

        emitter.emit(PieceEvent::WorkflowComplete {
            run_id: "run-1".to_string(),
            state: EngineState::new(),
        });

        let received = rx.recv().await.unwrap();
        assert!(received.is_terminal());
        assert_eq!(received.run_id(), "run-1");
    }
}
