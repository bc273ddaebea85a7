//! Broadcast event bus for presentation subscribers

use super::{CoreEvent, Notifier, StateChange};
use crate::alert::AlertFired;
use tokio::sync::broadcast;

/// Fan-out of [`CoreEvent`]s to any number of subscribers
///
/// Slow subscribers lag and lose the oldest events; the engine never
/// blocks on them.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers; events with no subscriber are dropped
    pub fn publish(&self, event: CoreEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Notifier for EventBus {
    fn alert_fired(&self, event: &AlertFired) {
        self.publish(CoreEvent::AlertFired(event.clone()));
    }

    fn state_changed(&self, symbol: &str, change: &StateChange) {
        self.publish(CoreEvent::StateChanged {
            symbol: symbol.to_string(),
            change: change.clone(),
        });
    }
}
