//! Subscription registry: subscription id → event callback.
//!
//! Each subscription owns a bounded queue drained by its own delivery task,
//! so a slow callback never stalls the socket's read pump.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Callback invoked with the `event` payload of every pushed message.
pub type EventCallback = Box<dyn Fn(Value) + Send + Sync>;

pub(crate) struct SubscriptionRegistry {
    entries: HashMap<u64, mpsc::Sender<Value>>,
    buffer: usize,
}

impl SubscriptionRegistry {
    pub(crate) fn new(buffer: usize) -> Self {
        Self {
            entries: HashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Registers `callback` under `id` and starts its delivery task.
    pub(crate) fn register(&mut self, id: u64, callback: EventCallback) {
        let (tx, rx) = mpsc::channel(self.buffer);
        tokio::spawn(deliver(id, rx, callback));
        self.entries.insert(id, tx);
    }

    /// Queues `event` for the subscription `id`. Events for unknown ids are
    /// dropped; so are events that find the subscription's queue full.
    pub(crate) fn dispatch(&self, id: u64, event: Value) -> bool {
        let Some(tx) = self.entries.get(&id) else {
            trace!(id, "event for unknown subscription, dropping");
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(id, "subscriber is not keeping up, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Removes a subscription; its delivery task ends once the queue drains.
    pub(crate) fn remove(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

async fn deliver(id: u64, mut rx: mpsc::Receiver<Value>, callback: EventCallback) {
    while let Some(event) = rx.recv().await {
        callback(event);
    }
    trace!(id, "subscription delivery stopped");
}
