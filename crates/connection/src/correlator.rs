//! Pending-request table: message id → waiting caller.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use halink_protocol::CommandResult;

use crate::error::ConnectionError;

pub(crate) type Outcome = Result<Value, ConnectionError>;

/// Waiters for commands that have been assigned an id but not settled.
///
/// Every entry leaves the table exactly once: through [`resolve`](Self::resolve),
/// [`cancel`](Self::cancel) or [`fail_all`](Self::fail_all).
#[derive(Default)]
pub(crate) struct PendingRequests {
    waiters: HashMap<u64, oneshot::Sender<Outcome>>,
}

impl PendingRequests {
    /// Registers a waiter for `id`.
    pub(crate) fn register(&mut self, id: u64) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id, tx);
        rx
    }

    /// Delivers an outcome to the waiter for `id`. Returns `false` if there
    /// is no such waiter (already settled, or never registered).
    pub(crate) fn resolve(&mut self, id: u64, outcome: Outcome) -> bool {
        match self.waiters.remove(&id) {
            Some(tx) => {
                // The caller may have stopped waiting; the entry is gone either way.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Drops the waiter for `id` without delivering anything.
    pub(crate) fn cancel(&mut self, id: u64) -> bool {
        self.waiters.remove(&id).is_some()
    }

    /// Fails every waiter with `err`, returning how many there were.
    pub(crate) fn fail_all(&mut self, err: ConnectionError) -> usize {
        let count = self.waiters.len();
        for (_, tx) in self.waiters.drain() {
            let _ = tx.send(Err(err.clone()));
        }
        count
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: u64) -> bool {
        self.waiters.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }
}

/// Converts a `result` frame into the caller-facing outcome.
pub(crate) fn outcome_from_result(result: CommandResult) -> Outcome {
    if result.success {
        return Ok(result.result.unwrap_or(Value::Null));
    }
    let (code, message) = match result.error {
        Some(detail) => (detail.code, detail.message),
        None => (None, None),
    };
    Err(ConnectionError::CommandFailed {
        code,
        message: message.unwrap_or_else(|| "command failed".into()),
    })
}
