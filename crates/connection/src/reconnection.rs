//! Automatic reconnection with exponential backoff.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionInner, Shared};

/// Starts a reconnect loop for `inner`, replacing any loop already running.
/// Caller holds the state lock.
pub(crate) fn schedule(inner: &Arc<ConnectionInner>, st: &mut Shared) {
    if let Some(previous) = st.reconnect_cancel.take() {
        previous.cancel();
    }
    let cancel = CancellationToken::new();
    st.reconnect_cancel = Some(cancel.clone());
    tokio::spawn(reconnect_loop(Arc::downgrade(inner), cancel));
}

/// Retries `connect` with backoff until it succeeds, the hub rejects the
/// credential, the attempt budget runs out, or `cancel` fires.
///
/// Holds the connection weakly between attempts so a dropped connection
/// ends the loop. Returns a boxed future to keep the connect path and this
/// loop from forming a recursive future type.
pub(crate) fn reconnect_loop(
    conn: Weak<ConnectionInner>,
    cancel: CancellationToken,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        loop {
            let Some(inner) = conn.upgrade() else { return };
            let attempt = {
                let mut st = inner.state.lock().await;
                st.reconnect_attempts += 1;
                st.reconnect_attempts
            };

            let policy = inner.config.reconnect;
            if attempt > policy.max_attempts {
                warn!(
                    hub = %inner.hub_url,
                    attempts = policy.max_attempts,
                    "giving up on reconnecting"
                );
                break;
            }

            let delay = policy.delay_for_attempt(attempt);
            info!(
                hub = %inner.hub_url,
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );
            drop(inner);

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let Some(inner) = conn.upgrade() else { return };
            let hub = inner.hub_url.clone();
            match Connection::from_inner(inner).connect().await {
                Ok(()) => {
                    info!(hub = %hub, attempt, "reconnected");
                    break;
                }
                Err(e) if e.is_auth() => {
                    warn!(hub = %hub, "credential rejected, not reconnecting: {e}");
                    break;
                }
                Err(e) => {
                    warn!(hub = %hub, attempt, "reconnect attempt failed: {e}");
                }
            }

            if cancel.is_cancelled() {
                return;
            }
        }

        if let Some(inner) = conn.upgrade() {
            let mut st = inner.state.lock().await;
            if !cancel.is_cancelled() {
                st.reconnect_cancel = None;
            }
        }
    })
}
