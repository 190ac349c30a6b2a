//! WebSocket write pump: outbound frames in order, plus keepalive pings.

use std::time::Duration;

use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

/// Writes queued frames in order, pinging every `ping_period`.
///
/// On exit (cancel, closed queue or write error) it cancels `cancel` so the
/// read pump notices a dead writer, then tries to send a close frame.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    ping_period: Duration,
    cancel: CancellationToken,
) where
    S: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let mut keepalive = tokio::time::interval(ping_period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    keepalive.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = keepalive.tick() => {
                trace!("sending keepalive ping");
                if let Err(e) = write.send(tungstenite::Message::Ping(vec![].into())).await {
                    error!("WebSocket ping failed: {e}");
                    break;
                }
            }
            msg = write_rx.recv() => {
                let Some(msg) = msg else { break };
                if let Err(e) = write.send(msg).await {
                    error!("WebSocket write error: {e}");
                    break;
                }
            }
        }
    }

    cancel.cancel();
    let _ = write.send(tungstenite::Message::Close(None)).await;
}
