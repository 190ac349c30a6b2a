//! WebSocket read pump: hands inbound frames to the connection.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::InboundHandler;

/// Reads frames until the socket ends, errors, stays silent past
/// `idle_timeout`, or `cancel` fires; then stops the write pump and reports
/// the closure to `handler`.
///
/// Any inbound frame (text, ping, pong) pushes the idle deadline forward.
pub(crate) async fn read_pump<S, H>(
    mut read: S,
    handler: H,
    write_tx: mpsc::Sender<tungstenite::Message>,
    idle_timeout: Duration,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    H: InboundHandler,
{
    let idle_deadline = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut idle_deadline => {
                warn!("no traffic within {}s, dropping link", idle_timeout.as_secs());
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        idle_deadline
                            .as_mut()
                            .reset(tokio::time::Instant::now() + idle_timeout);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                handler.on_text(&text).await;
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("received pong");
                            }
                            tungstenite::Message::Close(frame) => {
                                debug!(?frame, "received close frame");
                                break;
                            }
                            _ => debug!("ignoring non-text frame"),
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    handler.on_closed().await;
}
