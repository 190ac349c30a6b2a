//! Handling of frames arriving on the socket.

use std::sync::{Arc, Weak};

use tokio_tungstenite::tungstenite;
use tracing::{debug, info, trace, warn};

use halink_protocol::{ProtocolError, ServerMessage, codec};

use crate::connection::ConnectionInner;
use crate::correlator::outcome_from_result;
use crate::error::ConnectionError;
use crate::pumps::InboundHandler;
use crate::reconnection;
use crate::types::ConnectionState;

/// What a socket's read pump reports to. Holds the connection weakly and
/// remembers which socket it belongs to, so a dropped socket cannot touch
/// its successor.
pub(crate) struct LinkHandle {
    conn: Weak<ConnectionInner>,
    epoch: u64,
}

impl LinkHandle {
    pub(crate) fn new(conn: &Arc<ConnectionInner>, epoch: u64) -> Self {
        Self {
            conn: Arc::downgrade(conn),
            epoch,
        }
    }
}

impl InboundHandler for LinkHandle {
    async fn on_text(&self, text: &str) {
        if let Some(inner) = self.conn.upgrade() {
            inner.handle_text(self.epoch, text).await;
        }
    }

    async fn on_closed(&self) {
        if let Some(inner) = self.conn.upgrade() {
            inner.handle_closed(self.epoch).await;
        }
    }
}

impl ConnectionInner {
    pub(crate) async fn handle_text(&self, epoch: u64, text: &str) {
        let msg = match codec::decode(text) {
            Ok(msg) => msg,
            Err(ProtocolError::UnknownType(kind)) => {
                debug!(hub = %self.hub_url, kind = %kind, "ignoring unsupported message type");
                return;
            }
            Err(e) => {
                warn!(hub = %self.hub_url, "dropping unreadable frame: {e}");
                return;
            }
        };

        let mut st = self.state.lock().await;
        if !st.link_is(epoch) {
            trace!(epoch, kind = msg.message_type(), "frame from a dropped socket");
            return;
        }

        match msg {
            ServerMessage::AuthRequired { ha_version } => {
                if st.phase != ConnectionState::Connecting {
                    debug!(hub = %self.hub_url, phase = ?st.phase, "ignoring unexpected auth_required");
                    return;
                }
                debug!(hub = %self.hub_url, ?ha_version, "auth_required, sending credential");
                let frame = match codec::encode_auth(&self.credential) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("failed to encode auth: {e}");
                        return;
                    }
                };
                st.phase = ConnectionState::AwaitingAuth;
                if let Some(link) = &st.link {
                    link.push(tungstenite::Message::Text(frame.into()));
                }
            }

            ServerMessage::AuthOk { ha_version } => {
                st.phase = ConnectionState::Authenticated;
                st.reconnect_attempts = 0;
                if ha_version.is_some() {
                    st.ha_version = ha_version;
                }

                let frames: Vec<_> = st.outbound.drain(..).collect();
                let queued = frames.len();
                if let Some(link) = &st.link {
                    for frame in frames {
                        trace!(id = frame.id, "flushing queued command");
                        if !link.push(tungstenite::Message::Text(frame.text.into())) {
                            break;
                        }
                    }
                }

                info!(
                    hub = %self.hub_url,
                    ha_version = st.ha_version.as_deref().unwrap_or("unknown"),
                    queued,
                    "authenticated"
                );
                st.settle_attempt(Ok(()));
            }

            ServerMessage::AuthInvalid { message } => {
                let reason = message.unwrap_or_else(|| "invalid access token".into());
                warn!(hub = %self.hub_url, reason = %reason, "hub rejected the access token");
                st.drop_link();
                st.phase = ConnectionState::Disconnected;
                st.settle_attempt(Err(ConnectionError::AuthFailed(reason)));
            }

            ServerMessage::Result(result) => {
                let id = result.id;
                if !st.pending.resolve(id, outcome_from_result(result)) {
                    trace!(id, "result for a command nobody is waiting on");
                }
            }

            ServerMessage::Pong(pong) => {
                if !st.pending.resolve(pong.id, Ok(serde_json::Value::Null)) {
                    trace!(id = pong.id, "unexpected pong");
                }
            }

            ServerMessage::Event(event) => {
                st.subscriptions.dispatch(event.id, event.event);
            }
        }
    }

    /// The socket with `epoch` is gone.
    ///
    /// An authenticated link that drops fails every pending command and
    /// starts the reconnect loop. A link that never got past the handshake
    /// fails the connect attempt instead.
    pub(crate) async fn handle_closed(self: &Arc<Self>, epoch: u64) {
        let mut st = self.state.lock().await;
        if !st.link_is(epoch) {
            trace!(epoch, "closure of a dropped socket");
            return;
        }
        st.drop_link();
        let was_authenticated = st.phase == ConnectionState::Authenticated;
        st.phase = ConnectionState::Disconnected;

        if was_authenticated {
            let failed = st.pending.fail_all(ConnectionError::ConnectionLost);
            let dropped = st.outbound.len();
            st.outbound.clear();
            warn!(hub = %self.hub_url, failed, dropped, "connection lost");
            reconnection::schedule(self, &mut st);
        } else {
            debug!(hub = %self.hub_url, "socket closed during handshake");
            st.settle_attempt(Err(ConnectionError::HandshakeClosed));
        }
    }
}
