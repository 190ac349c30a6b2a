//! Per-socket tasks: the read pump feeds inbound frames to the connection,
//! the write pump serialises outbound frames and keepalive pings.

use std::future::Future;

pub(crate) mod read;
pub(crate) mod write;

/// Receives what the read pump takes off the socket.
pub(crate) trait InboundHandler: Send + Sync + 'static {
    /// One text frame.
    fn on_text(&self, text: &str) -> impl Future<Output = ()> + Send;

    /// The socket is gone. Called exactly once, after the last `on_text`.
    fn on_closed(&self) -> impl Future<Output = ()> + Send;
}
