//! Opening the socket.
//!
//! Production connections dial a real WebSocket. Unit tests swap in a
//! scripted dialer that hands both ends of an in-memory link to the test.

use std::pin::Pin;

use futures_util::{Sink, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::error::ConnectionError;
use crate::types::websocket_url;

pub(crate) type FrameSink = Pin<Box<dyn Sink<tungstenite::Message, Error = tungstenite::Error> + Send>>;
pub(crate) type FrameStream =
    Pin<Box<dyn Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Send>>;

pub(crate) enum Dialer {
    WebSocket,
    #[cfg(test)]
    Scripted(testing::ScriptedDialer),
}

impl Dialer {
    /// Opens a link to the hub and splits it into write and read halves.
    pub(crate) async fn dial(
        &self,
        hub_url: &str,
        max_message_size: usize,
    ) -> Result<(FrameSink, FrameStream), ConnectionError> {
        match self {
            Dialer::WebSocket => {
                let url = websocket_url(hub_url);
                let mut ws_config = WebSocketConfig::default();
                ws_config.max_message_size = Some(max_message_size);
                ws_config.max_frame_size = Some(max_message_size);
                let (ws_stream, _) =
                    tokio_tungstenite::connect_async_with_config(url.as_str(), Some(ws_config), false)
                        .await
                        .map_err(|e| ConnectionError::Socket(e.to_string()))?;
                let (write, read) = ws_stream.split();
                Ok((Box::pin(write), Box::pin(read)))
            }
            #[cfg(test)]
            Dialer::Scripted(dialer) => dialer.dial(),
        }
    }
}
