//! Client connection to a Home Assistant hub's WebSocket API.
//!
//! A [`Connection`] opens the socket lazily, authenticates with a long-lived
//! access token, correlates every command with its `result` by numeric id,
//! routes pushed events to subscription callbacks, and reconnects with
//! exponential backoff when an authenticated link drops.
//!
//! ```no_run
//! # async fn demo() -> Result<(), halink_connection::ConnectionError> {
//! let conn = halink_connection::Connection::new("http://homeassistant.local:8123", "TOKEN");
//! let lights = conn.get_states_in_domain("light").await?;
//! conn.toggle("light.kitchen").await?;
//! # let _ = lights;
//! # Ok(())
//! # }
//! ```

mod connection;
mod correlator;
pub mod error;
mod inbound;
mod operations;
mod pumps;
mod reconnection;
pub mod subscriptions;
mod transport;
pub mod types;

pub use connection::Connection;
pub use error::{ConnectionError, ErrorKind};
pub use subscriptions::EventCallback;
pub use types::{ConnectionConfig, ConnectionState, ReconnectConfig, normalize_hub_url, websocket_url};

pub use halink_protocol as protocol;
