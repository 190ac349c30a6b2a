use std::time::Duration;

/// Path of the WebSocket endpoint, relative to the hub base address.
pub const WEBSOCKET_PATH: &str = "/api/websocket";

/// Time allowed from opening the socket until `auth_ok` arrives.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time a command waits for its `result`.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum inbound message size in bytes (64 MB).
///
/// `get_states` on a large installation easily reaches several megabytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// How often a WebSocket ping is written on an idle link.
pub const PING_PERIOD: Duration = Duration::from_secs(30);

/// Read deadline: if nothing at all arrives within this window the link
/// is considered dead. Must be larger than [`PING_PERIOD`].
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Delay before the first automatic reconnect.
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for the reconnect backoff.
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Automatic reconnect attempts after an unexpected disconnect.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Messages that may wait in a connection's outbound queue while it is
/// not authenticated.
pub const MAX_QUEUED_MESSAGES: usize = 1024;

/// Events buffered per subscription before new ones are dropped.
pub const EVENT_BUFFER: usize = 256;
