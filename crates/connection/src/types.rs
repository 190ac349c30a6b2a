//! Public types for hub connections.

use std::time::Duration;

use halink_protocol::constants::{
    COMMAND_TIMEOUT, CONNECT_TIMEOUT, EVENT_BUFFER, MAX_MESSAGE_SIZE, MAX_QUEUED_MESSAGES,
    MAX_RECONNECT_ATTEMPTS, PING_PERIOD, READ_IDLE_TIMEOUT, RECONNECT_BASE_DELAY,
    RECONNECT_MAX_DELAY, WEBSOCKET_PATH,
};

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket.
    Disconnected,
    /// Socket being opened, or open and waiting for `auth_required`.
    Connecting,
    /// Credential sent, waiting for `auth_ok` / `auth_invalid`.
    AwaitingAuth,
    /// Commands flow.
    Authenticated,
    /// Explicit teardown in progress.
    Closing,
}

/// Automatic reconnection after an unexpected disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first attempt.
    pub base_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Attempts before giving up until the next explicit `connect()`.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: RECONNECT_BASE_DELAY,
            max_delay: RECONNECT_MAX_DELAY,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectConfig {
    /// Delay for a 1-based attempt number: `base * 2^(attempt-1)`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Tunables for a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// From socket open to `auth_ok`.
    pub connect_timeout: Duration,
    /// Default wait for a command's result.
    pub command_timeout: Duration,
    /// Outbound messages held while not authenticated.
    pub max_queued_messages: usize,
    /// Events buffered per subscription.
    pub event_buffer: usize,
    /// Interval of WebSocket keepalive pings.
    pub ping_period: Duration,
    /// Read deadline after which a silent link is dropped.
    pub read_idle_timeout: Duration,
    pub max_message_size: usize,
    pub reconnect: ReconnectConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            command_timeout: COMMAND_TIMEOUT,
            max_queued_messages: MAX_QUEUED_MESSAGES,
            event_buffer: EVENT_BUFFER,
            ping_period: PING_PERIOD,
            read_idle_timeout: READ_IDLE_TIMEOUT,
            max_message_size: MAX_MESSAGE_SIZE,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Strips surrounding whitespace and trailing slashes from a hub address.
pub fn normalize_hub_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// WebSocket endpoint for a hub base address (`http` → `ws`, `https` → `wss`).
pub fn websocket_url(hub_url: &str) -> String {
    let base = normalize_hub_url(hub_url);
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base
    } else {
        format!("ws://{base}")
    };
    format!("{ws_base}{WEBSOCKET_PATH}")
}
