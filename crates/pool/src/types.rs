use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use halink_connection::{ConnectionConfig, normalize_hub_url};

/// How often the idle sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Entries unused for longer than this are evicted by the sweep.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Pool settings, plus the settings every pooled connection is created with.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub sweep_interval: Duration,
    pub idle_timeout: Duration,
    pub connection: ConnectionConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            sweep_interval: SWEEP_INTERVAL,
            idle_timeout: IDLE_TIMEOUT,
            connection: ConnectionConfig::default(),
        }
    }
}

/// A hub address and the access token a user holds for it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubCredentials {
    pub hub_url: String,
    pub access_token: String,
}

impl fmt::Debug for HubCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubCredentials")
            .field("hub_url", &self.hub_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Identifies a pooled connection: one per user per hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub user_id: String,
    pub hub_url: String,
}

impl PoolKey {
    /// Builds a key, normalizing the hub address so `http://h/` and
    /// `http://h` share an entry.
    pub fn new(user_id: &str, hub_url: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            hub_url: normalize_hub_url(hub_url),
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user_id, self.hub_url)
    }
}
