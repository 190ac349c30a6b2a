//! Connection pool keyed by `(user, hub)`.
//!
//! Connections are created lazily on first request and evicted by a
//! periodic sweep once they have gone unused for the idle timeout.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, Weak};

use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use halink_connection::Connection;

use crate::types::{HubCredentials, PoolConfig, PoolKey};

struct PoolEntry {
    connection: Connection,
    last_used: Instant,
}

struct PoolInner {
    config: PoolConfig,
    entries: Mutex<HashMap<PoolKey, PoolEntry>>,
    sweeper: std::sync::Mutex<Option<CancellationToken>>,
}

/// Hands out one shared [`Connection`] per user per hub.
///
/// Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                entries: Mutex::new(HashMap::new()),
                sweeper: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Starts the idle sweep. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut sweeper = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if sweeper.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        *sweeper = Some(cancel.clone());
        debug!(
            interval_secs = self.inner.config.sweep_interval.as_secs(),
            idle_secs = self.inner.config.idle_timeout.as_secs(),
            "starting idle sweep"
        );
        tokio::spawn(sweep_loop(Arc::downgrade(&self.inner), cancel));
    }

    /// Returns the connection for `(user_id, hub_url)`, creating it if absent.
    ///
    /// A new connection is not opened until first used. An existing entry is
    /// returned as-is, even if `credential` differs from the one it was
    /// created with; remove it first to switch tokens.
    pub async fn get_connection(&self, user_id: &str, hub_url: &str, credential: &str) -> Connection {
        let key = PoolKey::new(user_id, hub_url);
        let mut entries = self.inner.entries.lock().await;
        let now = Instant::now();

        if let Some(entry) = entries.get_mut(&key) {
            entry.last_used = now;
            return entry.connection.clone();
        }

        let connection = Connection::with_config(
            &key.hub_url,
            credential,
            self.inner.config.connection.clone(),
        );
        debug!(key = %key, pooled = entries.len() + 1, "created pooled connection");
        entries.insert(
            key,
            PoolEntry {
                connection: connection.clone(),
                last_used: now,
            },
        );
        connection
    }

    pub async fn get_connection_for(&self, user_id: &str, hub: &HubCredentials) -> Connection {
        self.get_connection(user_id, &hub.hub_url, &hub.access_token)
            .await
    }

    /// Disconnects and forgets one entry. Returns whether it existed.
    pub async fn remove_connection(&self, user_id: &str, hub_url: &str) -> bool {
        let key = PoolKey::new(user_id, hub_url);
        let removed = self.inner.entries.lock().await.remove(&key);
        match removed {
            Some(entry) => {
                entry.connection.disconnect().await;
                debug!(key = %key, "removed pooled connection");
                true
            }
            None => false,
        }
    }

    /// Evicts every entry idle longer than the idle timeout, now. Returns
    /// how many were evicted.
    pub async fn sweep_idle(&self) -> usize {
        self.inner.sweep_idle().await
    }

    /// Stops the sweep, then disconnects and drops every entry.
    pub async fn shutdown(&self) {
        let sweeper = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = sweeper {
            cancel.cancel();
        }

        let drained: Vec<PoolEntry> = {
            let mut entries = self.inner.entries.lock().await;
            entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            entry.connection.disconnect().await;
        }
        info!(closed = count, "connection pool shut down");
    }

    pub async fn len(&self) -> usize {
        self.inner.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.entries.lock().await.is_empty()
    }

    pub async fn contains(&self, user_id: &str, hub_url: &str) -> bool {
        let key = PoolKey::new(user_id, hub_url);
        self.inner.entries.lock().await.contains_key(&key)
    }
}

impl PoolInner {
    async fn sweep_idle(&self) -> usize {
        let idle_timeout = self.config.idle_timeout;
        let evicted: Vec<(PoolKey, Connection)> = {
            let mut entries = self.entries.lock().await;
            let stale: Vec<PoolKey> = entries
                .iter()
                .filter(|(_, entry)| entry.last_used.elapsed() > idle_timeout)
                .map(|(key, _)| key.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|key| entries.remove(&key).map(|entry| (key, entry.connection)))
                .collect()
        };

        for (key, connection) in &evicted {
            info!(key = %key, "evicting idle connection");
            connection.disconnect().await;
        }
        evicted.len()
    }
}

async fn sweep_loop(pool: Weak<PoolInner>, cancel: CancellationToken) {
    let Some(interval) = pool.upgrade().map(|inner| inner.config.sweep_interval) else {
        return;
    };
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = pool.upgrade() else { break };
                let evicted = inner.sweep_idle().await;
                if evicted > 0 {
                    debug!(evicted, "idle sweep finished");
                }
            }
        }
    }
    debug!("idle sweep stopped");
}
