//! Pool of hub connections shared across many end users.
//!
//! Each `(user, hub)` pair maps to one [`halink_connection::Connection`].
//! Entries are created on demand and swept once idle.

mod pool;
pub mod types;

pub use pool::ConnectionPool;
pub use types::{HubCredentials, PoolConfig, PoolKey};

pub use halink_connection::{Connection, ConnectionConfig, ConnectionError};
