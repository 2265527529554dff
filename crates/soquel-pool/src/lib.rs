//! Soquel Pool - Synchronous pooled connection management
//!
//! A bounded, thread-safe pool that multiplexes a small number of expensive
//! transport connections across many concurrent callers. Checkout blocks
//! when the pool is saturated, leases held past the configured checkout
//! time are forcibly reclaimed, and idle connections can be probed with a
//! ping query before being served again. Changing any connect parameter or
//! pool option at runtime force-closes the pooled connections and strands
//! outstanding leases, which then fail on use.
//!
//! # Example
//!
//! ```ignore
//! use soquel_pool::{ConnectParams, ConnectionPool, PoolConfig};
//!
//! let params = ConnectParams::new("postgres://db.internal/app", "app", "secret");
//! let config = PoolConfig::new()
//!     .with_max_active(8)
//!     .with_max_idle(4)
//!     .with_ping_enabled(true)
//!     .with_ping_query("SELECT 1");
//!
//! let pool = ConnectionPool::new(params, config, factory);
//!
//! let conn = pool.checkout()?;
//! conn.execute("UPDATE jobs SET state = 'done' WHERE id = ?", &[Value::Int(7)])?;
//! // Dropping (or closing) the lease returns the connection to the pool.
//! ```

mod config;
mod error;
mod factory;
mod handle;
mod health;
mod lease;
mod pool;
mod state;
mod stats;

#[cfg(test)]
mod tests;

pub use config::PoolConfig;
pub use error::PoolError;
pub use factory::{ConnectParams, ConnectionFactory};
pub use lease::Lease;
pub use pool::ConnectionPool;
pub use stats::{PoolStats, PoolStatus};
