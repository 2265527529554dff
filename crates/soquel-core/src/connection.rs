//! Connection trait for synchronous database transports

use crate::{QueryResult, Result, StatementResult, Value};

/// A synchronous database connection
///
/// Implementations are driven by exactly one caller at a time; the trait is
/// `Send + Sync` so a connection can be parked in a pool and handed between
/// threads, not so it can be used concurrently.
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgresql", "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Whether the connection commits each statement implicitly
    fn auto_commit(&self) -> bool;

    /// Switch implicit commit on or off
    fn set_auto_commit(&self, auto_commit: bool) -> Result<()>;

    /// Commit the open transaction
    fn commit(&self) -> Result<()>;

    /// Roll back the open transaction
    fn rollback(&self) -> Result<()>;

    /// Close the connection
    fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
