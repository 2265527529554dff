//! Caller-facing lease proxy

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use soquel_core::{Connection, DbError, QueryResult, Result, StatementResult, Value};

use crate::handle::LeaseHandle;
use crate::pool::ConnectionPool;

/// A leased connection
///
/// Exposes the full [`Connection`] capability set. Every call forwards to
/// the raw connection except `close`, which returns the lease to the pool
/// instead of closing the transport; dropping an unclosed lease returns it
/// too. Once the lease has been returned, or the pool has revoked it, every
/// fallible call fails with [`DbError::LeaseInvalid`].
pub struct Lease {
    handle: Arc<LeaseHandle>,
    pool: ConnectionPool,
    returned: AtomicBool,
}

impl Lease {
    pub(crate) fn new(handle: Arc<LeaseHandle>, pool: ConnectionPool) -> Self {
        Self {
            handle,
            pool,
            returned: AtomicBool::new(false),
        }
    }

    /// Unwrap the raw transport connection behind this lease
    pub fn raw_connection(&self) -> Arc<dyn Connection> {
        self.handle.raw().clone()
    }

    fn check(&self) -> Result<()> {
        if self.handle.is_valid() {
            Ok(())
        } else {
            Err(DbError::LeaseInvalid)
        }
    }

    fn give_back(&self) {
        if !self.returned.swap(true, Ordering::SeqCst) {
            self.pool.return_lease(&self.handle);
        }
    }
}

impl Connection for Lease {
    fn driver_name(&self) -> &str {
        self.handle.raw().driver_name()
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.check()?;
        self.handle.raw().execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.check()?;
        self.handle.raw().query(sql, params)
    }

    fn auto_commit(&self) -> bool {
        self.handle.raw().auto_commit()
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.check()?;
        self.handle.raw().set_auto_commit(auto_commit)
    }

    fn commit(&self) -> Result<()> {
        self.check()?;
        self.handle.raw().commit()
    }

    fn rollback(&self) -> Result<()> {
        self.check()?;
        self.handle.raw().rollback()
    }

    /// Return the lease to the pool; the raw connection stays open
    ///
    /// Closing an already-returned or revoked lease is a no-op.
    fn close(&self) -> Result<()> {
        self.give_back();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        !self.handle.is_valid() || self.handle.raw().is_closed()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.give_back();
    }
}

// Equality and hashing follow the raw connection's identity, so callers can
// key on a lease the way they would key on the connection itself.
impl PartialEq for Lease {
    fn eq(&self, other: &Self) -> bool {
        self.handle.id() == other.handle.id()
    }
}

impl Eq for Lease {}

impl Hash for Lease {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.id().hash(state);
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("conn", &self.handle.id())
            .field("valid", &self.handle.is_valid())
            .finish()
    }
}
