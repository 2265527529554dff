//! Lease liveness checking

use crate::config::PoolConfig;
use crate::handle::LeaseHandle;

/// Decides whether a candidate lease is still fit to hand out
///
/// Borrows the pool's current configuration per check; the checker carries
/// no state of its own, so a reconfigured pool is picked up on the very
/// next checkout.
pub(crate) struct HealthChecker<'a> {
    config: &'a PoolConfig,
}

impl<'a> HealthChecker<'a> {
    pub fn new(config: &'a PoolConfig) -> Self {
        Self { config }
    }

    /// Check the validity flag, the transport's closed state, and, once the
    /// probe cool-down has passed, the configured ping query.
    ///
    /// A failed probe hard-closes the raw connection before reporting the
    /// handle unusable.
    pub fn is_usable(&self, handle: &LeaseHandle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        if handle.raw().is_closed() {
            tracing::debug!(conn = handle.id(), "connection reports closed");
            return false;
        }
        if !self.config.ping_enabled {
            return true;
        }
        if handle.elapsed_since_last_use_ms() <= self.config.ping_not_used_for_ms {
            // Cool-down not reached; the closed check above is authoritative.
            return true;
        }
        self.ping(handle)
    }

    fn ping(&self, handle: &LeaseHandle) -> bool {
        tracing::debug!(conn = handle.id(), query = %self.config.ping_query, "testing connection");
        let raw = handle.raw();
        match raw.query(&self.config.ping_query, &[]) {
            Ok(_) => {
                // The probe may have opened an implicit transaction.
                if !raw.auto_commit() {
                    if let Err(err) = raw.rollback() {
                        tracing::warn!(conn = handle.id(), error = %err, "rollback after ping failed");
                        let _ = raw.close();
                        return false;
                    }
                }
                tracing::debug!(conn = handle.id(), "connection is good");
                true
            }
            Err(err) => {
                tracing::warn!(
                    conn = handle.id(),
                    query = %self.config.ping_query,
                    error = %err,
                    "execution of ping query failed"
                );
                let _ = raw.close();
                false
            }
        }
    }
}
