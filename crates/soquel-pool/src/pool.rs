//! Connection pool implementation

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::factory::{ConnectParams, ConnectionFactory};
use crate::handle::LeaseHandle;
use crate::health::HealthChecker;
use crate::lease::Lease;
use crate::state::PoolState;
use crate::stats::{PoolStats, PoolStatus};

/// State behind the pool monitor
struct PoolInner {
    params: ConnectParams,
    config: PoolConfig,
    /// Fingerprint of `params` as of the last (re)configuration; leases
    /// carrying any other code are not re-parked
    expected_type_code: u64,
    state: PoolState,
    closed: bool,
}

struct PoolShared {
    factory: Arc<dyn ConnectionFactory>,
    monitor: Mutex<PoolInner>,
    /// Signalled whenever a connection is re-parked
    available: Condvar,
}

impl Drop for PoolShared {
    fn drop(&mut self) {
        let inner = self.monitor.get_mut();
        for handle in inner.state.active.drain(..).chain(inner.state.idle.drain(..)) {
            handle.invalidate();
            let _ = handle.raw().close();
        }
    }
}

/// A synchronous, thread-safe connection pool
///
/// Multiplexes a bounded set of raw transport connections across many
/// concurrent callers. Checkout blocks when the pool is saturated, reclaims
/// leases held past the configured checkout time, and optionally probes
/// idle connections with a ping query before serving them again.
///
/// The pool is internally serialized by a single monitor: creating a raw
/// connection, pinging, and closing all happen while it is held. This keeps
/// the counting invariants trivially checkable; callers must not expect
/// parallel checkout when the driver itself is slow.
///
/// Cloning is cheap and every clone drives the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// Create a new pool over the given connect parameters and factory
    ///
    /// # Panics
    ///
    /// Panics if `config.max_active()` is 0.
    pub fn new<F: ConnectionFactory>(
        params: ConnectParams,
        config: PoolConfig,
        factory: F,
    ) -> Self {
        assert!(config.max_active() > 0, "max_active must be greater than 0");
        let expected_type_code = params.type_code();
        Self {
            shared: Arc::new(PoolShared {
                factory: Arc::new(factory),
                monitor: Mutex::new(PoolInner {
                    params,
                    config,
                    expected_type_code,
                    state: PoolState::new(),
                    closed: false,
                }),
                available: Condvar::new(),
            }),
        }
    }

    /// Check out a connection from the pool
    ///
    /// Hands out the head of the idle list when one is parked, creates a
    /// new connection while below `max_active`, reclaims the oldest active
    /// lease once it is overdue, and otherwise blocks in bounded waits until
    /// a connection is returned. Every candidate is health-checked before it
    /// is served.
    pub fn checkout(&self) -> Result<Lease, PoolError> {
        let attempt_start = Instant::now();
        let mut counted_wait = false;
        let mut local_bad: usize = 0;
        let mut lease: Option<Arc<LeaseHandle>> = None;

        let shared = &self.shared;
        let mut inner = shared.monitor.lock();

        while lease.is_none() {
            if inner.closed {
                return Err(PoolError::Interrupted);
            }

            let candidate = if let Some(handle) = inner.state.idle.pop_front() {
                tracing::debug!(conn = handle.id(), "checked out connection from pool");
                Some(handle)
            } else if inner.state.active.len() < inner.config.max_active() {
                let raw = shared
                    .factory
                    .create(&inner.params)
                    .map_err(PoolError::CheckoutFailed)?;
                let handle = Arc::new(LeaseHandle::new(raw));
                tracing::debug!(conn = handle.id(), "created connection");
                Some(handle)
            } else {
                let oldest = inner
                    .state
                    .active
                    .front()
                    .cloned()
                    .expect("active list is non-empty while the pool is saturated");
                let checkout_age = oldest.checkout_age_ms();
                if checkout_age > inner.config.max_checkout_time_ms() {
                    // The oldest lessee is overdue; take its connection back.
                    inner.state.claimed_overdue_count += 1;
                    inner.state.accumulated_checkout_time_of_overdue_ms += checkout_age;
                    inner.state.accumulated_checkout_time_ms += checkout_age;
                    inner.state.active.pop_front();
                    if !oldest.raw().auto_commit() {
                        if let Err(err) = oldest.raw().rollback() {
                            tracing::debug!(
                                conn = oldest.id(),
                                error = %err,
                                "bad connection, could not roll back"
                            );
                        }
                    }
                    let handle = Arc::new(LeaseHandle::adopt(
                        oldest.raw().clone(),
                        oldest.created_at_ms(),
                        oldest.last_used_at_ms(),
                    ));
                    oldest.invalidate();
                    tracing::debug!(conn = handle.id(), "claimed overdue connection");
                    Some(handle)
                } else {
                    // Nothing reclaimable; block until a return wakes us or
                    // the wait interval elapses, then re-run the sweep.
                    if !counted_wait {
                        inner.state.had_to_wait_count += 1;
                        counted_wait = true;
                    }
                    let wait_time = inner.config.wait_time();
                    tracing::debug!(
                        wait_ms = inner.config.wait_time_ms(),
                        "waiting for a returned connection"
                    );
                    let wait_start = Instant::now();
                    let _ = shared.available.wait_for(&mut inner, wait_time);
                    inner.state.accumulated_wait_time_ms +=
                        wait_start.elapsed().as_millis() as u64;
                    None
                }
            };

            if let Some(handle) = candidate {
                if HealthChecker::new(&inner.config).is_usable(&handle) {
                    // Hand-out must start from a clean transactional state.
                    if !handle.raw().auto_commit() {
                        handle.raw().rollback().map_err(PoolError::CheckoutFailed)?;
                    }
                    handle.stamp_checkout(inner.expected_type_code);
                    inner.state.active.push_back(handle.clone());
                    inner.state.request_count += 1;
                    inner.state.accumulated_request_time_ms +=
                        attempt_start.elapsed().as_millis() as u64;
                    lease = Some(handle);
                } else {
                    tracing::debug!(
                        conn = handle.id(),
                        "a bad connection was returned from the pool, getting another"
                    );
                    inner.state.bad_connection_count += 1;
                    local_bad += 1;
                    if local_bad > inner.config.max_idle() + inner.config.max_local_bad_tolerance()
                    {
                        tracing::debug!("could not get a good connection to the database");
                        return Err(PoolError::Unreachable {
                            attempts: local_bad,
                        });
                    }
                }
            }
        }

        let handle = lease.ok_or(PoolError::NullLease)?;
        Ok(Lease::new(handle, self.clone()))
    }

    /// Take a lease back from a caller
    ///
    /// Valid leases carrying the current type code are re-parked (as a
    /// fresh handle, so the old one goes permanently inert) or hard-closed
    /// when the idle list is full. Stale and revoked leases are discarded.
    pub(crate) fn return_lease(&self, handle: &Arc<LeaseHandle>) {
        let shared = &self.shared;
        let mut inner = shared.monitor.lock();

        if let Some(pos) = inner
            .state
            .active
            .iter()
            .position(|h| Arc::ptr_eq(h, handle))
        {
            inner.state.active.remove(pos);
        }

        if !handle.is_valid() {
            // The raw connection is owned elsewhere by now (or already
            // hard-closed); just record the bad return.
            tracing::debug!(
                conn = handle.id(),
                "a bad lease attempted to return to the pool, discarding"
            );
            inner.state.bad_connection_count += 1;
            return;
        }

        if handle.type_code() != inner.expected_type_code {
            tracing::debug!(
                conn = handle.id(),
                "lease carries a stale type code, closing connection"
            );
            inner.state.bad_connection_count += 1;
            handle.invalidate();
            let _ = handle.raw().close();
            return;
        }

        inner.state.accumulated_checkout_time_ms += handle.checkout_age_ms();
        if !handle.raw().auto_commit() {
            if let Err(err) = handle.raw().rollback() {
                tracing::debug!(conn = handle.id(), error = %err, "rollback on return failed");
            }
        }

        if inner.state.idle.len() < inner.config.max_idle() {
            let parked = Arc::new(LeaseHandle::adopt(
                handle.raw().clone(),
                handle.created_at_ms(),
                handle.last_used_at_ms(),
            ));
            inner.state.idle.push_back(parked);
            handle.invalidate();
            tracing::debug!(conn = handle.id(), "returned connection to pool");
            shared.available.notify_all();
        } else {
            handle.invalidate();
            let _ = handle.raw().close();
            tracing::debug!(conn = handle.id(), "idle list full, closed connection");
        }
    }

    /// Invalidate and hard-close every pooled connection
    ///
    /// Recomputes the expected type code from the current connect
    /// parameters first, so leases still held by callers come back stale
    /// and are never re-parked. Individual close failures are swallowed.
    pub fn force_close_all(&self) {
        let mut inner = self.shared.monitor.lock();
        let inner = &mut *inner;
        inner.expected_type_code = inner.params.type_code();

        let drained: Vec<Arc<LeaseHandle>> = inner
            .state
            .active
            .drain(..)
            .chain(inner.state.idle.drain(..))
            .collect();
        for handle in drained {
            handle.invalidate();
            if !handle.raw().auto_commit() {
                let _ = handle.raw().rollback();
            }
            let _ = handle.raw().close();
        }
        tracing::debug!("forcefully closed/removed all connections");
    }

    /// Shut the pool down
    ///
    /// Force-closes every pooled connection and wakes all blocked callers;
    /// they, and any later caller, fail with [`PoolError::Interrupted`].
    pub fn shutdown(&self) {
        {
            let mut inner = self.shared.monitor.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
        }
        self.force_close_all();
        self.shared.available.notify_all();
        tracing::debug!("pool shut down");
    }

    /// Get the connection url
    pub fn url(&self) -> String {
        self.shared.monitor.lock().params.url().to_string()
    }

    /// Get the username
    pub fn username(&self) -> String {
        self.shared.monitor.lock().params.username().to_string()
    }

    /// Get a copy of the current configuration
    pub fn config(&self) -> PoolConfig {
        self.shared.monitor.lock().config.clone()
    }

    /// Point-in-time statistics snapshot
    pub fn stats(&self) -> PoolStats {
        self.shared.monitor.lock().state.snapshot()
    }

    /// Human-readable status dump (configuration plus statistics)
    pub fn status(&self) -> PoolStatus {
        let inner = self.shared.monitor.lock();
        PoolStatus {
            url: inner.params.url().to_string(),
            username: inner.params.username().to_string(),
            config: inner.config.clone(),
            stats: inner.state.snapshot(),
        }
    }

    /// Change the connection url; force-closes all pooled connections
    pub fn set_url(&self, url: impl Into<String>) {
        self.shared.monitor.lock().params.set_url(url.into());
        self.force_close_all();
    }

    /// Change the username; force-closes all pooled connections
    pub fn set_username(&self, username: impl Into<String>) {
        self.shared.monitor.lock().params.set_username(username.into());
        self.force_close_all();
    }

    /// Change the password; force-closes all pooled connections
    pub fn set_password(&self, password: impl Into<String>) {
        self.shared.monitor.lock().params.set_password(password.into());
        self.force_close_all();
    }

    /// Change the active-connection cap; force-closes all pooled connections
    ///
    /// # Panics
    ///
    /// Panics if `max_active` is 0.
    pub fn set_max_active(&self, max_active: usize) {
        assert!(max_active > 0, "max_active must be greater than 0");
        self.shared.monitor.lock().config.max_active = max_active;
        self.force_close_all();
    }

    /// Change the idle-connection cap; force-closes all pooled connections
    pub fn set_max_idle(&self, max_idle: usize) {
        self.shared.monitor.lock().config.max_idle = max_idle;
        self.force_close_all();
    }

    /// Change the overdue threshold; force-closes all pooled connections
    pub fn set_max_checkout_time_ms(&self, millis: u64) {
        self.shared.monitor.lock().config.max_checkout_time_ms = millis;
        self.force_close_all();
    }

    /// Change the wait interval; force-closes all pooled connections
    pub fn set_wait_time_ms(&self, millis: u64) {
        self.shared.monitor.lock().config.wait_time_ms = millis;
        self.force_close_all();
    }

    /// Change the bad-connection tolerance; force-closes all pooled
    /// connections
    pub fn set_max_local_bad_tolerance(&self, tolerance: usize) {
        self.shared.monitor.lock().config.max_local_bad_tolerance = tolerance;
        self.force_close_all();
    }

    /// Enable or disable the liveness probe; force-closes all pooled
    /// connections
    pub fn set_ping_enabled(&self, enabled: bool) {
        self.shared.monitor.lock().config.ping_enabled = enabled;
        self.force_close_all();
    }

    /// Change the probe statement; force-closes all pooled connections
    pub fn set_ping_query(&self, query: impl Into<String>) {
        self.shared.monitor.lock().config.ping_query = query.into();
        self.force_close_all();
    }

    /// Change the probe cool-down; force-closes all pooled connections
    pub fn set_ping_not_used_for_ms(&self, millis: u64) {
        self.shared.monitor.lock().config.ping_not_used_for_ms = millis;
        self.force_close_all();
    }
}
