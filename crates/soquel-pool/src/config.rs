//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls admission limits, overdue-lease reclamation, the wait interval
/// between retry sweeps, and the liveness probe. Every option can be changed
/// on a live pool through the pool's setters; any change force-closes all
/// pooled connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Cap on leased connections outstanding; above this, callers wait
    pub(crate) max_active: usize,
    /// Cap on parked connections; surplus are hard-closed on return
    pub(crate) max_idle: usize,
    /// Lease age in milliseconds past which an active lease is reclaimable
    pub(crate) max_checkout_time_ms: u64,
    /// Bounded wait interval in milliseconds between retry sweeps
    pub(crate) wait_time_ms: u64,
    /// Per-caller consecutive bad-connection ceiling before failure
    pub(crate) max_local_bad_tolerance: usize,
    /// Enables the active liveness probe
    pub(crate) ping_enabled: bool,
    /// The probe statement (driver-specific)
    pub(crate) ping_query: String,
    /// Minimum idle-age in milliseconds before a probe is issued
    pub(crate) ping_not_used_for_ms: u64,
}

impl PoolConfig {
    /// Create a pool configuration with default settings
    pub fn new() -> Self {
        Self {
            max_active: 10,
            max_idle: 5,
            max_checkout_time_ms: 20_000,
            wait_time_ms: 20_000,
            max_local_bad_tolerance: 3,
            ping_enabled: false,
            ping_query: "NO PING QUERY SET".to_string(),
            ping_not_used_for_ms: 0,
        }
    }

    /// Set the maximum number of active connections
    ///
    /// # Panics
    ///
    /// Panics if `max_active` is 0.
    pub fn with_max_active(mut self, max_active: usize) -> Self {
        assert!(max_active > 0, "max_active must be greater than 0");
        self.max_active = max_active;
        self
    }

    /// Set the maximum number of idle connections
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the maximum checkout time in milliseconds
    pub fn with_max_checkout_time_ms(mut self, timeout_ms: u64) -> Self {
        self.max_checkout_time_ms = timeout_ms;
        self
    }

    /// Set the wait interval in milliseconds
    pub fn with_wait_time_ms(mut self, wait_ms: u64) -> Self {
        self.wait_time_ms = wait_ms;
        self
    }

    /// Set the per-caller bad-connection tolerance
    pub fn with_max_local_bad_tolerance(mut self, tolerance: usize) -> Self {
        self.max_local_bad_tolerance = tolerance;
        self
    }

    /// Enable or disable the liveness probe
    pub fn with_ping_enabled(mut self, enabled: bool) -> Self {
        self.ping_enabled = enabled;
        self
    }

    /// Set the probe statement
    pub fn with_ping_query(mut self, query: impl Into<String>) -> Self {
        self.ping_query = query.into();
        self
    }

    /// Set the minimum idle-age before a probe is issued, in milliseconds
    pub fn with_ping_not_used_for_ms(mut self, millis: u64) -> Self {
        self.ping_not_used_for_ms = millis;
        self
    }

    /// Get the maximum number of active connections
    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Get the maximum number of idle connections
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// Get the maximum checkout time in milliseconds
    pub fn max_checkout_time_ms(&self) -> u64 {
        self.max_checkout_time_ms
    }

    /// Get the maximum checkout time as a Duration
    pub fn max_checkout_time(&self) -> Duration {
        Duration::from_millis(self.max_checkout_time_ms)
    }

    /// Get the wait interval in milliseconds
    pub fn wait_time_ms(&self) -> u64 {
        self.wait_time_ms
    }

    /// Get the wait interval as a Duration
    pub fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_ms)
    }

    /// Get the per-caller bad-connection tolerance
    pub fn max_local_bad_tolerance(&self) -> usize {
        self.max_local_bad_tolerance
    }

    /// Check if the liveness probe is enabled
    pub fn ping_enabled(&self) -> bool {
        self.ping_enabled
    }

    /// Get the probe statement
    pub fn ping_query(&self) -> &str {
        &self.ping_query
    }

    /// Get the minimum idle-age before a probe is issued, in milliseconds
    pub fn ping_not_used_for_ms(&self) -> u64 {
        self.ping_not_used_for_ms
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - max_active: 10
    /// - max_idle: 5
    /// - max_checkout_time: 20 seconds
    /// - wait_time: 20 seconds
    /// - max_local_bad_tolerance: 3
    /// - ping: disabled
    fn default() -> Self {
        Self::new()
    }
}
