//! Shared pool state: connection lists and lifetime counters

use std::collections::VecDeque;
use std::sync::Arc;

use crate::handle::LeaseHandle;
use crate::stats::PoolStats;

/// Mutable pool state, guarded by the pool monitor
///
/// The counters are monotonically nondecreasing over the life of the pool;
/// consumers must treat them as cumulative totals, not rates.
pub(crate) struct PoolState {
    /// Parked connections; head = next to hand out
    pub idle: VecDeque<Arc<LeaseHandle>>,
    /// Leased connections; head = oldest outstanding lease
    pub active: VecDeque<Arc<LeaseHandle>>,
    /// Number of successful checkouts
    pub request_count: u64,
    /// Total time spent producing leases, from request to hand-out
    pub accumulated_request_time_ms: u64,
    /// Total time leases were held, from checkout to return or reclamation
    pub accumulated_checkout_time_ms: u64,
    /// Portion of the checkout time contributed by reclaimed overdue leases
    pub accumulated_checkout_time_of_overdue_ms: u64,
    /// Total time callers spent blocked waiting for a returned connection
    pub accumulated_wait_time_ms: u64,
    /// Number of overdue leases forcibly reclaimed
    pub claimed_overdue_count: u64,
    /// Number of checkout attempts that had to wait at least once
    pub had_to_wait_count: u64,
    /// Number of bad connections seen, on checkout or on return
    pub bad_connection_count: u64,
}

impl PoolState {
    pub fn new() -> Self {
        Self {
            idle: VecDeque::new(),
            active: VecDeque::new(),
            request_count: 0,
            accumulated_request_time_ms: 0,
            accumulated_checkout_time_ms: 0,
            accumulated_checkout_time_of_overdue_ms: 0,
            accumulated_wait_time_ms: 0,
            claimed_overdue_count: 0,
            had_to_wait_count: 0,
            bad_connection_count: 0,
        }
    }

    /// Point-in-time snapshot of sizes and counters
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.len(),
            active: self.active.len(),
            request_count: self.request_count,
            accumulated_request_time_ms: self.accumulated_request_time_ms,
            accumulated_checkout_time_ms: self.accumulated_checkout_time_ms,
            accumulated_checkout_time_of_overdue_ms: self.accumulated_checkout_time_of_overdue_ms,
            accumulated_wait_time_ms: self.accumulated_wait_time_ms,
            claimed_overdue_count: self.claimed_overdue_count,
            had_to_wait_count: self.had_to_wait_count,
            bad_connection_count: self.bad_connection_count,
        }
    }
}
