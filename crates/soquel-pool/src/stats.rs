//! Pool statistics and status reporting

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PoolConfig;

/// Statistics about a connection pool's current state and lifetime totals
///
/// All counters are cumulative since the pool was created; they survive
/// reconfiguration and force-close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub(crate) idle: usize,
    pub(crate) active: usize,
    pub(crate) request_count: u64,
    pub(crate) accumulated_request_time_ms: u64,
    pub(crate) accumulated_checkout_time_ms: u64,
    pub(crate) accumulated_checkout_time_of_overdue_ms: u64,
    pub(crate) accumulated_wait_time_ms: u64,
    pub(crate) claimed_overdue_count: u64,
    pub(crate) had_to_wait_count: u64,
    pub(crate) bad_connection_count: u64,
}

impl PoolStats {
    /// Number of parked connections
    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Number of leased connections
    pub fn active(&self) -> usize {
        self.active
    }

    /// Number of successful checkouts
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Total time spent producing leases, in milliseconds
    pub fn accumulated_request_time_ms(&self) -> u64 {
        self.accumulated_request_time_ms
    }

    /// Total time leases were held, in milliseconds
    pub fn accumulated_checkout_time_ms(&self) -> u64 {
        self.accumulated_checkout_time_ms
    }

    /// Portion of the checkout time contributed by reclaimed overdue leases
    pub fn accumulated_checkout_time_of_overdue_ms(&self) -> u64 {
        self.accumulated_checkout_time_of_overdue_ms
    }

    /// Total time callers spent blocked waiting, in milliseconds
    pub fn accumulated_wait_time_ms(&self) -> u64 {
        self.accumulated_wait_time_ms
    }

    /// Number of overdue leases forcibly reclaimed
    pub fn claimed_overdue_count(&self) -> u64 {
        self.claimed_overdue_count
    }

    /// Number of checkout attempts that had to wait at least once
    pub fn had_to_wait_count(&self) -> u64 {
        self.had_to_wait_count
    }

    /// Number of bad connections seen, on checkout or on return
    pub fn bad_connection_count(&self) -> u64 {
        self.bad_connection_count
    }

    /// Average time to produce a lease, per successful checkout
    pub fn average_request_time_ms(&self) -> u64 {
        if self.request_count == 0 {
            0
        } else {
            self.accumulated_request_time_ms / self.request_count
        }
    }

    /// Average time a lease was held, per successful checkout
    pub fn average_checkout_time_ms(&self) -> u64 {
        if self.request_count == 0 {
            0
        } else {
            self.accumulated_checkout_time_ms / self.request_count
        }
    }

    /// Average held time of reclaimed overdue leases
    pub fn average_overdue_checkout_time_ms(&self) -> u64 {
        if self.claimed_overdue_count == 0 {
            0
        } else {
            self.accumulated_checkout_time_of_overdue_ms / self.claimed_overdue_count
        }
    }

    /// Average blocked time, per waiting checkout attempt
    pub fn average_wait_time_ms(&self) -> u64 {
        if self.had_to_wait_count == 0 {
            0
        } else {
            self.accumulated_wait_time_ms / self.had_to_wait_count
        }
    }
}

/// Human-readable point-in-time view of a pool's configuration and
/// statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub(crate) url: String,
    pub(crate) username: String,
    pub(crate) config: PoolConfig,
    pub(crate) stats: PoolStats,
}

impl PoolStatus {
    /// The pool's connection url
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The pool's username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The configuration in force when the snapshot was taken
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// The statistics snapshot
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===CONFIGURATION===============================================")?;
        writeln!(f, " {:<34} {}", "url", self.url)?;
        writeln!(f, " {:<34} {}", "username", self.username)?;
        writeln!(f, " {:<34} {}", "password", "************")?;
        writeln!(f, " {:<34} {}", "max_active", self.config.max_active)?;
        writeln!(f, " {:<34} {}", "max_idle", self.config.max_idle)?;
        writeln!(f, " {:<34} {}", "max_checkout_time_ms", self.config.max_checkout_time_ms)?;
        writeln!(f, " {:<34} {}", "wait_time_ms", self.config.wait_time_ms)?;
        writeln!(f, " {:<34} {}", "max_local_bad_tolerance", self.config.max_local_bad_tolerance)?;
        writeln!(f, " {:<34} {}", "ping_enabled", self.config.ping_enabled)?;
        writeln!(f, " {:<34} {}", "ping_query", self.config.ping_query)?;
        writeln!(f, " {:<34} {}", "ping_not_used_for_ms", self.config.ping_not_used_for_ms)?;
        writeln!(f, "---STATUS------------------------------------------------------")?;
        writeln!(f, " {:<34} {}", "active", self.stats.active)?;
        writeln!(f, " {:<34} {}", "idle", self.stats.idle)?;
        writeln!(f, " {:<34} {}", "request_count", self.stats.request_count)?;
        writeln!(f, " {:<34} {}", "average_request_time_ms", self.stats.average_request_time_ms())?;
        writeln!(f, " {:<34} {}", "average_checkout_time_ms", self.stats.average_checkout_time_ms())?;
        writeln!(f, " {:<34} {}", "claimed_overdue_count", self.stats.claimed_overdue_count)?;
        writeln!(
            f,
            " {:<34} {}",
            "average_overdue_checkout_time_ms",
            self.stats.average_overdue_checkout_time_ms()
        )?;
        writeln!(f, " {:<34} {}", "had_to_wait_count", self.stats.had_to_wait_count)?;
        writeln!(f, " {:<34} {}", "average_wait_time_ms", self.stats.average_wait_time_ms())?;
        writeln!(f, " {:<34} {}", "bad_connection_count", self.stats.bad_connection_count)?;
        write!(f, "===============================================================")
    }
}
