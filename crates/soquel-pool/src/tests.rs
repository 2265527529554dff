//! Tests for the connection pool

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use soquel_core::{Connection, DbError, QueryResult, Result, StatementResult, Value};

use crate::{ConnectParams, ConnectionPool, PoolConfig, PoolError};

/// Mock connection for testing
struct MockConnection {
    #[allow(dead_code)]
    id: usize,
    closed: AtomicBool,
    auto_commit: AtomicBool,
    fail_queries: AtomicBool,
    queries: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl MockConnection {
    fn new(id: usize) -> Self {
        Self {
            id,
            closed: AtomicBool::new(false),
            auto_commit: AtomicBool::new(true),
            fail_queries: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
        }
    }

    fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Connection("connection is closed".into()));
        }
        Ok(StatementResult { affected_rows: 0 })
    }

    fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Connection("connection is closed".into()));
        }
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(DbError::Query("induced query failure".into()));
        }
        Ok(QueryResult::empty())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::SeqCst)
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.auto_commit.store(auto_commit, Ordering::SeqCst);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock factory that counts and remembers the connections it created
struct MockFactory {
    counter: AtomicUsize,
    born_closed: AtomicBool,
    fail_creates: AtomicBool,
    created: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockFactory {
    fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            born_closed: AtomicBool::new(false),
            fail_creates: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
        }
    }

    fn count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    /// Make every connection report closed from birth
    fn set_born_closed(&self, born_closed: bool) {
        self.born_closed.store(born_closed, Ordering::SeqCst);
    }

    /// Make `create` fail outright
    fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    fn created(&self, index: usize) -> Arc<MockConnection> {
        self.created.lock()[index].clone()
    }
}

impl crate::ConnectionFactory for MockFactory {
    fn create(&self, _params: &ConnectParams) -> Result<Arc<dyn Connection>> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(DbError::Connection("factory refused to connect".into()));
        }
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(MockConnection::new(id));
        if self.born_closed.load(Ordering::SeqCst) {
            conn.closed.store(true, Ordering::SeqCst);
        }
        self.created.lock().push(conn.clone());
        Ok(conn)
    }
}

fn test_pool(config: PoolConfig) -> (ConnectionPool, Arc<MockFactory>) {
    let factory = Arc::new(MockFactory::new());
    let params = ConnectParams::new("mock://primary", "app", "sekret");
    let pool = ConnectionPool::new(params, config, factory.clone());
    (pool, factory)
}

// =============================================================================
// PoolConfig tests
// =============================================================================

#[test]
fn test_pool_config_defaults() {
    let config = PoolConfig::new();
    assert_eq!(config.max_active(), 10);
    assert_eq!(config.max_idle(), 5);
    assert_eq!(config.max_checkout_time(), Duration::from_millis(20_000));
    assert_eq!(config.wait_time(), Duration::from_millis(20_000));
    assert_eq!(config.max_local_bad_tolerance(), 3);
    assert!(!config.ping_enabled());
    assert_eq!(config.ping_query(), "NO PING QUERY SET");
    assert_eq!(config.ping_not_used_for_ms(), 0);
}

#[test]
fn test_pool_config_builder() {
    let config = PoolConfig::new()
        .with_max_active(4)
        .with_max_idle(2)
        .with_max_checkout_time_ms(5_000)
        .with_wait_time_ms(250)
        .with_max_local_bad_tolerance(1)
        .with_ping_enabled(true)
        .with_ping_query("SELECT 1")
        .with_ping_not_used_for_ms(60_000);

    assert_eq!(config.max_active(), 4);
    assert_eq!(config.max_idle(), 2);
    assert_eq!(config.max_checkout_time_ms(), 5_000);
    assert_eq!(config.wait_time_ms(), 250);
    assert_eq!(config.max_local_bad_tolerance(), 1);
    assert!(config.ping_enabled());
    assert_eq!(config.ping_query(), "SELECT 1");
    assert_eq!(config.ping_not_used_for_ms(), 60_000);
}

#[test]
fn test_pool_config_serialization() {
    let config = PoolConfig::new()
        .with_max_active(4)
        .with_ping_query("SELECT 1");

    let json = serde_json::to_string(&config).expect("serialize");
    let deserialized: PoolConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(config, deserialized);
}

#[test]
#[should_panic(expected = "max_active must be greater than 0")]
fn test_pool_config_zero_max_active() {
    let _ = PoolConfig::new().with_max_active(0);
}

// =============================================================================
// ConnectParams tests
// =============================================================================

#[test]
fn test_type_code_fingerprint() {
    let a = ConnectParams::new("mock://primary", "app", "sekret");
    let b = ConnectParams::new("mock://primary", "app", "sekret");
    assert_eq!(a.type_code(), b.type_code());

    assert_ne!(
        a.type_code(),
        ConnectParams::new("mock://replica", "app", "sekret").type_code()
    );
    assert_ne!(
        a.type_code(),
        ConnectParams::new("mock://primary", "admin", "sekret").type_code()
    );
    assert_ne!(
        a.type_code(),
        ConnectParams::new("mock://primary", "app", "hunter2").type_code()
    );
}

// =============================================================================
// Checkout / return tests
// =============================================================================

#[test]
fn test_checkout_and_return_roundtrip() {
    let config = PoolConfig::new().with_max_active(1).with_max_idle(1);
    let (pool, factory) = test_pool(config);

    let conn = pool.checkout().expect("checkout");
    assert_eq!(conn.driver_name(), "mock");
    let stats = pool.stats();
    assert_eq!(stats.active(), 1);
    assert_eq!(stats.idle(), 0);

    thread::sleep(Duration::from_millis(20));
    drop(conn);

    let stats = pool.stats();
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.idle(), 1);
    assert_eq!(stats.request_count(), 1);
    assert!(stats.accumulated_checkout_time_ms() > 0);
    assert_eq!(stats.bad_connection_count(), 0);
    assert_eq!(factory.count(), 1);
}

#[test]
fn test_idle_connection_reused() {
    let (pool, factory) = test_pool(PoolConfig::new());

    let first = pool.checkout().expect("first checkout");
    let raw_first = first.raw_connection();
    drop(first);

    let second = pool.checkout().expect("second checkout");
    assert!(Arc::ptr_eq(&raw_first, &second.raw_connection()));
    assert_eq!(factory.count(), 1);
}

#[test]
fn test_saturation_wait() {
    let config = PoolConfig::new()
        .with_max_active(1)
        .with_max_idle(1)
        .with_max_checkout_time_ms(10_000)
        .with_wait_time_ms(50);
    let (pool, _factory) = test_pool(config);

    let held = pool.checkout().expect("first checkout");

    let pool2 = pool.clone();
    let waiter = thread::spawn(move || pool2.checkout().is_ok());

    thread::sleep(Duration::from_millis(200));
    drop(held);

    assert!(waiter.join().expect("join waiter"));

    let stats = pool.stats();
    assert_eq!(stats.request_count(), 2);
    assert_eq!(stats.had_to_wait_count(), 1);
    assert!(stats.accumulated_wait_time_ms() > 0);
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.idle(), 1);
}

#[test]
fn test_overdue_reclamation() {
    let config = PoolConfig::new()
        .with_max_active(1)
        .with_max_idle(1)
        .with_max_checkout_time_ms(100)
        .with_wait_time_ms(50);
    let (pool, factory) = test_pool(config);

    let stale = pool.checkout().expect("first checkout");
    let raw = stale.raw_connection();
    thread::sleep(Duration::from_millis(200));

    // Pool is saturated and the outstanding lease is past its checkout
    // time, so this caller takes the connection over.
    let fresh = pool.checkout().expect("reclaiming checkout");
    assert!(Arc::ptr_eq(&raw, &fresh.raw_connection()));
    assert_eq!(factory.count(), 1);

    let stats = pool.stats();
    assert_eq!(stats.claimed_overdue_count(), 1);
    assert!(stats.accumulated_checkout_time_of_overdue_ms() > 0);

    // The old proxy is permanently inert.
    assert!(matches!(
        stale.execute("UPDATE t SET x = 1", &[]),
        Err(DbError::LeaseInvalid)
    ));
    assert!(stale.is_closed());

    // Its close is a silent no-op; the discarded return is only counted.
    stale.close().expect("close stale lease");
    assert_eq!(pool.stats().bad_connection_count(), 1);
    assert_eq!(pool.stats().active(), 1);

    drop(fresh);
    assert_eq!(pool.stats().idle(), 1);
}

#[test]
fn test_bad_connection_ceiling() {
    let config = PoolConfig::new()
        .with_max_idle(2)
        .with_max_local_bad_tolerance(3);
    let (pool, factory) = test_pool(config);
    factory.set_born_closed(true);

    let err = pool.checkout().expect_err("checkout must fail");
    assert!(matches!(err, PoolError::Unreachable { attempts: 6 }));

    // Ceiling is max_idle + tolerance, strict inequality: the pool burns
    // through exactly one more candidate than the ceiling.
    assert_eq!(factory.count(), 6);
    assert_eq!(pool.stats().bad_connection_count(), 6);
    assert_eq!(pool.stats().request_count(), 0);
}

#[test]
fn test_factory_failure_surfaces_checkout_failed() {
    let (pool, factory) = test_pool(PoolConfig::new());
    factory.set_fail_creates(true);

    let err = pool.checkout().expect_err("checkout must fail");
    assert!(matches!(err, PoolError::CheckoutFailed(_)));
    assert_eq!(factory.count(), 0);
}

#[test]
fn test_max_idle_zero_closes_on_return() {
    let config = PoolConfig::new().with_max_active(1).with_max_idle(0);
    let (pool, factory) = test_pool(config);

    let conn = pool.checkout().expect("checkout");
    let raw = conn.raw_connection();
    drop(conn);

    assert!(raw.is_closed());
    assert_eq!(pool.stats().idle(), 0);

    let _next = pool.checkout().expect("checkout after hard close");
    assert_eq!(factory.count(), 2);
}

#[test]
fn test_double_close_is_noop() {
    let config = PoolConfig::new().with_max_active(1).with_max_idle(1);
    let (pool, _factory) = test_pool(config);

    let conn = pool.checkout().expect("checkout");
    conn.close().expect("first close");
    conn.close().expect("second close");

    let stats = pool.stats();
    assert_eq!(stats.idle(), 1);
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.bad_connection_count(), 0);

    drop(conn);
    let stats = pool.stats();
    assert_eq!(stats.idle(), 1);
    assert_eq!(stats.bad_connection_count(), 0);
    assert_eq!(stats.request_count(), 1);
}

#[test]
fn test_returned_lease_is_inert() {
    let (pool, _factory) = test_pool(PoolConfig::new());

    let conn = pool.checkout().expect("checkout");
    conn.close().expect("close");

    assert!(matches!(
        conn.execute("UPDATE t SET x = 1", &[]),
        Err(DbError::LeaseInvalid)
    ));
    assert!(matches!(conn.query("SELECT 1", &[]), Err(DbError::LeaseInvalid)));
    assert!(matches!(conn.commit(), Err(DbError::LeaseInvalid)));
    assert!(matches!(conn.rollback(), Err(DbError::LeaseInvalid)));
    assert!(matches!(conn.set_auto_commit(false), Err(DbError::LeaseInvalid)));
    assert!(conn.is_closed());
}

#[test]
fn test_rollback_on_return_when_not_auto_commit() {
    let config = PoolConfig::new().with_max_active(1).with_max_idle(1);
    let (pool, factory) = test_pool(config);

    let conn = pool.checkout().expect("checkout");
    conn.set_auto_commit(false).expect("disable auto-commit");
    drop(conn);

    let mock = factory.created(0);
    assert_eq!(mock.rollback_count(), 1);

    // Re-checkout rolls the non-auto-commit connection back again before
    // handing it out.
    let _conn = pool.checkout().expect("checkout again");
    assert_eq!(mock.rollback_count(), 2);
}

// =============================================================================
// Reconfiguration tests
// =============================================================================

#[test]
fn test_reconfiguration_strands_outstanding_leases() {
    let config = PoolConfig::new().with_max_active(2).with_max_idle(2);
    let (pool, _factory) = test_pool(config);

    let conn = pool.checkout().expect("checkout");
    let raw = conn.raw_connection();

    pool.set_url("mock://replica");

    // The raw connection was hard-closed at reconfiguration time and the
    // lease was revoked.
    assert!(raw.is_closed());
    assert!(matches!(conn.query("SELECT 1", &[]), Err(DbError::LeaseInvalid)));

    conn.close().expect("close stranded lease");
    let stats = pool.stats();
    assert_eq!(stats.idle(), 0);
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.bad_connection_count(), 1);
    assert_eq!(pool.url(), "mock://replica");
}

#[test]
fn test_option_mutation_force_closes_idle() {
    let config = PoolConfig::new().with_max_active(1).with_max_idle(1);
    let (pool, factory) = test_pool(config);

    let conn = pool.checkout().expect("checkout");
    drop(conn);
    assert_eq!(pool.stats().idle(), 1);

    pool.set_ping_not_used_for_ms(500);

    assert_eq!(pool.stats().idle(), 0);
    assert!(factory.created(0).is_closed());
    assert_eq!(pool.config().ping_not_used_for_ms(), 500);
}

// =============================================================================
// Ping tests
// =============================================================================

#[test]
fn test_ping_cooldown() {
    let config = PoolConfig::new()
        .with_max_active(1)
        .with_max_idle(1)
        .with_ping_enabled(true)
        .with_ping_query("SELECT 1")
        .with_ping_not_used_for_ms(400);
    let (pool, factory) = test_pool(config);

    let conn = pool.checkout().expect("checkout");
    drop(conn);
    let mock = factory.created(0);
    assert_eq!(mock.query_count(), 0);

    // Idle only briefly: the cool-down is not reached, no probe is issued.
    thread::sleep(Duration::from_millis(100));
    let conn = pool.checkout().expect("checkout inside cool-down");
    assert_eq!(mock.query_count(), 0);
    drop(conn);

    // Idle past the cool-down: the probe runs and the connection is served.
    thread::sleep(Duration::from_millis(600));
    let conn = pool.checkout().expect("checkout after cool-down");
    assert_eq!(mock.query_count(), 1);
    let raw: Arc<dyn Connection> = mock.clone();
    assert!(Arc::ptr_eq(&conn.raw_connection(), &raw));
    drop(conn);
}

#[test]
fn test_failed_ping_discards_connection() {
    let config = PoolConfig::new()
        .with_max_active(1)
        .with_max_idle(1)
        .with_ping_enabled(true)
        .with_ping_query("SELECT 1")
        .with_ping_not_used_for_ms(50);
    let (pool, factory) = test_pool(config);

    let conn = pool.checkout().expect("checkout");
    drop(conn);
    let mock = factory.created(0);

    thread::sleep(Duration::from_millis(100));
    mock.fail_queries.store(true, Ordering::SeqCst);

    // The probe fails, the parked connection is hard-closed and discarded,
    // and a replacement is created.
    let conn = pool.checkout().expect("checkout after failed ping");
    assert!(mock.is_closed());
    assert_eq!(factory.count(), 2);
    let old_raw: Arc<dyn Connection> = mock;
    assert!(!Arc::ptr_eq(&conn.raw_connection(), &old_raw));
    assert_eq!(pool.stats().bad_connection_count(), 1);
}

// =============================================================================
// Concurrency tests
// =============================================================================

#[test]
fn test_single_active_serializes_callers() {
    let config = PoolConfig::new()
        .with_max_active(1)
        .with_max_idle(1)
        .with_max_checkout_time_ms(10_000)
        .with_wait_time_ms(10);
    let (pool, _factory) = test_pool(config);

    let in_use = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicBool::new(false));

    let mut workers = Vec::new();
    for _ in 0..4 {
        let pool = pool.clone();
        let in_use = in_use.clone();
        let overlapped = overlapped.clone();
        workers.push(thread::spawn(move || {
            for _ in 0..5 {
                let lease = pool.checkout().expect("checkout");
                if in_use.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlapped.store(true, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_millis(2));
                in_use.fetch_sub(1, Ordering::SeqCst);
                drop(lease);
            }
        }));
    }
    for worker in workers {
        worker.join().expect("join worker");
    }

    assert!(!overlapped.load(Ordering::SeqCst));
    let stats = pool.stats();
    assert_eq!(stats.request_count(), 20);
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.idle(), 1);
    assert_eq!(stats.bad_connection_count(), 0);
}

#[test]
fn test_shutdown_interrupts_waiter() {
    let config = PoolConfig::new()
        .with_max_active(1)
        .with_max_checkout_time_ms(10_000)
        .with_wait_time_ms(50);
    let (pool, _factory) = test_pool(config);

    let held = pool.checkout().expect("checkout");

    let pool2 = pool.clone();
    let waiter = thread::spawn(move || pool2.checkout());

    thread::sleep(Duration::from_millis(100));
    pool.shutdown();

    let result = waiter.join().expect("join waiter");
    assert!(matches!(result, Err(PoolError::Interrupted)));
    assert!(matches!(pool.checkout(), Err(PoolError::Interrupted)));

    drop(held);
}

// =============================================================================
// Introspection tests
// =============================================================================

#[test]
fn test_lease_equality_and_hash() {
    let config = PoolConfig::new().with_max_active(2).with_max_idle(2);
    let (pool, _factory) = test_pool(config);

    let a = pool.checkout().expect("checkout a");
    let b = pool.checkout().expect("checkout b");
    assert_ne!(a, b);

    let mut set = HashSet::new();
    set.insert(a);
    set.insert(b);
    assert_eq!(set.len(), 2);
}

#[test]
fn test_status_dump() {
    let (pool, _factory) = test_pool(PoolConfig::new().with_ping_query("SELECT 1"));

    let status = pool.status();
    assert_eq!(status.url(), "mock://primary");
    assert_eq!(status.username(), "app");

    let dump = status.to_string();
    assert!(dump.contains("mock://primary"));
    assert!(dump.contains("max_active"));
    assert!(dump.contains("SELECT 1"));
    assert!(dump.contains("************"));
    assert!(!dump.contains("sekret"));
}

#[test]
fn test_stats_averages() {
    let config = PoolConfig::new().with_max_active(1).with_max_idle(1);
    let (pool, _factory) = test_pool(config);

    let stats = pool.stats();
    assert_eq!(stats.average_request_time_ms(), 0);
    assert_eq!(stats.average_checkout_time_ms(), 0);
    assert_eq!(stats.average_overdue_checkout_time_ms(), 0);
    assert_eq!(stats.average_wait_time_ms(), 0);

    let conn = pool.checkout().expect("checkout");
    thread::sleep(Duration::from_millis(20));
    drop(conn);

    let stats = pool.stats();
    assert!(stats.average_checkout_time_ms() > 0);
    assert_eq!(stats.average_wait_time_ms(), 0);
}

#[test]
fn test_stats_serialization() {
    let (pool, _factory) = test_pool(PoolConfig::new());
    let _conn = pool.checkout().expect("checkout");

    let stats = pool.stats();
    let json = serde_json::to_string(&stats).expect("serialize");
    let deserialized: crate::PoolStats = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(stats, deserialized);
}
