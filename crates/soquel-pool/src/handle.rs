//! Pooled connection records

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use soquel_core::Connection;

/// Milliseconds since the Unix epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One pooled connection record
///
/// A handle is in the idle list, in the active list, or discarded, never
/// more than one at a time. Returning or reclaiming a connection mints a
/// fresh handle around the same raw connection and invalidates the old one,
/// so a stale caller-side reference can never reach a connection that has
/// moved on.
///
/// All writes happen under the pool monitor; the atomics exist because the
/// lease proxy reads `valid` outside it.
pub(crate) struct LeaseHandle {
    raw: Arc<dyn Connection>,
    /// Identity fingerprint of the raw connection, for log correlation and
    /// proxy equality
    id: u64,
    /// Fingerprint of the connect parameters in force when this handle was
    /// last handed out
    type_code: AtomicU64,
    created_at_ms: u64,
    last_used_at_ms: AtomicU64,
    checked_out_at_ms: AtomicU64,
    valid: AtomicBool,
}

impl LeaseHandle {
    /// Wrap a freshly created raw connection
    pub fn new(raw: Arc<dyn Connection>) -> Self {
        let now = now_millis();
        Self::with_timestamps(raw, now, now)
    }

    /// Wrap a raw connection taken over from an older handle, keeping its
    /// creation and last-used timestamps
    pub fn adopt(raw: Arc<dyn Connection>, created_at_ms: u64, last_used_at_ms: u64) -> Self {
        Self::with_timestamps(raw, created_at_ms, last_used_at_ms)
    }

    fn with_timestamps(raw: Arc<dyn Connection>, created_at_ms: u64, last_used_at_ms: u64) -> Self {
        let id = Arc::as_ptr(&raw).cast::<()>() as usize as u64;
        Self {
            raw,
            id,
            type_code: AtomicU64::new(0),
            created_at_ms,
            last_used_at_ms: AtomicU64::new(last_used_at_ms),
            checked_out_at_ms: AtomicU64::new(0),
            valid: AtomicBool::new(true),
        }
    }

    /// The raw transport connection
    pub fn raw(&self) -> &Arc<dyn Connection> {
        &self.raw
    }

    /// Identity fingerprint of the raw connection
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark the handle unusable; any surviving reference to it can no
    /// longer reach the raw connection
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub fn type_code(&self) -> u64 {
        self.type_code.load(Ordering::SeqCst)
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn last_used_at_ms(&self) -> u64 {
        self.last_used_at_ms.load(Ordering::SeqCst)
    }

    /// Stamp the handle as checked out now, under the given type code
    pub fn stamp_checkout(&self, type_code: u64) {
        let now = now_millis();
        self.type_code.store(type_code, Ordering::SeqCst);
        self.checked_out_at_ms.store(now, Ordering::SeqCst);
        self.last_used_at_ms.store(now, Ordering::SeqCst);
    }

    /// How long this lease has been checked out, in milliseconds
    ///
    /// Meaningful only while the handle is in the active list.
    pub fn checkout_age_ms(&self) -> u64 {
        now_millis().saturating_sub(self.checked_out_at_ms.load(Ordering::SeqCst))
    }

    /// Time since the connection was last used, in milliseconds
    pub fn elapsed_since_last_use_ms(&self) -> u64 {
        now_millis().saturating_sub(self.last_used_at_ms.load(Ordering::SeqCst))
    }
}
