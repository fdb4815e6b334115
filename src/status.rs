use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::events::StatusWrite;

/// Name this backend reports its stats under.
pub const BACKEND_NAME: &str = "http";

/// Delivery bookkeeping shared between the flush and status handlers.
///
/// Both timestamps are seconds since the epoch and start at the backend's
/// startup time.
#[derive(Debug)]
pub struct DeliveryStatus {
    last_flush: AtomicU64,
    last_exception: AtomicU64,
}

impl DeliveryStatus {
    pub fn new(startup_time: u64) -> Self {
        Self {
            last_flush: AtomicU64::new(startup_time),
            last_exception: AtomicU64::new(startup_time),
        }
    }

    pub fn last_flush(&self) -> u64 {
        self.last_flush.load(Ordering::Relaxed)
    }

    pub fn last_exception(&self) -> u64 {
        self.last_exception.load(Ordering::Relaxed)
    }

    pub fn record_flush(&self, ts: u64) {
        self.last_flush.store(ts, Ordering::Relaxed);
    }

    pub fn record_exception(&self, ts: u64) {
        self.last_exception.store(ts, Ordering::Relaxed);
    }

    /// Calls `write` once per stat, `last_flush` first.
    pub fn report(&self, write: &mut StatusWrite<'_>) {
        write(None, BACKEND_NAME, "last_flush", self.last_flush());
        write(None, BACKEND_NAME, "last_exception", self.last_exception());
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
