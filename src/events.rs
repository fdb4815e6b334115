use std::error::Error;

use crate::snapshot::MetricsSnapshot;

/// Receives one status line: `(error, backend, stat, value)`.
pub type StatusWrite<'a> = dyn FnMut(Option<&dyn Error>, &str, &str, u64) + 'a;

type FlushHandler = Box<dyn Fn(u64, &MetricsSnapshot) + Send + Sync>;
type StatusHandler = Box<dyn Fn(&mut StatusWrite<'_>) + Send + Sync>;

/// The host's event-registration facility. Backends register their handlers
/// during initialization; the host emits `flush` on its timer and `status`
/// when asked for a report.
#[derive(Default)]
pub struct EventBus {
    flush: Vec<FlushHandler>,
    status: Vec<StatusHandler>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_flush(&mut self, handler: impl Fn(u64, &MetricsSnapshot) + Send + Sync + 'static) {
        self.flush.push(Box::new(handler));
    }

    pub fn on_status(&mut self, handler: impl Fn(&mut StatusWrite<'_>) + Send + Sync + 'static) {
        self.status.push(Box::new(handler));
    }

    pub fn emit_flush(&self, timestamp: u64, snapshot: &MetricsSnapshot) {
        for handler in &self.flush {
            handler(timestamp, snapshot);
        }
    }

    pub fn emit_status(&self, write: &mut StatusWrite<'_>) {
        for handler in &self.status {
            handler(&mut *write);
        }
    }

    pub fn flush_handlers(&self) -> usize {
        self.flush.len()
    }

    pub fn status_handlers(&self) -> usize {
        self.status.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[test]
    fn flush_reaches_every_handler() {
        let seen = Arc::new(AtomicU64::new(0));
        let mut bus = EventBus::new();
        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            bus.on_flush(move |ts, _| {
                seen.fetch_add(ts, Ordering::SeqCst);
            });
        }

        bus.emit_flush(5, &MetricsSnapshot::default());
        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn status_handlers_share_the_writer() {
        let mut bus = EventBus::new();
        bus.on_status(|write| write(None, "a", "x", 1));
        bus.on_status(|write| write(None, "b", "y", 2));

        let mut lines = Vec::new();
        bus.emit_status(&mut |_, backend, stat, value| {
            lines.push(format!("{backend}.{stat}={value}"));
        });
        assert_eq!(lines, vec!["a.x=1", "b.y=2"]);
        assert_eq!(bus.status_handlers(), 2);
        assert_eq!(bus.flush_handlers(), 0);
    }
}
