use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::config::{Config, ConfigError, HostConfig};
use crate::events::{EventBus, StatusWrite};
use crate::formatter::{Formatter, FormatterRegistry};
use crate::shipper::{Batch, Exporter, HttpExporter, ShipError, TransportError};
use crate::snapshot::MetricsSnapshot;
use crate::status::{DeliveryStatus, unix_now};

#[derive(Debug, Error)]
pub enum InitError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

/// Formats each flushed snapshot into one JSON batch and ships it in the
/// background.
///
/// Flushes never wait on the network and never fail: delivery errors are
/// logged, stamped into [`DeliveryStatus`], and the batch is dropped.
pub struct HttpBackend<E: Exporter = HttpExporter> {
    config: Config,
    formatter: Box<dyn Formatter>,
    exporter: Arc<E>,
    status: Arc<DeliveryStatus>,
    tracker: TaskTracker,
    /// Set when shutdown begins; later flushes are dropped.
    closing: CancellationToken,
    /// Set when the grace period runs out; aborts in-flight deliveries.
    cancel: CancellationToken,
}

impl HttpBackend<HttpExporter> {
    /// Resolve configuration, load the formatter, and register the `flush` and
    /// `status` handlers on `events`.
    pub fn init(
        startup_time: u64,
        host: &HostConfig,
        events: &mut EventBus,
    ) -> Result<Arc<Self>, InitError> {
        let config = Config::from_env(host)?;
        let registry = FormatterRegistry::with_defaults();
        // Fail on the formatter before touching TLS material.
        if !registry.contains(&config.formatter) {
            return Err(registry.unknown(&config.formatter).into());
        }
        let exporter = HttpExporter::new(&config)?;
        debug!(endpoint = %exporter.uri(), method = %config.method, "HTTP backend configured");
        Self::init_with(startup_time, config, &registry, exporter, events)
    }
}

impl<E: Exporter> HttpBackend<E> {
    pub fn init_with(
        startup_time: u64,
        config: Config,
        registry: &FormatterRegistry,
        exporter: E,
        events: &mut EventBus,
    ) -> Result<Arc<Self>, InitError> {
        let mut formatter = registry.build(&config.formatter)?;
        if config.debug {
            debug!(formatter = %config.formatter, "loaded formatter");
        }
        formatter.init(&config);

        let backend = Arc::new(Self {
            config,
            formatter,
            exporter: Arc::new(exporter),
            status: Arc::new(DeliveryStatus::new(startup_time)),
            tracker: TaskTracker::new(),
            closing: CancellationToken::new(),
            cancel: CancellationToken::new(),
        });

        let on_flush = Arc::clone(&backend);
        events.on_flush(move |ts, snapshot| on_flush.flush(ts, snapshot));
        let on_status = Arc::clone(&backend);
        events.on_status(move |write| on_status.status(write));

        Ok(backend)
    }

    /// Format `snapshot` and hand the batch to a background delivery task.
    ///
    /// Must be called from within a tokio runtime. Returns once the batch is
    /// queued; the snapshot is not referenced after this returns.
    pub fn flush(&self, ts: u64, snapshot: &MetricsSnapshot) {
        if self.closing.is_cancelled() {
            warn!("backend is shutting down, no stats flushed");
            return;
        }
        if snapshot.is_empty() {
            if self.config.debug {
                debug!("empty snapshot, nothing to flush");
            }
            return;
        }

        let batch = Batch::assemble(&*self.formatter, &self.config.labels, ts, snapshot);
        if self.config.debug {
            debug!(metrics = ?snapshot, "metrics");
        }

        if !batch.is_empty() {
            self.ship(ts, &batch);
        }

        if self.config.debug {
            debug!(num_stats = batch.num_stats(), "flushed stats");
        }
    }

    fn ship(&self, ts: u64, batch: &Batch) {
        let payload = match batch.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                self.record_failure(&e);
                return;
            }
        };
        if self.config.debug {
            debug!(payload = %String::from_utf8_lossy(&payload), "HTTP payload");
        }

        let exporter = Arc::clone(&self.exporter);
        let status = Arc::clone(&self.status);
        let cancel = self.cancel.clone();
        let records = batch.len();
        self.tracker.spawn(async move {
            let result = tokio::select! {
                result = exporter.export(payload) => result,
                _ = cancel.cancelled() => Err(ShipError::Cancelled),
            };
            match result {
                Ok(()) => status.record_flush(ts),
                Err(e) => {
                    error!(error = %e, records, "Error with HTTP request, no stats flushed");
                    status.record_exception(unix_now());
                }
            }
        });
    }

    fn record_failure(&self, e: &ShipError) {
        error!(error = %e, "no stats flushed");
        self.status.record_exception(unix_now());
    }

    /// Report each [`DeliveryStatus`] field through `write`.
    pub fn status(&self, write: &mut StatusWrite<'_>) {
        self.status.report(write);
    }

    pub fn delivery_status(&self) -> &DeliveryStatus {
        &self.status
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Deliveries still waiting for a response.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every delivery queued so far has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        if !self.closing.is_cancelled() {
            self.tracker.reopen();
        }
    }

    /// Stop accepting flushes, give in-flight deliveries up to `grace` to
    /// finish, then cancel whatever is left.
    pub async fn shutdown(&self, grace: Duration) {
        self.closing.cancel();
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!(in_flight = self.tracker.len(), "cancelling in-flight deliveries");
            self.cancel.cancel();
            self.tracker.wait().await;
        }
        self.cancel.cancel();
    }
}
