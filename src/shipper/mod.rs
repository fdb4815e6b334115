use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::config::TypeLabels;
use crate::formatter::Formatter;
use crate::record::WireRecord;
use crate::snapshot::MetricsSnapshot;

mod http;

pub use http::{HttpExporter, TransportError};

#[derive(Debug, Error)]
pub enum ShipError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] hyper_util::client::legacy::Error),

    #[error("failed to build HTTP request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),

    #[error("HTTP request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("delivery cancelled by shutdown")]
    Cancelled,
}

/// Delivers one serialized batch.
pub trait Exporter: Send + Sync + 'static {
    fn export(&self, payload: Vec<u8>) -> impl Future<Output = Result<(), ShipError>> + Send + '_;
}

/// Every record produced for one flush cycle, tagged and in wire order.
#[derive(Debug, Default)]
pub struct Batch {
    records: Vec<WireRecord>,
    num_stats: usize,
}

impl Batch {
    /// Runs `formatter` over every group of `snapshot` and concatenates the
    /// results as counters, timers, timer statistics, gauges.
    ///
    /// Timer statistics are only formatted when the timers group produced at
    /// least one record, and they are not included in `num_stats`.
    pub fn assemble(
        formatter: &dyn Formatter,
        labels: &TypeLabels,
        ts_seconds: u64,
        snapshot: &MetricsSnapshot,
    ) -> Self {
        let ts = ts_seconds.saturating_mul(1000);
        let mut num_stats = 0;

        let mut counters = Vec::new();
        for (name, value) in &snapshot.counters {
            num_stats += formatter.counters(name, *value, ts, &mut counters);
        }

        let mut timers = Vec::new();
        for (name, series) in &snapshot.timers {
            num_stats += formatter.timers(name, series, ts, &mut timers);
        }

        let mut timer_data = Vec::new();
        if !timers.is_empty() {
            for (name, stats) in &snapshot.timer_data {
                formatter.timer_data(name, stats, ts, &mut timer_data);
            }
        }

        let mut gauges = Vec::new();
        for (name, value) in &snapshot.gauges {
            num_stats += formatter.gauges(name, *value, ts, &mut gauges);
        }

        let records = tag(counters, &labels.counter)
            .chain(tag(timers, &labels.timer))
            .chain(tag(timer_data, &labels.timer))
            .chain(tag(gauges, &labels.gauge))
            .collect();

        Self { records, num_stats }
    }

    pub fn records(&self) -> &[WireRecord] {
        &self.records
    }

    /// Counter, timer and gauge records emitted; timer statistics excluded.
    pub fn num_stats(&self) -> usize {
        self.num_stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ShipError> {
        Ok(serde_json::to_vec(&self.records)?)
    }
}

fn tag(records: Vec<WireRecord>, label: &str) -> impl Iterator<Item = WireRecord> + '_ {
    records.into_iter().map(move |mut record| {
        record.kind = Some(label.to_owned());
        record
    })
}
