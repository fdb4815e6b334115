use std::collections::BTreeMap;

use serde::Deserialize;

/// Aggregated metrics handed over by the host for one flush cycle.
///
/// Only borrowed for the duration of a flush; nothing in this crate keeps a
/// reference to it afterwards.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    /// Seconds since the epoch. Zero means "not provided".
    pub timestamp: u64,
    pub counters: BTreeMap<String, f64>,
    pub timers: BTreeMap<String, Vec<f64>>,
    pub timer_data: BTreeMap<String, TimerStats>,
    pub gauges: BTreeMap<String, f64>,
}

impl MetricsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.timers.is_empty()
            && self.timer_data.is_empty()
            && self.gauges.is_empty()
    }
}

/// Precomputed statistics for one timer (`mean`, `upper_90`, `count_ps`, ...)
/// plus the optional bucketed histogram.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TimerStats {
    #[serde(default)]
    pub histogram: Option<BTreeMap<String, f64>>,
    #[serde(flatten)]
    pub stats: BTreeMap<String, f64>,
}

impl TimerStats {
    pub fn new<K: Into<String>>(stats: impl IntoIterator<Item = (K, f64)>) -> Self {
        Self {
            histogram: None,
            stats: stats.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn with_histogram<K: Into<String>>(
        mut self,
        buckets: impl IntoIterator<Item = (K, f64)>,
    ) -> Self {
        self.histogram = Some(buckets.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }
}
