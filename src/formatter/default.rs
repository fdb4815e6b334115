use std::collections::BTreeMap;

use crate::record::{RESERVED_KEYS, WireRecord, is_reportable};
use crate::snapshot::TimerStats;

use super::Formatter;

/// One record per non-zero value; timer statistics are emitted as a single
/// flattened record with histogram buckets hoisted to the top level.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFormatter;

impl Formatter for DefaultFormatter {
    fn counters(&self, name: &str, value: f64, ts: u64, out: &mut Vec<WireRecord>) -> usize {
        if !is_reportable(value) {
            return 0;
        }
        out.push(WireRecord::value(name, value, ts));
        1
    }

    fn timers(&self, name: &str, series: &[f64], ts: u64, out: &mut Vec<WireRecord>) -> usize {
        let before = out.len();
        out.extend(
            series
                .iter()
                .copied()
                .filter(|v| is_reportable(*v))
                .map(|v| WireRecord::value(name, v, ts)),
        );
        out.len() - before
    }

    /// Histogram present: emitted only if at least one bucket is non-zero.
    /// Histogram absent: emitted only if at least one statistic is non-zero.
    fn timer_data(&self, name: &str, stats: &TimerStats, ts: u64, out: &mut Vec<WireRecord>) {
        let (record, any_bucket) = flatten_timer_stats(name, stats, ts);
        let push = match &stats.histogram {
            Some(_) => any_bucket,
            None => stats.stats.values().copied().any(is_reportable),
        };
        if push {
            out.push(record);
        }
    }
}

/// Builds the flattened record for `stats` regardless of whether it will be
/// emitted, and reports whether any histogram bucket carried data.
///
/// Buckets overwrite statistics of the same name. Non-finite values and
/// reserved keys are dropped.
pub fn flatten_timer_stats(name: &str, stats: &TimerStats, ts: u64) -> (WireRecord, bool) {
    let mut fields: BTreeMap<String, f64> = stats
        .stats
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();

    let mut any_bucket = false;
    if let Some(histogram) = &stats.histogram {
        for (bucket, count) in histogram {
            any_bucket |= is_reportable(*count);
            fields.insert(bucket.clone(), *count);
        }
    }

    fields.retain(|key, value| {
        let keep = value.is_finite() && !RESERVED_KEYS.contains(&key.as_str());
        if !keep {
            tracing::warn!(timer = name, field = key.as_str(), "dropping timer statistic");
        }
        keep
    });

    (WireRecord::stats(name, fields, ts), any_bucket)
}
