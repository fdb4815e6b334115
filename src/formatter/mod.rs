use std::collections::BTreeMap;

use crate::config::{Config, ConfigError};
use crate::record::WireRecord;
use crate::snapshot::TimerStats;

mod default;

pub use default::{DefaultFormatter, flatten_timer_stats};

/// Identifier of the formatter used when none is configured.
pub const DEFAULT_FORMATTER: &str = "default_format";

/// Converts one metric-group entry into wire records.
///
/// Implementations append to `out` and never touch the type label; labels are
/// assigned by the shipper once all groups have been formatted.
pub trait Formatter: Send + Sync {
    /// Called once during backend initialization, before the first flush.
    fn init(&mut self, _config: &Config) {}

    /// Returns the number of records appended.
    fn counters(&self, name: &str, value: f64, ts: u64, out: &mut Vec<WireRecord>) -> usize;

    /// Returns the number of records appended.
    fn timers(&self, name: &str, series: &[f64], ts: u64, out: &mut Vec<WireRecord>) -> usize;

    fn timer_data(&self, name: &str, stats: &TimerStats, ts: u64, out: &mut Vec<WireRecord>);

    fn gauges(&self, name: &str, value: f64, ts: u64, out: &mut Vec<WireRecord>) -> usize {
        self.counters(name, value, ts, out)
    }
}

pub type FormatterCtor = fn() -> Box<dyn Formatter>;

/// Named formatter constructors, resolved once at startup.
pub struct FormatterRegistry {
    entries: BTreeMap<String, FormatterCtor>,
}

impl FormatterRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_FORMATTER, || Box::new(DefaultFormatter));
        registry
    }

    /// Registers `ctor` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, ctor: FormatterCtor) -> &mut Self {
        self.entries.insert(name.into(), ctor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn build(&self, name: &str) -> Result<Box<dyn Formatter>, ConfigError> {
        self.entries
            .get(name)
            .map(|ctor| ctor())
            .ok_or_else(|| self.unknown(name))
    }

    pub(crate) fn unknown(&self, name: &str) -> ConfigError {
        ConfigError::UnknownFormatter {
            name: name.to_owned(),
            known: self.names().map(str::to_owned).collect(),
        }
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
