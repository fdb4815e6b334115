//! Flushes aggregated statsd-style metrics to a generic HTTP(S) endpoint as a
//! single JSON batch per flush cycle.

pub mod backend;
pub mod config;
pub mod events;
pub mod formatter;
pub mod host;
pub mod record;
pub mod shipper;
pub mod snapshot;
pub mod status;

#[cfg(test)]
mod testing;

pub use backend::{HttpBackend, InitError};
pub use config::{Config, ConfigError, HostConfig, HttpSection, TypeLabels};
pub use events::EventBus;
pub use formatter::{DefaultFormatter, Formatter, FormatterRegistry};
pub use record::{RecordBody, WireRecord};
pub use shipper::{Batch, Exporter, HttpExporter, ShipError, TransportError};
pub use snapshot::{MetricsSnapshot, TimerStats};
pub use status::DeliveryStatus;
