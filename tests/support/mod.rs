// Each integration test compiles this module independently via `mod support;`,
// so items used by one test appear unused in others.
#![allow(unused)]

pub mod collector;
pub mod tls;

use statsd_http_relay::{HostConfig, HttpSection};

pub use collector::{Collected, Collector, closed_port};
pub use tls::{SelfSigned, self_signed};

/// Host config pointing the backend at `127.0.0.1:port`.
pub fn host_config(port: u16, debug: bool) -> HostConfig {
    HostConfig {
        debug,
        http: Some(HttpSection {
            host: Some("127.0.0.1".into()),
            port: Some(port),
            path: Some("/ingest".into()),
            formatter: Some("default_format".into()),
            secure: Some(false),
            timeout_ms: Some(2_000),
            ..Default::default()
        }),
    }
}
