use std::time::Duration;

use statsd_http_relay::config::HostConfig;
use statsd_http_relay::status::unix_now;
use statsd_http_relay::{EventBus, HttpBackend, host};
use tokio::io::BufReader;
use tracing::{error, info};

/// Log an unrecoverable startup error and exit.
fn fatal(msg: &str, error: &dyn std::fmt::Display) -> ! {
    error!(%error, "{msg}");
    std::process::exit(1);
}

fn setup_logging() {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let level = std::env::var("STATSD_HTTP_RELAY_LOG_LEVEL")
        .ok()
        .and_then(|val| {
            val.parse::<LevelFilter>().ok().or_else(|| {
                eprintln!("invalid STATSD_HTTP_RELAY_LOG_LEVEL: {val:?}, defaulting to WARN");
                None
            })
        })
        .unwrap_or(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(level)
        .with(tracing_microjson::JsonLayer::new(std::io::stderr).with_target(true))
        .init();
}

fn load_host_config() -> HostConfig {
    match std::env::var("STATSD_HTTP_RELAY_CONFIG") {
        Ok(path) if !path.is_empty() => HostConfig::from_file(&path)
            .unwrap_or_else(|e| fatal("failed to load host config", &e)),
        _ => HostConfig::default(),
    }
}

#[tokio::main]
async fn main() {
    setup_logging();

    let host_config = load_host_config();
    let mut events = EventBus::new();
    let backend = HttpBackend::init(unix_now(), &host_config, &mut events)
        .unwrap_or_else(|e| fatal("failed to initialize HTTP backend", &e));
    info!(endpoint = %backend.config().endpoint, "HTTP backend ready");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    if let Err(e) = host::run(&events, stdin, &mut stdout).await {
        error!(error = %e, "input closed unexpectedly");
    }

    // Give in-flight deliveries the same budget as a single request.
    let grace = backend.config().timeout + Duration::from_millis(100);
    backend.shutdown(grace).await;
}
