use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::config::{Config, HostConfig};
use crate::shipper::{Exporter, ShipError};

/// Records every payload it is asked to deliver.
#[derive(Clone, Default)]
pub struct RecordingExporter {
    pub payloads: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingExporter {
    pub fn batches(&self) -> Vec<Value> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|p| serde_json::from_slice(p).unwrap())
            .collect()
    }
}

impl Exporter for RecordingExporter {
    async fn export(&self, payload: Vec<u8>) -> Result<(), ShipError> {
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}

/// Rejects the first `failures` deliveries with HTTP 500, then accepts.
#[derive(Clone, Default)]
pub struct FlakyExporter {
    pub failures: usize,
    pub attempts: Arc<AtomicUsize>,
    pub delivered: RecordingExporter,
}

impl Exporter for FlakyExporter {
    async fn export(&self, payload: Vec<u8>) -> Result<(), ShipError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(ShipError::Rejected {
                status: 500,
                body: "internal error".into(),
            });
        }
        self.delivered.export(payload).await
    }
}

/// Counts deliveries, then never completes within any reasonable test timeout.
#[derive(Clone, Default)]
pub struct HangingExporter {
    pub attempts: Arc<AtomicUsize>,
}

impl Exporter for HangingExporter {
    async fn export(&self, _payload: Vec<u8>) -> Result<(), ShipError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

pub fn dummy_config() -> Config {
    Config::parse(&HostConfig::default(), &Default::default()).unwrap()
}
