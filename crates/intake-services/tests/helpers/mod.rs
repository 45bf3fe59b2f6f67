#![allow(dead_code)]

pub mod fixtures;
pub mod scanner;
pub mod storage;

use intake_infra::{init_telemetry, TelemetryConfig};
use intake_services::{IngestService, MemoryStorage, NoScannerProvider, Storage, ValidationPolicy};
use std::sync::{Arc, Once};

use scanner::{RecordingEngine, RecordingProvider};

static TELEMETRY: Once = Once::new();

/// Install the log subscriber once per test binary
pub fn init_test_logging() {
    TELEMETRY.call_once(|| {
        let config = TelemetryConfig {
            default_filter: "intake=debug,warn".to_string(),
            ..TelemetryConfig::default()
        };
        // Another test harness may already own the global subscriber
        let _ = init_telemetry(&config);
    });
}

/// Service with in-memory storage and no malware engine
pub async fn service(policy: ValidationPolicy) -> IngestService {
    service_with_storage(policy, Arc::new(MemoryStorage::default())).await
}

pub async fn service_with_storage(
    policy: ValidationPolicy,
    storage: Arc<dyn Storage>,
) -> IngestService {
    init_test_logging();
    IngestService::new(policy, storage, &NoScannerProvider)
        .await
        .expect("Failed to build ingest service")
}

/// Service whose malware scans go to `engine`
pub async fn service_with_engine(
    policy: ValidationPolicy,
    engine: Arc<RecordingEngine>,
) -> IngestService {
    init_test_logging();
    IngestService::new(
        policy,
        Arc::new(MemoryStorage::default()),
        &RecordingProvider::available(engine),
    )
    .await
    .expect("Failed to build ingest service")
}
