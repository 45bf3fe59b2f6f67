//! Malware scanning
//!
//! Engines scan a file on disk. The scan layer writes the upload to a private
//! temporary file, scans it under a timeout and removes the file on every exit
//! path (the temp file is deleted on drop, so cancellation is covered too).
//!
//! Whether an engine is available is decided once, when the layer is built.
//! A missing engine disables scanning for the lifetime of the instance; it is
//! never retried per upload.

#[cfg(feature = "clamav")]
pub mod clamav;

use async_trait::async_trait;
use bytes::Bytes;
use intake_core::ValidationError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::sync::OnceCell;

const TEMP_FILE_PREFIX: &str = "intake-scan-";

/// What an engine reported for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVerdict {
    pub is_infected: bool,
    pub signatures: Vec<String>,
}

impl EngineVerdict {
    pub fn clean() -> Self {
        Self {
            is_infected: false,
            signatures: Vec::new(),
        }
    }

    pub fn infected(signatures: Vec<String>) -> Self {
        Self {
            is_infected: true,
            signatures,
        }
    }
}

/// A malware scanning engine
#[async_trait]
pub trait MalwareEngine: Send + Sync {
    /// Scan the file at `path`. Errors are operational failures, not verdicts.
    async fn scan_file(&self, path: &Path) -> anyhow::Result<EngineVerdict>;

    fn engine_name(&self) -> &'static str;
}

/// Handle to an initialized engine
#[derive(Clone)]
pub struct ScannerHandle {
    engine: Arc<dyn MalwareEngine>,
}

impl ScannerHandle {
    pub fn new(engine: Arc<dyn MalwareEngine>) -> Self {
        Self { engine }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.engine_name()
    }
}

/// Produces a scanner handle at startup, or `None` when no engine can be used
#[async_trait]
pub trait ScannerProvider: Send + Sync {
    async fn try_initialize(&self) -> Option<ScannerHandle>;
}

/// Provider for deployments without a malware engine
pub struct NoScannerProvider;

#[async_trait]
impl ScannerProvider for NoScannerProvider {
    async fn try_initialize(&self) -> Option<ScannerHandle> {
        None
    }
}

/// Outcome of the scan layer for one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalwareVerdict {
    Clean,
    Infected(String),
    /// No engine available; the upload was not scanned
    Skipped,
}

pub struct MalwareScanLayer {
    handle: OnceCell<Option<ScannerHandle>>,
    timeout: Duration,
}

impl MalwareScanLayer {
    /// Ask `provider` for an engine, once.
    pub async fn initialize(provider: &dyn ScannerProvider, timeout: Duration) -> Self {
        let handle = OnceCell::new();
        let initialized = handle
            .get_or_init(|| async { provider.try_initialize().await })
            .await;

        match initialized {
            Some(scanner) => tracing::info!(
                engine = scanner.engine_name(),
                timeout_secs = timeout.as_secs(),
                "Malware scanning enabled"
            ),
            None => tracing::warn!(
                "No malware scanner available, uploads will be accepted without a malware scan"
            ),
        }

        Self { handle, timeout }
    }

    /// A layer that never scans
    pub fn disabled() -> Self {
        Self {
            handle: OnceCell::new_with(Some(None)),
            timeout: Duration::ZERO,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.handle.get(), Some(Some(_)))
    }

    /// Scan `data`. Any operational failure or timeout is a `ScannerError`.
    pub async fn scan(&self, data: Bytes) -> Result<MalwareVerdict, ValidationError> {
        let Some(scanner) = self.handle.get().and_then(|h| h.as_ref()) else {
            return Ok(MalwareVerdict::Skipped);
        };

        let start = Instant::now();
        let size = data.len();

        let temp_file = write_temp_file(data).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to stage upload for malware scan");
            ValidationError::ScannerError {
                reason: format!("failed to stage file: {}", e),
            }
        })?;

        let result =
            tokio::time::timeout(self.timeout, scanner.engine.scan_file(temp_file.path())).await;

        // Remove the staged copy before interpreting the result
        drop(temp_file);

        match result {
            Ok(Ok(verdict)) if verdict.is_infected => {
                let threat = if verdict.signatures.is_empty() {
                    "unknown".to_string()
                } else {
                    verdict.signatures.join(", ")
                };
                tracing::warn!(
                    engine = scanner.engine_name(),
                    threat = %threat,
                    size = size,
                    duration_ms = start.elapsed().as_millis(),
                    "Malware detected"
                );
                Ok(MalwareVerdict::Infected(threat))
            }
            Ok(Ok(_)) => {
                tracing::debug!(
                    engine = scanner.engine_name(),
                    size = size,
                    duration_ms = start.elapsed().as_millis(),
                    "Malware scan clean"
                );
                Ok(MalwareVerdict::Clean)
            }
            Ok(Err(e)) => {
                tracing::error!(engine = scanner.engine_name(), error = %e, "Malware scan failed");
                Err(ValidationError::ScannerError {
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                tracing::error!(
                    engine = scanner.engine_name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Malware scan timed out"
                );
                Err(ValidationError::ScannerError {
                    reason: format!("scan timed out after {:?}", self.timeout),
                })
            }
        }
    }
}

/// Write `data` to a new private temp file on the blocking pool
async fn write_temp_file(data: Bytes) -> anyhow::Result<NamedTempFile> {
    let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .tempfile()?;
        file.write_all(&data)?;
        file.flush()?;
        Ok(file)
    })
    .await??;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct StaticEngine {
        verdict: Result<EngineVerdict, String>,
        delay: Duration,
        seen: Mutex<Vec<(PathBuf, Vec<u8>)>>,
    }

    impl StaticEngine {
        fn new(verdict: Result<EngineVerdict, String>) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MalwareEngine for StaticEngine {
        async fn scan_file(&self, path: &Path) -> anyhow::Result<EngineVerdict> {
            let contents = std::fs::read(path)?;
            self.seen
                .lock()
                .unwrap()
                .push((path.to_path_buf(), contents));
            tokio::time::sleep(self.delay).await;
            self.verdict.clone().map_err(|e| anyhow::anyhow!(e))
        }

        fn engine_name(&self) -> &'static str {
            "static"
        }
    }

    struct StaticProvider(Arc<StaticEngine>);

    #[async_trait]
    impl ScannerProvider for StaticProvider {
        async fn try_initialize(&self) -> Option<ScannerHandle> {
            Some(ScannerHandle::new(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn test_unavailable_scanner_skips() {
        let layer = MalwareScanLayer::initialize(&NoScannerProvider, Duration::from_secs(1)).await;
        assert!(!layer.is_available());
        assert_eq!(
            layer.scan(Bytes::from_static(b"data")).await,
            Ok(MalwareVerdict::Skipped)
        );

        let disabled = MalwareScanLayer::disabled();
        assert!(!disabled.is_available());
    }

    #[tokio::test]
    async fn test_clean_scan_removes_temp_file() {
        let engine = StaticEngine::new(Ok(EngineVerdict::clean()));
        let layer =
            MalwareScanLayer::initialize(&StaticProvider(engine.clone()), Duration::from_secs(5))
                .await;
        assert!(layer.is_available());

        let verdict = layer.scan(Bytes::from_static(b"hello")).await;
        assert_eq!(verdict, Ok(MalwareVerdict::Clean));

        let seen = engine.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, b"hello");
        assert!(!seen[0].0.exists());
    }

    #[tokio::test]
    async fn test_infected_reports_signatures() {
        let engine = StaticEngine::new(Ok(EngineVerdict::infected(vec![
            "Eicar-Test-Signature".to_string(),
        ])));
        let layer =
            MalwareScanLayer::initialize(&StaticProvider(engine.clone()), Duration::from_secs(5))
                .await;

        assert_eq!(
            layer.scan(Bytes::from_static(b"x")).await,
            Ok(MalwareVerdict::Infected("Eicar-Test-Signature".to_string()))
        );
        assert!(!engine.seen.lock().unwrap()[0].0.exists());
    }

    #[tokio::test]
    async fn test_engine_error_fails_closed() {
        let engine = StaticEngine::new(Err("connection refused".to_string()));
        let layer =
            MalwareScanLayer::initialize(&StaticProvider(engine.clone()), Duration::from_secs(5))
                .await;

        let result = layer.scan(Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(ValidationError::ScannerError { .. })));
        assert!(!engine.seen.lock().unwrap()[0].0.exists());
    }

    #[tokio::test]
    async fn test_timeout_fails_closed() {
        let engine = Arc::new(StaticEngine {
            verdict: Ok(EngineVerdict::clean()),
            delay: Duration::from_secs(5),
            seen: Mutex::new(Vec::new()),
        });
        let layer = MalwareScanLayer::initialize(
            &StaticProvider(engine.clone()),
            Duration::from_millis(50),
        )
        .await;

        let result = layer.scan(Bytes::from_static(b"slow")).await;
        assert!(matches!(result, Err(ValidationError::ScannerError { .. })));
        assert!(!engine.seen.lock().unwrap()[0].0.exists());
    }
}
