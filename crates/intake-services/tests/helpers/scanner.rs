use async_trait::async_trait;
use intake_services::{EngineVerdict, MalwareEngine, ScannerHandle, ScannerProvider};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake engine answers
#[derive(Debug, Clone)]
pub enum EngineBehavior {
    /// Infected when the file contains `marker`, clean otherwise
    Signature {
        marker: &'static [u8],
        name: &'static str,
    },
    Fail(&'static str),
    Hang(Duration),
}

/// A file the engine was asked to scan
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// Fake malware engine that remembers every file it was shown
pub struct RecordingEngine {
    behavior: EngineBehavior,
    scanned: Mutex<Vec<ScannedFile>>,
}

impl RecordingEngine {
    pub fn new(behavior: EngineBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            scanned: Mutex::new(Vec::new()),
        })
    }

    /// Flags the EICAR test string
    pub fn eicar() -> Arc<Self> {
        Self::new(EngineBehavior::Signature {
            marker: b"EICAR-STANDARD-ANTIVIRUS-TEST-FILE",
            name: "Eicar-Test-Signature",
        })
    }

    pub fn scanned(&self) -> Vec<ScannedFile> {
        self.scanned.lock().unwrap().clone()
    }
}

#[async_trait]
impl MalwareEngine for RecordingEngine {
    async fn scan_file(&self, path: &Path) -> anyhow::Result<EngineVerdict> {
        let contents = tokio::fs::read(path).await?;
        self.scanned.lock().unwrap().push(ScannedFile {
            path: path.to_path_buf(),
            contents: contents.clone(),
        });

        match &self.behavior {
            EngineBehavior::Signature { marker, name } => {
                let found = contents.windows(marker.len()).any(|w| w == *marker);
                Ok(if found {
                    EngineVerdict::infected(vec![name.to_string()])
                } else {
                    EngineVerdict::clean()
                })
            }
            EngineBehavior::Fail(reason) => Err(anyhow::anyhow!(*reason)),
            EngineBehavior::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(EngineVerdict::clean())
            }
        }
    }

    fn engine_name(&self) -> &'static str {
        "recording"
    }
}

/// Provider that counts how often it is asked for an engine
pub struct RecordingProvider {
    engine: Option<Arc<RecordingEngine>>,
    calls: AtomicUsize,
}

impl RecordingProvider {
    pub fn available(engine: Arc<RecordingEngine>) -> Self {
        Self {
            engine: Some(engine),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            engine: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScannerProvider for RecordingProvider {
    async fn try_initialize(&self) -> Option<ScannerHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.engine
            .clone()
            .map(|engine| ScannerHandle::new(engine as Arc<dyn MalwareEngine>))
    }
}
