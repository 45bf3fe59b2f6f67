//! Intake Services Layer
//!
//! Orchestration for secure file ingestion: the malware scan layer, the
//! upload session issuer, and [`IngestService`], which drives an upload
//! through the full validation pipeline. Re-exports the processing and
//! storage types callers need so a host application depends on one facade.

pub mod ingest;
pub mod scanner;
pub mod session;

pub use ingest::{IngestService, ProcessedUpload};
pub use scanner::{
    EngineVerdict, MalwareEngine, MalwareScanLayer, MalwareVerdict, NoScannerProvider,
    ScannerHandle, ScannerProvider,
};
#[cfg(feature = "clamav")]
pub use scanner::clamav::{ClamAvConfig, ClamAvEngine, ClamAvProvider};
pub use session::{sanitize_file_name, PreflightRejection, UploadSessionIssuer};

pub use intake_core::{
    ConfigError, FileIdentity, FileMetadata, PolicyKind, UploadRequest, UploadSession,
    ValidationError, ValidationOutcome, ValidationPolicy,
};
pub use intake_processing::{ReportContext, SecurityReport, ValidationStage};
pub use intake_storage::{MemoryStorage, Storage, StorageError, StorageResult};
