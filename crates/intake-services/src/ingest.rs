//! Ingest service
//!
//! Drives an upload through the validation state machine:
//!
//! ```text
//! RECEIVED -> SNIFFING -> POLICY_CHECK -> [PATTERN_SCAN] -> [MALWARE_SCAN]
//!          -> [IMAGE_NORMALIZE] -> HASHING -> COMPLETE
//! ```
//!
//! Any stage may end in REJECTED. Sniffing and policy failures are collected
//! together; anything rejected there is never scanned or transformed.

use bytes::Bytes;
use intake_core::{
    ConfigError, FileIdentity, FileMetadata, UploadRequest, UploadSession, ValidationError,
    ValidationOutcome, ValidationPolicy,
};
use intake_processing::image::ImageNormalizer;
use intake_processing::sniffer::DetectedType;
use intake_processing::{
    content_hash, ContentSniffer, PatternScanner, PolicyValidator, ReportContext,
    SecurityReport, ValidationStage,
};
use intake_storage::{generate_upload_key, Storage};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::scanner::{MalwareScanLayer, MalwareVerdict, ScannerProvider};
use crate::session::{sanitize_file_name, PreflightRejection, UploadSessionIssuer};

/// Everything a caller gets back from [`IngestService::process_secure_upload`]
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedUpload {
    pub success: bool,
    #[serde(skip)]
    pub processed_bytes: Option<Bytes>,
    pub metadata: Option<FileMetadata>,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    /// Minted for every attempt, for audit correlation
    pub file_id: Uuid,
    /// Only present on success
    pub identity: Option<FileIdentity>,
    pub report: SecurityReport,
}

/// Secure file ingestion service
///
/// Holds immutable configuration only; clone it freely across tasks.
#[derive(Clone)]
pub struct IngestService {
    policy: Arc<ValidationPolicy>,
    patterns: Arc<PatternScanner>,
    malware: Arc<MalwareScanLayer>,
    issuer: UploadSessionIssuer,
}

impl IngestService {
    /// Build a service for `policy`.
    ///
    /// The scanner provider is consulted once, here. If it yields nothing the
    /// instance runs without malware scanning for its whole lifetime.
    pub async fn new(
        policy: ValidationPolicy,
        storage: Arc<dyn Storage>,
        scanner: &dyn ScannerProvider,
    ) -> Result<Self, ConfigError> {
        policy.validate()?;
        let patterns = PatternScanner::new(&policy.blocked_content_patterns)?;

        let malware = if policy.virus_scanning_enabled {
            MalwareScanLayer::initialize(scanner, policy.scan_timeout).await
        } else {
            tracing::info!(policy = policy.kind.as_str(), "Malware scanning disabled by policy");
            MalwareScanLayer::disabled()
        };

        tracing::info!(
            policy = policy.kind.as_str(),
            max_size_bytes = policy.max_size_bytes,
            storage = storage.backend_name(),
            "Ingest service initialized"
        );

        let policy = Arc::new(policy);
        Ok(Self {
            issuer: UploadSessionIssuer::new(policy.clone(), storage),
            policy,
            patterns: Arc::new(patterns),
            malware: Arc::new(malware),
        })
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub fn scanner_available(&self) -> bool {
        self.malware.is_available()
    }

    /// Pre-flight a declared upload and hand out a one-time upload target
    #[tracing::instrument(skip(self, request), fields(file_name = %request.file_name, declared_size = request.declared_size))]
    pub async fn generate_secure_upload_url(
        &self,
        request: &UploadRequest,
    ) -> Result<UploadSession, PreflightRejection> {
        self.issuer.issue(request).await
    }

    /// Run the full validation pipeline on received bytes
    #[tracing::instrument(skip(self, bytes, original_name), fields(file_name = %original_name, size = bytes.len()))]
    pub async fn validate_file(&self, bytes: Bytes, original_name: &str) -> ValidationOutcome {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        enter(ValidationStage::Received);

        enter(ValidationStage::Sniffing);
        let detected = if bytes.is_empty() {
            None
        } else {
            match ContentSniffer::detect(&bytes, original_name) {
                Ok(detected) => {
                    if let Err(e) = ContentSniffer::reconcile(original_name, &detected) {
                        errors.push(e);
                    }
                    Some(detected)
                }
                Err(e) => {
                    errors.push(e);
                    None
                }
            }
        };

        enter(ValidationStage::PolicyCheck);
        let validator = PolicyValidator::new(&self.policy);
        errors.extend(validator.validate_all(original_name, bytes.len(), detected.as_ref()));

        let detected = match detected {
            Some(detected) if errors.is_empty() => detected,
            _ => return reject(ValidationStage::PolicyCheck, errors, warnings),
        };

        if PatternScanner::applies_to(detected.mime_type) {
            enter(ValidationStage::PatternScan);
            if let Err(e) = self.patterns.scan(&bytes, detected.mime_type) {
                return reject(ValidationStage::PatternScan, vec![e], warnings);
            }
        } else {
            tracing::debug!(mime_type = detected.mime_type, "Binary content, pattern scan skipped");
        }

        if self.policy.virus_scanning_enabled {
            enter(ValidationStage::MalwareScan);
            match self.malware.scan(bytes.clone()).await {
                Ok(MalwareVerdict::Clean) => {}
                Ok(MalwareVerdict::Skipped) => warnings.push(ValidationError::ScannerUnavailable),
                Ok(MalwareVerdict::Infected(threat)) => {
                    return reject(
                        ValidationStage::MalwareScan,
                        vec![ValidationError::MalwareDetected { threat }],
                        warnings,
                    );
                }
                Err(e) => return reject(ValidationStage::MalwareScan, vec![e], warnings),
            }
        }

        let normalize =
            self.policy.compression.enabled && detected.mime_type.starts_with("image/");
        let normalized = if normalize {
            enter(ValidationStage::ImageNormalize);
            match self.normalize(bytes.clone(), detected).await {
                Ok(normalized) => Some(normalized),
                Err(e) => return reject(ValidationStage::ImageNormalize, vec![e], warnings),
            }
        } else {
            None
        };

        let (final_bytes, transformed, original_dimensions, final_dimensions) = match normalized {
            Some(n) => {
                tracing::debug!(
                    transformed = n.transformed,
                    quality = ?n.quality,
                    size = n.bytes.len(),
                    "Image normalized"
                );
                (
                    Bytes::from(n.bytes),
                    n.transformed,
                    n.original_dimensions,
                    n.final_dimensions,
                )
            }
            None => (bytes.clone(), false, None, None),
        };

        if final_bytes.len() > self.policy.max_size_bytes {
            return reject(
                size_check_stage(normalize),
                vec![ValidationError::SizeExceeded {
                    size: final_bytes.len(),
                    max: self.policy.max_size_bytes,
                }],
                warnings,
            );
        }

        enter(ValidationStage::Hashing);
        let hash = content_hash(&final_bytes);

        let metadata = FileMetadata {
            original_size: bytes.len(),
            compressed_size: transformed.then(|| final_bytes.len()),
            mime_type: detected.mime_type.to_string(),
            extension: detected.extension.to_string(),
            hash,
            original_dimensions,
            final_dimensions,
        };

        enter(ValidationStage::Complete);
        tracing::info!(
            mime_type = %metadata.mime_type,
            original_size = metadata.original_size,
            final_size = final_bytes.len(),
            warnings = warnings.len(),
            "Upload accepted"
        );

        ValidationOutcome::accepted(final_bytes, metadata, warnings)
    }

    /// Validate received bytes and, on success, assign their storage identity.
    ///
    /// A file id is minted for every attempt so rejections can be correlated
    /// in logs, but a [`FileIdentity`] is only returned for accepted files.
    #[tracing::instrument(skip(self, bytes, original_name), fields(file_name = %original_name, size = bytes.len()))]
    pub async fn process_secure_upload(
        &self,
        bytes: Bytes,
        original_name: &str,
        user_id: Option<Uuid>,
    ) -> ProcessedUpload {
        let file_id = Uuid::new_v4();
        let mut outcome = self.validate_file(bytes, original_name).await;

        let mut identity = None;
        if outcome.is_valid() {
            let sanitized_name = sanitize_file_name(original_name);
            match generate_upload_key(user_id, file_id, &sanitized_name) {
                Ok(storage_key) => {
                    identity = Some(FileIdentity {
                        file_id,
                        sanitized_name,
                        storage_key,
                    })
                }
                Err(e) => {
                    tracing::error!(file_id = %file_id, error = %e, "Failed to derive storage key");
                    let warnings = outcome.warnings().to_vec();
                    let metadata = outcome.metadata().cloned();
                    outcome = ValidationOutcome::rejected(
                        vec![ValidationError::UploadTargetUnavailable {
                            reason: e.to_string(),
                        }],
                        metadata,
                        warnings,
                    );
                }
            }
        }

        let report = SecurityReport::build(
            &outcome,
            &ReportContext::new(original_name)
                .with_file_id(file_id)
                .with_user(user_id),
        );
        tracing::debug!(file_id = %file_id, "{}", report);

        let success = outcome.is_valid();
        let (processed_bytes, metadata, errors, warnings) = outcome.into_parts();

        ProcessedUpload {
            success,
            processed_bytes,
            metadata,
            errors,
            warnings,
            file_id,
            identity,
            report,
        }
    }

    /// Image work is CPU-bound; run it on the blocking pool
    async fn normalize(
        &self,
        bytes: Bytes,
        detected: DetectedType,
    ) -> Result<intake_processing::NormalizedImage, ValidationError> {
        let policy = self.policy.clone();
        tokio::task::spawn_blocking(move || {
            ImageNormalizer::normalize(&bytes, detected.mime_type, &policy)
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Image normalization task failed");
            ValidationError::ImageProcessingFailure {
                reason: e.to_string(),
            }
        })?
    }
}

/// Stage blamed when the bytes to be stored exceed the size limit
fn size_check_stage(normalized: bool) -> ValidationStage {
    if normalized {
        ValidationStage::ImageNormalize
    } else {
        ValidationStage::PolicyCheck
    }
}

fn enter(stage: ValidationStage) {
    tracing::debug!(stage = %stage, "Validation stage");
}

fn reject(
    stage: ValidationStage,
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationError>,
) -> ValidationOutcome {
    enter(ValidationStage::Rejected);
    tracing::info!(
        stage = %stage,
        errors = ?errors.iter().map(|e| e.code()).collect::<Vec<_>>(),
        "Upload rejected"
    );
    ValidationOutcome::rejected(errors, None, warnings)
}
