//! Security reports
//!
//! A report is an audit artifact derived from a finished outcome. It is never
//! consulted for decisions.

use intake_core::constants::REPORT_HASH_PREFIX_LEN;
use intake_core::{Dimensions, ValidationError, ValidationOutcome};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Who and what an outcome was about
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub file_name: String,
    pub file_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl ReportContext {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    pub fn with_file_id(mut self, file_id: Uuid) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn with_user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
    Passed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub code: &'static str,
    pub message: String,
}

impl From<&ValidationError> for ReportEntry {
    fn from(error: &ValidationError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub status: ReportStatus,
    pub file_name: String,
    pub file_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub mime_type: Option<String>,
    pub extension: Option<String>,
    pub original_size: Option<usize>,
    pub final_size: Option<usize>,
    /// final / original; below 1.0 means the file shrank
    pub compression_ratio: Option<f64>,
    pub hash_prefix: Option<String>,
    pub original_dimensions: Option<Dimensions>,
    pub final_dimensions: Option<Dimensions>,
    pub errors: Vec<ReportEntry>,
    pub warnings: Vec<ReportEntry>,
}

impl SecurityReport {
    pub fn build(outcome: &ValidationOutcome, context: &ReportContext) -> Self {
        let metadata = outcome.metadata();

        let original_size = metadata.map(|m| m.original_size);
        let final_size = metadata.map(|m| m.compressed_size.unwrap_or(m.original_size));
        let compression_ratio = match (original_size, final_size) {
            (Some(original), Some(final_size)) if original > 0 => {
                Some(final_size as f64 / original as f64)
            }
            _ => None,
        };

        Self {
            status: if outcome.is_valid() {
                ReportStatus::Passed
            } else {
                ReportStatus::Rejected
            },
            file_name: context.file_name.clone(),
            file_id: context.file_id,
            user_id: context.user_id,
            mime_type: metadata.map(|m| m.mime_type.clone()),
            extension: metadata.map(|m| m.extension.clone()),
            original_size,
            final_size,
            compression_ratio,
            hash_prefix: metadata.map(|m| {
                m.hash
                    .chars()
                    .take(REPORT_HASH_PREFIX_LEN)
                    .collect::<String>()
            }),
            original_dimensions: metadata.and_then(|m| m.original_dimensions),
            final_dimensions: metadata.and_then(|m| m.final_dimensions),
            errors: outcome.errors().iter().map(ReportEntry::from).collect(),
            warnings: outcome.warnings().iter().map(ReportEntry::from).collect(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ReportStatus::Passed
    }
}

fn dimensions(d: Option<Dimensions>) -> String {
    d.map(|d| format!("{}x{}", d.width, d.height))
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for SecurityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            ReportStatus::Passed => "PASSED",
            ReportStatus::Rejected => "REJECTED",
        };

        writeln!(f, "Security report: {}", status)?;
        writeln!(f, "  File:       {}", self.file_name)?;
        if let Some(file_id) = self.file_id {
            writeln!(f, "  File ID:    {}", file_id)?;
        }
        if let Some(user_id) = self.user_id {
            writeln!(f, "  User:       {}", user_id)?;
        }
        if let (Some(mime_type), Some(extension)) = (&self.mime_type, &self.extension) {
            writeln!(f, "  Type:       {} (.{})", mime_type, extension)?;
        }
        if let (Some(original), Some(final_size)) = (self.original_size, self.final_size) {
            write!(f, "  Size:       {} -> {} bytes", original, final_size)?;
            match self.compression_ratio {
                Some(ratio) if final_size != original => {
                    writeln!(f, " ({:.1}% of original)", ratio * 100.0)?
                }
                _ => writeln!(f)?,
            }
        }
        if self.original_dimensions.is_some() {
            writeln!(
                f,
                "  Dimensions: {} -> {}",
                dimensions(self.original_dimensions),
                dimensions(self.final_dimensions)
            )?;
        }
        if let Some(hash) = &self.hash_prefix {
            writeln!(f, "  SHA-256:    {}...", hash)?;
        }
        for error in &self.errors {
            writeln!(f, "  ERROR   {}: {}", error.code, error.message)?;
        }
        for warning in &self.warnings {
            writeln!(f, "  WARNING {}: {}", warning.code, warning.message)?;
        }

        Ok(())
    }
}
