//! Intake Core Library
//!
//! This crate provides the domain models, error taxonomy and validation policies
//! shared by every stage of the ingestion pipeline.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{CompressionSettings, ImageDimensionCap, PolicyKind, ValidationPolicy};
pub use error::{ConfigError, ValidationError};
pub use models::{
    Dimensions, FileIdentity, FileMetadata, UploadRequest, UploadSession, ValidationOutcome,
};
