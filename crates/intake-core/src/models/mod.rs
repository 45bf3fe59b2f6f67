//! Domain models for the ingestion pipeline

pub mod outcome;
pub mod upload;

pub use outcome::{Dimensions, FileMetadata, ValidationOutcome};
pub use upload::{FileIdentity, UploadRequest, UploadSession};
