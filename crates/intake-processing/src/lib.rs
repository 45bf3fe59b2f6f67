//! Intake Processing Library
//!
//! The synchronous building blocks of the validation pipeline: content
//! sniffing, policy checks, injection pattern scanning, image normalization,
//! content hashing and security reports. Nothing in here does I/O; the
//! service layer runs the CPU-heavy parts on the blocking pool.

pub mod hashing;
pub mod image;
pub mod pattern_scan;
pub mod report;
pub mod sniffer;
pub mod stage;
pub mod validator;

// Re-export commonly used types
pub use hashing::content_hash;
pub use crate::image::{ImageNormalizer, NormalizedImage};
pub use pattern_scan::PatternScanner;
pub use report::{ReportContext, SecurityReport};
pub use sniffer::{ContentSniffer, DetectedType};
pub use stage::ValidationStage;
pub use validator::PolicyValidator;
