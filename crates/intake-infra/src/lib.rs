//! Intake Infrastructure Library
//!
//! Process-level plumbing shared by hosts of the ingestion services.

pub mod telemetry;

pub use telemetry::{init_telemetry, LogFormat, TelemetryConfig, TelemetryError};
