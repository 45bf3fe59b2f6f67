//! Tracing initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a fmt
//! layer, plain or JSON.

mod init;

pub use init::{init_telemetry, LogFormat, TelemetryConfig, TelemetryError};
