use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "intake=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "plain" | "text" | "pretty" => Some(LogFormat::Plain),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub format: LogFormat,
    /// Used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "intake".to_string(),
            format: LogFormat::Plain,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read `INTAKE_SERVICE_NAME` and `INTAKE_LOG_FORMAT` (plain | json)
    pub fn from_env() -> Result<Self, TelemetryError> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(name) = env::var("INTAKE_SERVICE_NAME") {
            if !name.trim().is_empty() {
                config.service_name = name.trim().to_string();
            }
        }
        if let Ok(format) = env::var("INTAKE_LOG_FORMAT") {
            config.format =
                LogFormat::parse(&format).ok_or(TelemetryError::InvalidFormat(format))?;
        }

        Ok(config)
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| self.default_filter.as_str().into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid log format: {0} (expected plain or json)")]
    InvalidFormat(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let registry = tracing_subscriber::registry().with(config.filter());

    match config.format {
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }

    tracing::info!(
        service = %config.service_name,
        format = ?config.format,
        "Tracing initialized"
    );
    Ok(())
}
