use async_trait::async_trait;
use clamav_client::clean;
use clamav_client::tokio::Tcp;
use intake_core::constants::DEFAULT_SCANNER_PING_TIMEOUT;
use intake_core::ConfigError;
use std::env;
use std::future::Future;
use std::io;
use std::path::Path;
use std::str;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use super::{EngineVerdict, MalwareEngine, ScannerHandle, ScannerProvider};

/// Connection settings for a clamd daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClamAvConfig {
    pub host: String,
    pub port: u16,
    /// INSTREAM chunk size; clamav-client's default when `None`
    pub chunk_size: Option<usize>,
    pub ping_timeout: Duration,
}

impl Default for ClamAvConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3310,
            chunk_size: None,
            ping_timeout: DEFAULT_SCANNER_PING_TIMEOUT,
        }
    }
}

impl ClamAvConfig {
    /// Read `CLAMAV_HOST`, `CLAMAV_PORT`, `CLAMAV_CHUNK_SIZE` and `CLAMAV_PING_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(host) = env::var("CLAMAV_HOST") {
            if !host.trim().is_empty() {
                config.host = host.trim().to_string();
            }
        }
        if let Ok(port) = env::var("CLAMAV_PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "CLAMAV_PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Ok(chunk_size) = env::var("CLAMAV_CHUNK_SIZE") {
            let parsed: usize = chunk_size.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "CLAMAV_CHUNK_SIZE".to_string(),
                value: chunk_size.clone(),
            })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "CLAMAV_CHUNK_SIZE".to_string(),
                    value: chunk_size,
                });
            }
            config.chunk_size = Some(parsed);
        }
        if let Ok(secs) = env::var("CLAMAV_PING_TIMEOUT_SECS") {
            let parsed: u64 = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "CLAMAV_PING_TIMEOUT_SECS".to_string(),
                value: secs.clone(),
            })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "CLAMAV_PING_TIMEOUT_SECS".to_string(),
                    value: secs,
                });
            }
            config.ping_timeout = Duration::from_secs(parsed);
        }

        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Run one clamav-client request to completion.
///
/// The client's tokio futures are `!Send`, so they are driven on a blocking
/// thread through the runtime handle. Dropping the returned future drops the
/// request and its socket, which frees the thread.
async fn run_request<F, Fut>(request: F) -> anyhow::Result<Vec<u8>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = io::Result<Vec<u8>>>,
{
    let handle = tokio::runtime::Handle::current();
    let (_cancel_on_drop, cancelled) = oneshot::channel::<()>();

    let response = tokio::task::spawn_blocking(move || {
        handle.block_on(async move {
            tokio::select! {
                response = request() => Some(response),
                _ = cancelled => None,
            }
        })
    })
    .await?;

    match response {
        Some(response) => Ok(response?),
        None => anyhow::bail!("ClamAV request cancelled"),
    }
}

/// Scans through a clamd daemon over TCP
#[derive(Debug, Clone)]
pub struct ClamAvEngine {
    config: ClamAvConfig,
}

impl ClamAvEngine {
    pub fn new(config: ClamAvConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MalwareEngine for ClamAvEngine {
    async fn scan_file(&self, path: &Path) -> anyhow::Result<EngineVerdict> {
        let start = Instant::now();
        let address = self.config.address();
        let chunk_size = self.config.chunk_size;
        let path = path.to_path_buf();

        tracing::debug!(address = %address, "Starting ClamAV scan");

        let response = run_request(move || async move {
            clamav_client::tokio::scan_file(
                &path,
                Tcp {
                    host_address: address,
                },
                chunk_size,
            )
            .await
        })
        .await?;

        let is_clean = clean(&response)
            .map_err(|e| anyhow::anyhow!("Failed to parse ClamAV response: {}", e))?;

        if is_clean {
            tracing::debug!(
                duration_ms = start.elapsed().as_millis(),
                "ClamAV scan completed: clean"
            );
            return Ok(EngineVerdict::clean());
        }

        let signatures = parse_signatures(&response);
        if signatures.is_empty() {
            // Neither OK nor FOUND, e.g. "INSTREAM size limit exceeded. ERROR"
            let message = str::from_utf8(&response).unwrap_or("unreadable response");
            anyhow::bail!(
                "Unexpected ClamAV response: {}",
                message.trim_end_matches('\0').trim()
            );
        }

        Ok(EngineVerdict::infected(signatures))
    }

    fn engine_name(&self) -> &'static str {
        "clamav"
    }
}

/// Signature names from a clamd reply such as `stream: Eicar-Test-Signature FOUND`
fn parse_signatures(response: &[u8]) -> Vec<String> {
    let Ok(text) = str::from_utf8(response) else {
        return Vec::new();
    };

    text.split(['\0', '\n'])
        .map(str::trim)
        .filter_map(|line| line.strip_suffix("FOUND"))
        .map(|line| {
            line.rsplit_once(':')
                .map(|(_, name)| name)
                .unwrap_or(line)
                .trim()
                .to_string()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// Pings clamd once at startup; an unreachable daemon disables scanning
#[derive(Debug, Clone)]
pub struct ClamAvProvider {
    config: ClamAvConfig,
}

impl ClamAvProvider {
    pub fn new(config: ClamAvConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScannerProvider for ClamAvProvider {
    async fn try_initialize(&self) -> Option<ScannerHandle> {
        let address = self.config.address();
        let ping_address = address.clone();

        let ping = tokio::time::timeout(
            self.config.ping_timeout,
            run_request(move || async move {
                clamav_client::tokio::ping(Tcp {
                    host_address: ping_address,
                })
                .await
            }),
        )
        .await;

        match ping {
            Ok(Ok(response)) if response == clamav_client::PONG => {
                tracing::info!(address = %address, "ClamAV daemon reachable");
                Some(ScannerHandle::new(Arc::new(ClamAvEngine::new(
                    self.config.clone(),
                ))))
            }
            Ok(Ok(response)) => {
                tracing::warn!(
                    address = %address,
                    response = %String::from_utf8_lossy(&response),
                    "Unexpected ClamAV ping response"
                );
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(address = %address, error = %e, "ClamAV daemon unreachable");
                None
            }
            Err(_) => {
                tracing::warn!(
                    address = %address,
                    timeout_ms = self.config.ping_timeout.as_millis(),
                    "ClamAV ping timed out"
                );
                None
            }
        }
    }
}
