//! Metric source contract and the built-in command / HTTP adapters.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::{MetricKind, Snapshot};
use crate::config::{ProviderConfig, SourceConfig};

/// Errors a metric source can report for one poll.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Poll did not finish in time
    #[error("poll timed out after {0}s")]
    Timeout(u64),

    /// Command could not be started
    #[error("failed to spawn '{program}': {message}")]
    Spawn { program: String, message: String },

    /// Command exited unsuccessfully
    #[error("command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    /// Endpoint unreachable
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Endpoint answered with a non-success status
    #[error("HTTP error: {0}")]
    HttpError(u16),

    /// Output was not a JSON document
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// No source is configured for the kind
    #[error("no source configured for {0}")]
    NotConfigured(MetricKind),
}

/// Produces point-in-time snapshots of one metric kind.
///
/// Implementations should bound their own runtime; the scheduler does not
/// time out a poll, so a hanging source stalls its own kind's loop.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Kind of snapshot this source produces.
    fn kind(&self) -> MetricKind;

    /// Capture a snapshot now.
    async fn poll(&self) -> Result<Snapshot, SourceError>;
}

/// Runs an external command and parses its stdout as the JSON payload.
pub struct CommandSource {
    kind: MetricKind,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSource {
    pub fn new(kind: MetricKind, program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            kind,
            program: program.into(),
            args,
            timeout,
        }
    }
}

#[async_trait]
impl MetricSource for CommandSource {
    fn kind(&self) -> MetricKind {
        self.kind
    }

    async fn poll(&self) -> Result<Snapshot, SourceError> {
        let child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| SourceError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| SourceError::Spawn {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SourceError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let payload: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| SourceError::InvalidPayload(e.to_string()))?;

        Ok(Snapshot::new(self.kind, payload))
    }
}

/// Fetches a JSON document from an HTTP endpoint.
pub struct HttpSource {
    kind: MetricKind,
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(kind: MetricKind, url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(kind, url, timeout, reqwest::Client::new())
    }

    /// Create a source with a custom HTTP client (for testing).
    pub fn with_client(
        kind: MetricKind,
        url: impl Into<String>,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            kind,
            url: url.into(),
            client,
            timeout,
        }
    }

    fn classify_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.timeout.as_secs())
        } else if e.is_decode() {
            SourceError::InvalidPayload(e.to_string())
        } else {
            SourceError::ConnectionFailed(e.to_string())
        }
    }
}

#[async_trait]
impl MetricSource for HttpSource {
    fn kind(&self) -> MetricKind {
        self.kind
    }

    async fn poll(&self) -> Result<Snapshot, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify_error(e))?;

        if !response.status().is_success() {
            return Err(SourceError::HttpError(response.status().as_u16()));
        }

        let payload: Value = response.json().await.map_err(|e| self.classify_error(e))?;
        Ok(Snapshot::new(self.kind, payload))
    }
}

/// Build the adapter described by a `[[telemetry.sources]]` entry.
pub fn build_source(config: &SourceConfig) -> Arc<dyn MetricSource> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    match &config.provider {
        ProviderConfig::Command { program, args } => Arc::new(CommandSource::new(
            config.kind,
            program.clone(),
            args.clone(),
            timeout,
        )),
        ProviderConfig::Http { url } => Arc::new(HttpSource::new(config.kind, url.clone(), timeout)),
    }
}
