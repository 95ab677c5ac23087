//! HTTP transport for remote log sinks
//!
//! Delivers each flushed batch as a JSON array of entries in a single POST.
//! A non-2xx response or network error is a delivery failure and goes
//! through the batch transport's retry policy; the request timeout is
//! enforced by the HTTP client so a hung sink cannot stall the flush
//! worker indefinitely.

use super::batch::{BatchConfig, BatchSender, BatchTransport};
use crate::core::{LogEntry, PipelineError, Result, Transport};
use std::time::Duration;

/// Configuration for the HTTP sink
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Extra headers sent with every request
    pub headers: Vec<(String, String)>,
    /// Per-request delivery timeout; a timeout counts as a failed attempt
    pub timeout: Duration,
    /// Buffering and retry behavior
    pub batch: BatchConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            timeout: Duration::from_secs(10),
            batch: BatchConfig::default(),
        }
    }
}

struct HttpSink {
    client: reqwest::blocking::Client,
    endpoint: reqwest::Url,
    headers: Vec<(String, String)>,
}

impl BatchSender for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    fn send_batch(&mut self, entries: &[LogEntry]) -> Result<()> {
        let mut request = self.client.post(self.endpoint.clone()).json(entries);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        let response = request
            .send()
            .map_err(|e| PipelineError::transport("http", e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PipelineError::transport(
                "http",
                format!("sink returned status {}", status),
            ))
        }
    }
}

/// Batched HTTP transport
///
/// # Example
///
/// ```no_run
/// use obslog::transports::HttpTransport;
///
/// let transport = HttpTransport::new("https://logs.example.com/ingest")
///     .expect("valid endpoint");
/// ```
///
/// # Errors
///
/// Construction validates the endpoint eagerly and returns
/// [`PipelineError::Configuration`](crate::core::PipelineError) on a
/// malformed URL, so misconfiguration surfaces at setup time rather than
/// at first flush.
pub struct HttpTransport {
    inner: BatchTransport,
}

impl HttpTransport {
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self> {
        Self::with_config(endpoint, HttpConfig::default())
    }

    pub fn with_config(endpoint: impl AsRef<str>, config: HttpConfig) -> Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint.as_ref()).map_err(|e| {
            PipelineError::config(
                "http_transport",
                format!("malformed endpoint '{}': {}", endpoint.as_ref(), e),
            )
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(PipelineError::config(
                "http_transport",
                format!("unsupported scheme '{}'", endpoint.scheme()),
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::config("http_transport", e.to_string()))?;

        let sink = HttpSink {
            client,
            endpoint,
            headers: config.headers,
        };
        Ok(Self {
            inner: BatchTransport::new(Box::new(sink), config.batch),
        })
    }
}

// Manual impl: the inner batch transport holds non-Debug worker state
impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn log(&mut self, entry: &LogEntry) -> Result<()> {
        self.inner.log(entry)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn destroy(&mut self) -> Result<()> {
        self.inner.destroy()
    }
}
