//! Pipeline self-observability metrics
//!
//! Counters describing the pipeline's own behavior, incremented at each
//! decision point (delivery, sampling rejection, transport failure, drop,
//! flush). All counters are atomic; the process-wide instance returned by
//! [`global()`] is the one intentionally shared mutable resource in the
//! crate and is safe to increment concurrently.
//!
//! # Example
//!
//! ```
//! use obslog::core::{LogLevel, PipelineMetrics, PrometheusOptions};
//!
//! let metrics = PipelineMetrics::new();
//! metrics.inc_logs(LogLevel::Info, 1);
//! metrics.inc_dropped(2);
//!
//! let text = metrics.to_prometheus_text(&PrometheusOptions::default());
//! assert!(text.contains("obslog_dropped_total 2"));
//! ```

use super::log_level::LogLevel;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static GLOBAL: Lazy<Arc<PipelineMetrics>> = Lazy::new(|| Arc::new(PipelineMetrics::new()));

/// Process-wide metrics singleton, initialized on first access.
///
/// Components default to this instance; tests may substitute their own
/// [`PipelineMetrics`] for isolation.
pub fn global() -> Arc<PipelineMetrics> {
    Arc::clone(&GLOBAL)
}

/// Rendering options for the Prometheus exposition text
#[derive(Debug, Clone)]
pub struct PrometheusOptions {
    /// Metric name prefix
    pub prefix: String,
    /// Static labels applied uniformly to every series, rendered in
    /// insertion order
    pub labels: Vec<(String, String)>,
}

impl Default for PrometheusOptions {
    fn default() -> Self {
        Self {
            prefix: "obslog".to_string(),
            labels: Vec::new(),
        }
    }
}

impl PrometheusOptions {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            labels: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub logs_by_level: [u64; 5],
    pub dropped: u64,
    pub transport_errors: u64,
    pub sampled_out: u64,
    pub flushes: u64,
    pub last_flush_duration_ms: u64,
}

/// Atomic counters for pipeline observability
#[derive(Debug)]
pub struct PipelineMetrics {
    logs_by_level: [AtomicU64; 5],
    dropped: AtomicU64,
    transport_errors: AtomicU64,
    sampled_out: AtomicU64,
    flushes: AtomicU64,
    last_flush_duration_ms: AtomicU64,
}

impl PipelineMetrics {
    pub const fn new() -> Self {
        Self {
            logs_by_level: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
            dropped: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            sampled_out: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            last_flush_duration_ms: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc_logs(&self, level: LogLevel, n: u64) {
        self.logs_by_level[level.index()].fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_transport_errors(&self, n: u64) {
        self.transport_errors.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_sampled_out(&self, n: u64) {
        self.sampled_out.fetch_add(n, Ordering::Relaxed);
    }

    /// Record a completed flush and its duration
    #[inline]
    pub fn record_flush(&self, duration_ms: u64) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.last_flush_duration_ms
            .store(duration_ms, Ordering::Relaxed);
    }

    #[inline]
    pub fn logs_for(&self, level: LogLevel) -> u64 {
        self.logs_by_level[level.index()].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sampled_out(&self) -> u64 {
        self.sampled_out.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut logs_by_level = [0u64; 5];
        for (slot, counter) in logs_by_level.iter_mut().zip(&self.logs_by_level) {
            *slot = counter.load(Ordering::Relaxed);
        }
        MetricsSnapshot {
            logs_by_level,
            dropped: self.dropped(),
            transport_errors: self.transport_errors(),
            sampled_out: self.sampled_out(),
            flushes: self.flushes(),
            last_flush_duration_ms: self.last_flush_duration_ms.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        for counter in &self.logs_by_level {
            counter.store(0, Ordering::Relaxed);
        }
        self.dropped.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
        self.sampled_out.store(0, Ordering::Relaxed);
        self.flushes.store(0, Ordering::Relaxed);
        self.last_flush_duration_ms.store(0, Ordering::Relaxed);
    }

    /// Render the standard Prometheus exposition text: one HELP/TYPE pair
    /// per metric followed by its series lines.
    pub fn to_prometheus_text(&self, options: &PrometheusOptions) -> String {
        let snapshot = self.snapshot();
        let prefix = &options.prefix;
        let mut out = String::new();

        let render_labels = |extra: Option<(&str, &str)>| -> String {
            let mut pairs: Vec<String> = options
                .labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect();
            if let Some((k, v)) = extra {
                pairs.push(format!("{}=\"{}\"", k, v));
            }
            if pairs.is_empty() {
                String::new()
            } else {
                format!("{{{}}}", pairs.join(","))
            }
        };

        out.push_str(&format!(
            "# HELP {p}_logs_total Log entries delivered, by level\n# TYPE {p}_logs_total counter\n",
            p = prefix
        ));
        for level in LogLevel::ALL {
            out.push_str(&format!(
                "{}_logs_total{} {}\n",
                prefix,
                render_labels(Some(("level", level.to_str()))),
                snapshot.logs_by_level[level.index()]
            ));
        }

        let counters: [(&str, &str, u64); 4] = [
            ("dropped_total", "Entries dropped after retry exhaustion or overflow", snapshot.dropped),
            ("transport_errors_total", "Failed transport delivery attempts", snapshot.transport_errors),
            ("sampled_out_total", "Entries rejected by sampling", snapshot.sampled_out),
            ("flushes_total", "Completed batch flushes", snapshot.flushes),
        ];
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP {p}_{name} {help}\n# TYPE {p}_{name} counter\n{p}_{name}{labels} {value}\n",
                p = prefix,
                name = name,
                help = help,
                labels = render_labels(None),
                value = value
            ));
        }

        out.push_str(&format!(
            "# HELP {p}_last_flush_duration_ms Duration of the most recent flush\n\
             # TYPE {p}_last_flush_duration_ms gauge\n\
             {p}_last_flush_duration_ms{labels} {value}\n",
            p = prefix,
            labels = render_labels(None),
            value = snapshot.last_flush_duration_ms
        ));

        out
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_zero() {
        let metrics = PipelineMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.logs_by_level, [0; 5]);
        assert_eq!(snapshot.dropped, 0);
        assert_eq!(snapshot.transport_errors, 0);
        assert_eq!(snapshot.sampled_out, 0);
        assert_eq!(snapshot.flushes, 0);
    }

    #[test]
    fn test_increments() {
        let metrics = PipelineMetrics::new();
        metrics.inc_logs(LogLevel::Info, 1);
        metrics.inc_logs(LogLevel::Info, 2);
        metrics.inc_logs(LogLevel::Error, 1);
        metrics.inc_dropped(3);
        metrics.inc_transport_errors(1);
        metrics.inc_sampled_out(5);
        metrics.record_flush(42);

        assert_eq!(metrics.logs_for(LogLevel::Info), 3);
        assert_eq!(metrics.logs_for(LogLevel::Error), 1);
        assert_eq!(metrics.dropped(), 3);
        assert_eq!(metrics.transport_errors(), 1);
        assert_eq!(metrics.sampled_out(), 5);
        assert_eq!(metrics.flushes(), 1);
        assert_eq!(metrics.snapshot().last_flush_duration_ms, 42);
    }

    #[test]
    fn test_reset() {
        let metrics = PipelineMetrics::new();
        metrics.inc_logs(LogLevel::Warn, 7);
        metrics.inc_dropped(1);
        metrics.record_flush(9);
        metrics.reset();
        assert_eq!(metrics.snapshot(), PipelineMetrics::new().snapshot());
    }

    #[test]
    fn test_concurrent_increments_not_lost() {
        let metrics = std::sync::Arc::new(PipelineMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = std::sync::Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.inc_logs(LogLevel::Debug, 1);
                        metrics.inc_dropped(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.logs_for(LogLevel::Debug), 8000);
        assert_eq!(metrics.dropped(), 8000);
    }

    #[test]
    fn test_prometheus_text_shape() {
        let metrics = PipelineMetrics::new();
        metrics.inc_logs(LogLevel::Info, 2);
        metrics.inc_dropped(1);

        let text = metrics.to_prometheus_text(&PrometheusOptions::default());
        assert!(text.contains("# HELP obslog_logs_total"));
        assert!(text.contains("# TYPE obslog_logs_total counter"));
        assert!(text.contains("obslog_logs_total{level=\"info\"} 2"));
        assert!(text.contains("obslog_logs_total{level=\"trace\"} 0"));
        assert!(text.contains("obslog_dropped_total 1"));
        assert!(text.contains("# TYPE obslog_last_flush_duration_ms gauge"));
    }

    #[test]
    fn test_prometheus_prefix_and_static_labels() {
        let metrics = PipelineMetrics::new();
        metrics.inc_logs(LogLevel::Error, 1);

        let options = PrometheusOptions::new("myapp")
            .with_label("service", "billing")
            .with_label("region", "eu-1");
        let text = metrics.to_prometheus_text(&options);
        // Static labels in insertion order, level label appended last
        assert!(text.contains(
            "myapp_logs_total{service=\"billing\",region=\"eu-1\",level=\"error\"} 1"
        ));
        assert!(text.contains("myapp_dropped_total{service=\"billing\",region=\"eu-1\"} 0"));
    }

    #[test]
    fn test_global_singleton_shared() {
        let a = global();
        let b = global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
