//! # obslog
//!
//! A structured logging and distributed-tracing pipeline with correlation
//! propagation, sanitization, sampling, and batched delivery.
//!
//! ## Features
//!
//! - **Correlation Context**: request/trace/span ids propagated implicitly
//!   through scopes, W3C trace-context compatible
//! - **Sanitization**: GDPR/HIPAA/PCI-DSS presets redacting sensitive fields
//!   and content patterns before delivery
//! - **Sampling**: probability, rate-limit, per-namespace, and composite
//!   samplers with error bypass
//! - **Deduplication**: repeated messages collapsed into summary entries
//! - **Batched Transports**: background flushing with retry, backoff, and
//!   drop-and-count overload behavior
//! - **Self-Observability**: pipeline counters exportable as Prometheus text
//!
//! ## Quick start
//!
//! ```
//! use obslog::prelude::*;
//!
//! let logger = Logger::builder()
//!     .min_level(LogLevel::Debug)
//!     .sanitize(SanitizePreset::Gdpr)
//!     .build()
//!     .unwrap();
//!
//! let ctx = CorrelationContext::new();
//! let _scope = ContextScope::enter(ctx);
//! logger.info("request accepted");
//! ```

pub mod core;
pub mod macros;
pub mod transports;

pub mod prelude {
    #[cfg(feature = "console")]
    pub use crate::transports::ConsoleTransport;
    pub use crate::transports::{BatchConfig, BatchSender, BatchTransport, FileTransport};
    pub use crate::core::{
        current_context, ContextScope, CorrelationContext, Deduplicator, ErrorInfo, LogEntry,
        LogLevel, Logger, LoggerBuilder, Metadata, MetricsSnapshot, PipelineError,
        PipelineMetrics, PrometheusOptions, RedactionRules, Result, Runtime, SanitizePreset,
        TraceState, Transport,
    };
}

#[cfg(feature = "console")]
pub use transports::ConsoleTransport;
#[cfg(feature = "http")]
pub use transports::{HttpConfig, HttpTransport};
pub use transports::{BatchConfig, BatchSender, BatchTransport, FileTransport};
pub use crate::core::{
    clear_global_context, current_context, global_metrics, parse_traceparent, sanitize,
    set_global_context, CompositeSampler, ContextScope, CorrelationContext, Deduplicator,
    ErrorInfo, LogEntry, LogLevel, Logger, LoggerBuilder, LoggerOverrides, Metadata,
    MetricsSnapshot, NamespaceSampler, PipelineError, PipelineMetrics, ProbabilitySampler,
    PrometheusOptions, RateLimitSampler, RedactionRules, Result, Runtime, Sampler,
    SanitizePreset, TraceState, Transport, REDACTED,
};
