//! Core pipeline types and traits

pub mod context;
pub mod dedup;
pub mod error;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod sampling;
pub mod sanitize;
pub mod trace_context;
pub mod transport;

pub use context::{
    clear_global_context, current_context, set_global_context, ContextScope, CorrelationContext,
};
pub use dedup::{DedupKeyFn, Deduplicator};
pub use error::{PipelineError, Result};
pub use log_entry::{ErrorInfo, LogEntry, Metadata, Runtime};
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder, LoggerOverrides};
pub use metrics::{global as global_metrics, MetricsSnapshot, PipelineMetrics, PrometheusOptions};
pub use sampling::{
    CompositeSampler, NamespaceSampler, ProbabilitySampler, RateLimitSampler, Sampler,
};
pub use sanitize::{
    sanitize, sanitize_metadata, ContentPattern, FieldMatch, MaskStrategy, RedactionRules,
    SanitizePreset, MAX_DEPTH, REDACTED,
};
pub use trace_context::{
    parse_traceparent, TraceState, TraceStateEntry, MAX_MEMBER_LEN, MAX_TRACESTATE_ENTRIES,
};
pub use transport::Transport;
