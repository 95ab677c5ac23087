//! Logger core: pipeline orchestration
//!
//! `Logger` wires the stages together. Per call: enabled/level gate,
//! sampling, sanitization, deduplication, context stamping, then fan-out
//! to every registered transport. A failing or panicking transport never
//! blocks the others, and logging never returns an error to application
//! code; only setup calls (`add_transport`, builder validation) surface
//! configuration errors synchronously.
//!
//! Child loggers inherit unset configuration from their parent and join
//! namespaces with `:`; children created without overrides are memoized.
//!
//! # Example
//!
//! ```
//! use obslog::core::{Logger, LogLevel};
//!
//! let logger = Logger::builder()
//!     .min_level(LogLevel::Debug)
//!     .build()
//!     .unwrap();
//!
//! logger.info("server started");
//! let db = logger.child("db");
//! db.debug("pool warmed");
//! ```

use super::context::current_context;
use super::dedup::Deduplicator;
use super::error::{PipelineError, Result};
use super::log_entry::{ErrorInfo, LogEntry, Metadata, Runtime};
use super::log_level::LogLevel;
use super::metrics::{self, PipelineMetrics};
use super::sampling::Sampler;
use super::sanitize::{sanitize_metadata, RedactionRules, SanitizePreset};
use super::transport::Transport;
use crossbeam_channel::{bounded, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval for the dedup window sweeper
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// State shared by a logger and all of its children: the transport
/// registry, the metrics sink, and the dedup sweeper.
struct PipelineCore {
    transports: RwLock<Vec<Box<dyn Transport>>>,
    metrics: Arc<PipelineMetrics>,
    /// Every deduplicator in the hierarchy; window maps stay private to
    /// their owning logger, only expiry is driven centrally
    dedups: RwLock<Vec<Weak<Deduplicator>>>,
    sweeper_stop: Mutex<Option<Sender<()>>>,
    sweeper_handle: Mutex<Option<thread::JoinHandle<()>>>,
    initialized: AtomicBool,
    destroyed: AtomicBool,
}

impl PipelineCore {
    fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            transports: RwLock::new(Vec::new()),
            metrics,
            dedups: RwLock::new(Vec::new()),
            sweeper_stop: Mutex::new(None),
            sweeper_handle: Mutex::new(None),
            initialized: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Fan an entry out to every transport with per-transport isolation.
    fn dispatch(&self, entry: &LogEntry) {
        let mut transports = self.transports.write();
        for transport in transports.iter_mut() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                transport.log(entry)
            }));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!("[LOGGER ERROR] Transport '{}' failed: {}", transport.name(), e);
                }
                Err(_) => {
                    eprintln!(
                        "[LOGGER CRITICAL] Transport '{}' panicked. \
                         Other transports continue to function.",
                        transport.name()
                    );
                }
            }
        }
        self.metrics.inc_logs(entry.level, 1);
    }

    fn register_dedup(self: &Arc<Self>, dedup: &Arc<Deduplicator>) {
        self.dedups.write().push(Arc::downgrade(dedup));
        self.ensure_sweeper();
    }

    fn ensure_sweeper(self: &Arc<Self>) {
        let mut stop_slot = self.sweeper_stop.lock();
        if stop_slot.is_some() || self.destroyed.load(Ordering::Acquire) {
            return;
        }
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let core = Arc::downgrade(self);
        let handle = thread::Builder::new()
            .name("obslog-dedup-sweeper".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(SWEEP_INTERVAL) {
                    Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        let Some(core) = core.upgrade() else { break };
                        core.sweep_dedups(Instant::now());
                    }
                }
            })
            .expect("failed to spawn dedup sweeper thread");
        *stop_slot = Some(stop_tx);
        *self.sweeper_handle.lock() = Some(handle);
    }

    /// Emit summaries for expired windows and prune dead deduplicators
    fn sweep_dedups(&self, now: Instant) {
        let mut summaries = Vec::new();
        {
            let mut dedups = self.dedups.write();
            dedups.retain(|weak| match weak.upgrade() {
                Some(dedup) => {
                    summaries.extend(dedup.take_expired(now));
                    true
                }
                None => false,
            });
        }
        for summary in &summaries {
            self.dispatch(summary);
        }
    }

    fn init(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut first_error = None;
        let mut transports = self.transports.write();
        for transport in transports.iter_mut() {
            if let Err(e) = transport.init() {
                eprintln!("[LOGGER ERROR] Transport '{}' init failed: {}", transport.name(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Stop the sweeper before the final drain so it cannot race the
        // summaries we are about to emit
        if let Some(stop) = self.sweeper_stop.lock().take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.sweeper_handle.lock().take() {
            let _ = handle.join();
        }

        let pending: Vec<LogEntry> = {
            let dedups = self.dedups.read();
            dedups
                .iter()
                .filter_map(|weak| weak.upgrade())
                .flat_map(|dedup| dedup.drain())
                .collect()
        };
        for summary in &pending {
            self.dispatch(summary);
        }

        let mut transports = self.transports.write();
        for transport in transports.iter_mut() {
            if let Err(e) = transport.destroy() {
                eprintln!(
                    "[LOGGER ERROR] Transport '{}' destroy failed: {}",
                    transport.name(),
                    e
                );
            }
        }
        Ok(())
    }
}

/// Per-child configuration overrides; unset fields inherit from the parent
#[derive(Default)]
pub struct LoggerOverrides {
    pub enabled: Option<bool>,
    pub min_level: Option<LogLevel>,
    pub runtime: Option<Runtime>,
    pub sampler: Option<Arc<dyn Sampler>>,
    pub sanitize: Option<SanitizePreset>,
    pub dedup_window: Option<Duration>,
}

pub struct Logger {
    namespace: Option<String>,
    enabled: bool,
    min_level: LogLevel,
    runtime: Runtime,
    sampler: Option<Arc<dyn Sampler>>,
    sanitize_rules: Option<Arc<RedactionRules>>,
    /// Dedup window length, inherited by children (each child owns its own
    /// window map)
    dedup_window: Option<Duration>,
    dedup: Option<Arc<Deduplicator>>,
    core: Arc<PipelineCore>,
    children: RwLock<HashMap<String, Arc<Logger>>>,
}

impl Logger {
    /// Create a builder for Logger
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Register a transport. Duplicate names are a configuration error.
    pub fn add_transport(&self, transport: Box<dyn Transport>) -> Result<()> {
        let mut transports = self.core.transports.write();
        if transports.iter().any(|t| t.name() == transport.name()) {
            return Err(PipelineError::config(
                "logger",
                format!("duplicate transport name '{}'", transport.name()),
            ));
        }
        transports.push(transport);
        Ok(())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.core.metrics)
    }

    /// Main pipeline entry point. Never returns an error; delivery is
    /// best-effort and failures are visible only through metrics.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.log_full(level, message, Metadata::new(), None);
    }

    /// Log with structured metadata
    pub fn log_with(&self, level: LogLevel, message: impl Into<String>, metadata: Metadata) {
        self.log_full(level, message, metadata, None);
    }

    fn log_full(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        metadata: Metadata,
        error: Option<ErrorInfo>,
    ) {
        if !self.enabled
            || level < self.min_level
            || self.core.destroyed.load(Ordering::Acquire)
        {
            return;
        }

        let mut entry = LogEntry::new(level, message)
            .with_metadata(metadata)
            .with_runtime(self.runtime);
        if let Some(namespace) = &self.namespace {
            entry.namespace = Some(namespace.clone());
        }
        if let Some(error) = error {
            entry.error = Some(error);
        }
        if let Some(context) = current_context() {
            entry.context = Some(context);
        }

        if let Some(sampler) = &self.sampler {
            if !sampler.should_sample(&entry) {
                self.core.metrics.inc_sampled_out(1);
                return;
            }
        }

        if let Some(rules) = &self.sanitize_rules {
            entry.metadata = sanitize_metadata(&entry.metadata, rules);
        }

        if let Some(dedup) = &self.dedup {
            if !dedup.check(&entry) {
                return;
            }
        }

        self.core.dispatch(&entry);
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Helper for structured info logging
    pub fn info_with(&self, message: impl Into<String>, metadata: Metadata) {
        self.log_with(LogLevel::Info, message, metadata);
    }

    /// Helper for structured error logging
    pub fn error_with(&self, message: impl Into<String>, metadata: Metadata) {
        self.log_with(LogLevel::Error, message, metadata);
    }

    /// Log with captured error details attached to the entry
    pub fn log_error(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        error: ErrorInfo,
    ) {
        self.log_full(level, message, Metadata::new(), Some(error));
    }

    fn joined_namespace(&self, child: &str) -> String {
        match &self.namespace {
            Some(parent) => format!("{}:{}", parent, child),
            None => child.to_string(),
        }
    }

    fn make_child(&self, namespace: &str, overrides: LoggerOverrides) -> Logger {
        let dedup_window = overrides.dedup_window.or(self.dedup_window);
        let dedup = dedup_window.map(|window| {
            let dedup = Arc::new(Deduplicator::new(window));
            self.core.register_dedup(&dedup);
            dedup
        });
        let sanitize_rules = match overrides.sanitize {
            Some(preset) => preset.rules().map(Arc::new),
            None => self.sanitize_rules.clone(),
        };
        Logger {
            namespace: Some(self.joined_namespace(namespace)),
            enabled: overrides.enabled.unwrap_or(self.enabled),
            min_level: overrides.min_level.unwrap_or(self.min_level),
            runtime: overrides.runtime.unwrap_or(self.runtime),
            sampler: overrides.sampler.or_else(|| self.sampler.clone()),
            sanitize_rules,
            dedup_window,
            dedup,
            core: Arc::clone(&self.core),
            children: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create a child logger. Children created without overrides
    /// are cached and reused for identical namespace requests.
    pub fn child(&self, namespace: &str) -> Arc<Logger> {
        if let Some(existing) = self.children.read().get(namespace) {
            return Arc::clone(existing);
        }
        let mut children = self.children.write();
        // Re-check under the write lock
        if let Some(existing) = children.get(namespace) {
            return Arc::clone(existing);
        }
        let child = Arc::new(self.make_child(namespace, LoggerOverrides::default()));
        children.insert(namespace.to_string(), Arc::clone(&child));
        child
    }

    /// Create a child with configuration overrides; never cached
    pub fn child_with(&self, namespace: &str, overrides: LoggerOverrides) -> Logger {
        self.make_child(namespace, overrides)
    }

    /// Initialize all registered transports. Idempotent: repeat calls are
    /// no-ops after the first.
    pub fn init(&self) -> Result<()> {
        self.core.init()
    }

    /// Ask every transport to flush its pending buffer. One transport's
    /// failure does not prevent the others from flushing; the first error
    /// is returned after all transports were asked.
    pub fn flush(&self) -> Result<()> {
        let mut first_error = None;
        let mut transports = self.core.transports.write();
        for transport in transports.iter_mut() {
            if let Err(e) = transport.flush() {
                eprintln!(
                    "[LOGGER ERROR] Transport '{}' flush failed: {}",
                    transport.name(),
                    e
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drain dedup windows, destroy all transports, and stop background
    /// work. Idempotent.
    pub fn destroy(&self) -> Result<()> {
        if let Some(sampler) = &self.sampler {
            sampler.destroy();
        }
        self.core.destroy()
    }
}

// Manual impl: trait-object fields (sampler, transports) have no Debug
impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("namespace", &self.namespace)
            .field("enabled", &self.enabled)
            .field("min_level", &self.min_level)
            .field("runtime", &self.runtime)
            .field("sampler", &self.sampler.is_some())
            .field("sanitize", &self.sanitize_rules.is_some())
            .field("dedup_window", &self.dedup_window)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a Logger with a fluent API
///
/// # Example
///
/// ```
/// use obslog::core::{Logger, LogLevel, SanitizePreset};
/// use std::time::Duration;
///
/// let logger = Logger::builder()
///     .min_level(LogLevel::Debug)
///     .sanitize(SanitizePreset::Hipaa)
///     .dedup_window(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// ```
pub struct LoggerBuilder {
    namespace: Option<String>,
    enabled: bool,
    min_level: LogLevel,
    runtime: Runtime,
    sampler: Option<Arc<dyn Sampler>>,
    sanitize: SanitizePreset,
    dedup_window: Option<Duration>,
    transports: Vec<Box<dyn Transport>>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            namespace: None,
            enabled: true,
            min_level: LogLevel::Info,
            runtime: Runtime::default(),
            sampler: None,
            sanitize: SanitizePreset::None,
            dedup_window: None,
            transports: Vec::new(),
            metrics: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = runtime;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sanitize(mut self, preset: SanitizePreset) -> Self {
        self.sanitize = preset;
        self
    }

    /// Enable deduplication with the given window
    #[must_use = "builder methods return a new value"]
    pub fn dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = Some(window);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transports.push(Box::new(transport));
        self
    }

    /// Use a private metrics instance instead of the process-wide one
    #[must_use = "builder methods return a new value"]
    pub fn metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the Logger.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] when two transports share
    /// a name.
    pub fn build(self) -> Result<Logger> {
        let metrics = self.metrics.unwrap_or_else(metrics::global);
        let core = Arc::new(PipelineCore::new(metrics));

        let dedup = self.dedup_window.map(|window| {
            let dedup = Arc::new(Deduplicator::new(window));
            core.register_dedup(&dedup);
            dedup
        });

        let logger = Logger {
            namespace: self.namespace,
            enabled: self.enabled,
            min_level: self.min_level,
            runtime: self.runtime,
            sampler: self.sampler,
            sanitize_rules: self.sanitize.rules().map(Arc::new),
            dedup_window: self.dedup_window,
            dedup,
            core,
            children: RwLock::new(HashMap::new()),
        };

        for transport in self.transports {
            logger.add_transport(transport)?;
        }
        Ok(logger)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        // Children share the core; only the hierarchy root tears it down
        // implicitly. Explicit destroy() remains the supported path.
        if Arc::strong_count(&self.core) == 1 {
            let _ = self.core.destroy();
        }
    }
}
