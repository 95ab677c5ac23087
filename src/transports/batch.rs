//! Batched, retrying delivery base
//!
//! `BatchTransport` is the common base for transports that ship entries to
//! a remote or slow sink. The caller-facing `log()` only enqueues; a
//! dedicated worker thread buffers entries and flushes when the batch size
//! is reached, when the flush interval elapses, on a manual `flush()`, and
//! on shutdown. Failed sends are retried with exponential backoff up to a
//! bounded attempt count, after which the batch is dropped and counted.
//! The pipeline never blocks or panics the caller on sink failure.
//!
//! Concrete sinks implement only [`BatchSender::send_batch`] and inherit
//! buffering and retry for free.

use crate::core::{metrics, LogEntry, PipelineError, PipelineMetrics, Result, Transport};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default shutdown grace period for flush-then-stop (5 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A sink that delivers one batch at a time.
///
/// `send_batch` may be a long-latency network operation; it is only ever
/// called from the transport's background worker thread, and it is
/// responsible for enforcing its own delivery timeout (a timeout is a
/// failure and goes through the retry policy).
pub trait BatchSender: Send {
    fn name(&self) -> &str;

    fn send_batch(&mut self, entries: &[LogEntry]) -> Result<()>;

    /// Called once after the worker drains its final batch
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Buffering and retry configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Flush when the buffer reaches this many entries
    pub batch_size: usize,
    /// Flush at least this often while entries are pending
    pub flush_interval: Duration,
    /// Retry attempts after the initial send (0 = no retries)
    pub max_retries: u32,
    /// First retry delay; doubles on every subsequent attempt
    pub initial_backoff: Duration,
    /// Bounded queue between callers and the worker; a full queue drops
    /// the entry and counts it rather than blocking the caller
    pub queue_capacity: usize,
    /// Grace period for flush-then-stop on destroy
    pub shutdown_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            queue_capacity: 1024,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

enum Command {
    Entry(Box<LogEntry>),
    Flush,
}

/// Batched transport wrapping a [`BatchSender`]
///
/// # Example
///
/// ```
/// use obslog::core::{LogEntry, Result, Transport};
/// use obslog::transports::{BatchConfig, BatchSender, BatchTransport};
///
/// struct StdoutSink;
/// impl BatchSender for StdoutSink {
///     fn name(&self) -> &str { "stdout" }
///     fn send_batch(&mut self, entries: &[LogEntry]) -> Result<()> {
///         println!("delivering {} entries", entries.len());
///         Ok(())
///     }
/// }
///
/// let mut transport = BatchTransport::new(Box::new(StdoutSink), BatchConfig::default());
/// transport.destroy().unwrap();
/// ```
pub struct BatchTransport {
    name: String,
    sender: Option<Sender<Command>>,
    worker: Option<thread::JoinHandle<()>>,
    shutdown_timeout: Duration,
    metrics: Arc<PipelineMetrics>,
}

impl BatchTransport {
    pub fn new(sink: Box<dyn BatchSender>, config: BatchConfig) -> Self {
        Self::with_metrics(sink, config, metrics::global())
    }

    /// Construct with a private metrics instance (used by tests)
    pub fn with_metrics(
        mut sink: Box<dyn BatchSender>,
        config: BatchConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let name = sink.name().to_string();
        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        let worker_metrics = Arc::clone(&metrics);
        let worker_config = config.clone();
        let worker_name = name.clone();

        let worker = thread::Builder::new()
            .name(format!("obslog-{}", name))
            .spawn(move || {
                Self::run_worker(
                    &mut *sink,
                    &receiver,
                    &worker_config,
                    &worker_metrics,
                    &worker_name,
                );
            })
            .expect("failed to spawn transport worker thread");

        Self {
            name,
            sender: Some(sender),
            worker: Some(worker),
            shutdown_timeout: config.shutdown_timeout,
            metrics,
        }
    }

    fn run_worker(
        sink: &mut dyn BatchSender,
        receiver: &Receiver<Command>,
        config: &BatchConfig,
        metrics: &PipelineMetrics,
        name: &str,
    ) {
        let mut buffer: Vec<LogEntry> = Vec::with_capacity(config.batch_size);
        let mut deadline = Instant::now() + config.flush_interval;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining) {
                Ok(Command::Entry(entry)) => {
                    buffer.push(*entry);
                    if buffer.len() >= config.batch_size {
                        Self::flush_buffer(sink, &mut buffer, config, metrics, name);
                        deadline = Instant::now() + config.flush_interval;
                    }
                }
                Ok(Command::Flush) => {
                    Self::flush_buffer(sink, &mut buffer, config, metrics, name);
                    deadline = Instant::now() + config.flush_interval;
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    Self::flush_buffer(sink, &mut buffer, config, metrics, name);
                    deadline = Instant::now() + config.flush_interval;
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    Self::flush_buffer(sink, &mut buffer, config, metrics, name);
                    if let Err(e) = sink.shutdown() {
                        eprintln!("[TRANSPORT ERROR] '{}' shutdown failed: {}", name, e);
                    }
                    break;
                }
            }
        }
    }

    /// Deliver the buffer with retry and backoff; the buffer is cleared
    /// whether delivery succeeds or retries are exhausted. Entries within
    /// the batch keep their enqueue order.
    fn flush_buffer(
        sink: &mut dyn BatchSender,
        buffer: &mut Vec<LogEntry>,
        config: &BatchConfig,
        metrics: &PipelineMetrics,
        name: &str,
    ) {
        if buffer.is_empty() {
            return;
        }

        let start = Instant::now();
        let mut backoff = config.initial_backoff;
        for attempt in 0..=config.max_retries {
            match sink.send_batch(buffer) {
                Ok(()) => {
                    metrics.record_flush(start.elapsed().as_millis() as u64);
                    buffer.clear();
                    return;
                }
                Err(e) => {
                    metrics.inc_transport_errors(1);
                    if attempt < config.max_retries {
                        thread::sleep(backoff);
                        backoff = backoff.saturating_mul(2);
                    } else {
                        eprintln!(
                            "[TRANSPORT ERROR] '{}' dropped {} entries after {} attempts: {}",
                            name,
                            buffer.len(),
                            config.max_retries + 1,
                            e
                        );
                    }
                }
            }
        }

        metrics.inc_dropped(buffer.len() as u64);
        buffer.clear();
    }
}

impl Transport for BatchTransport {
    fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue only; never blocks. A full queue drops the entry and counts
    /// it in the `dropped` metric.
    fn log(&mut self, entry: &LogEntry) -> Result<()> {
        let Some(sender) = &self.sender else {
            return Err(PipelineError::Shutdown);
        };
        match sender.try_send(Command::Entry(Box::new(entry.clone()))) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.metrics.inc_dropped(1);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(PipelineError::Shutdown),
        }
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(sender) = &self.sender {
            // Best effort: a full queue already guarantees an imminent flush
            let _ = sender.try_send(Command::Flush);
        }
        Ok(())
    }

    /// Flush-then-stop within the configured grace period. Idempotent.
    fn destroy(&mut self) -> Result<()> {
        drop(self.sender.take());

        if let Some(worker) = self.worker.take() {
            let start = Instant::now();
            loop {
                if worker.is_finished() {
                    if worker.join().is_err() {
                        eprintln!(
                            "[TRANSPORT ERROR] '{}' worker panicked during shutdown",
                            self.name
                        );
                    }
                    break;
                }
                if start.elapsed() >= self.shutdown_timeout {
                    eprintln!(
                        "[TRANSPORT WARNING] '{}' did not drain within {:?}; pending entries discarded",
                        self.name, self.shutdown_timeout
                    );
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
        Ok(())
    }
}

impl Drop for BatchTransport {
    fn drop(&mut self) {
        let _ = self.destroy();
    }
}
