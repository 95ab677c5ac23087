//! Repeated-message deduplication
//!
//! Suppresses identical messages inside a time window: the first occurrence
//! is emitted and opens the window, repeats are counted but not emitted,
//! and a closed window with suppressed repeats yields a synthetic summary
//! entry (`"[dedupe] <message> repeated N times"`).
//!
//! Window expiry is collected with [`Deduplicator::take_expired`]; the
//! logger drives this from its background sweeper and force-drains on
//! shutdown. Each deduplicator owns its window map privately.

use super::log_entry::LogEntry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Custom key derivation for deduplication
pub type DedupKeyFn = Arc<dyn Fn(&LogEntry) -> String + Send + Sync>;

struct WindowEntry {
    /// Template the summary is built from (first occurrence in the window)
    first: LogEntry,
    first_seen: Instant,
    count: u64,
}

/// Stateful filter collapsing repeated identical messages
///
/// # Example
///
/// ```
/// use obslog::core::{Deduplicator, LogEntry, LogLevel};
/// use std::time::Duration;
///
/// let dedup = Deduplicator::new(Duration::from_secs(60));
/// let entry = LogEntry::new(LogLevel::Warn, "connection lost");
/// assert!(dedup.check(&entry));   // first occurrence emits
/// assert!(!dedup.check(&entry));  // repeat suppressed
/// ```
pub struct Deduplicator {
    window: Duration,
    key_fn: Option<DedupKeyFn>,
    windows: Mutex<HashMap<String, WindowEntry>>,
}

impl Deduplicator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            key_fn: None,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the default `level + message` key derivation
    #[must_use]
    pub fn with_key_fn(mut self, key_fn: DedupKeyFn) -> Self {
        self.key_fn = Some(key_fn);
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn key_for(&self, entry: &LogEntry) -> String {
        match &self.key_fn {
            Some(f) => f(entry),
            None => format!("{}:{}", entry.level, entry.message),
        }
    }

    /// `true` if the entry should be emitted, `false` if it is a suppressed
    /// repeat within an open window.
    ///
    /// A fresh occurrence after its window was evicted restarts the cycle.
    pub fn check(&self, entry: &LogEntry) -> bool {
        let key = self.key_for(entry);
        let mut windows = self.windows.lock();
        match windows.get_mut(&key) {
            Some(existing) => {
                existing.count += 1;
                false
            }
            None => {
                windows.insert(
                    key,
                    WindowEntry {
                        first: entry.clone(),
                        first_seen: Instant::now(),
                        count: 1,
                    },
                );
                true
            }
        }
    }

    fn summary_for(entry: &WindowEntry) -> Option<LogEntry> {
        if entry.count <= 1 {
            return None;
        }
        let suppressed = entry.count - 1;
        let mut summary = LogEntry::new(
            entry.first.level,
            format!("[dedupe] {} repeated {} times", entry.first.message, suppressed),
        );
        summary.namespace = entry.first.namespace.clone();
        summary.context = entry.first.context.clone();
        summary.runtime = entry.first.runtime;
        summary
            .metadata
            .insert("suppressed".into(), serde_json::json!(suppressed));
        Some(summary)
    }

    /// Evict windows whose time has elapsed, returning summary entries for
    /// those that suppressed at least one repeat.
    pub fn take_expired(&self, now: Instant) -> Vec<LogEntry> {
        let mut windows = self.windows.lock();
        let expired: Vec<String> = windows
            .iter()
            .filter(|(_, w)| now.duration_since(w.first_seen) >= self.window)
            .map(|(k, _)| k.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|key| {
                let window = windows.remove(&key)?;
                Self::summary_for(&window)
            })
            .collect()
    }

    /// Force-close every open window, returning all pending summaries.
    /// Used on logger destroy so suppressed counts are never lost.
    pub fn drain(&self) -> Vec<LogEntry> {
        let mut windows = self.windows.lock();
        windows
            .drain()
            .filter_map(|(_, window)| Self::summary_for(&window))
            .collect()
    }

    /// Number of currently open windows
    pub fn open_windows(&self) -> usize {
        self.windows.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_level::LogLevel;

    fn entry(message: &str) -> LogEntry {
        LogEntry::new(LogLevel::Warn, message)
    }

    #[test]
    fn test_first_emits_repeats_suppressed() {
        let dedup = Deduplicator::new(Duration::from_secs(60));
        assert!(dedup.check(&entry("db down")));
        for _ in 0..4 {
            assert!(!dedup.check(&entry("db down")));
        }
        assert_eq!(dedup.open_windows(), 1);
    }

    #[test]
    fn test_distinct_keys_independent() {
        let dedup = Deduplicator::new(Duration::from_secs(60));
        assert!(dedup.check(&entry("a")));
        assert!(dedup.check(&entry("b")));
        // Same message at a different level is a different key
        assert!(dedup.check(&LogEntry::new(LogLevel::Error, "a")));
    }

    #[test]
    fn test_summary_after_window_close() {
        let dedup = Deduplicator::new(Duration::from_millis(10));
        for _ in 0..5 {
            dedup.check(&entry("flaky"));
        }
        // Window not yet expired
        assert!(dedup.take_expired(Instant::now()).is_empty());

        std::thread::sleep(Duration::from_millis(15));
        let summaries = dedup.take_expired(Instant::now());
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].message, "[dedupe] flaky repeated 4 times");
        assert_eq!(summaries[0].level, LogLevel::Warn);
        assert_eq!(summaries[0].metadata["suppressed"], 4);
        assert_eq!(dedup.open_windows(), 0);
    }

    #[test]
    fn test_no_summary_for_single_occurrence() {
        let dedup = Deduplicator::new(Duration::from_millis(5));
        dedup.check(&entry("once"));
        std::thread::sleep(Duration::from_millis(10));
        assert!(dedup.take_expired(Instant::now()).is_empty());
        // Window is evicted anyway
        assert_eq!(dedup.open_windows(), 0);
    }

    #[test]
    fn test_cycle_restarts_after_eviction() {
        let dedup = Deduplicator::new(Duration::from_millis(5));
        assert!(dedup.check(&entry("x")));
        assert!(!dedup.check(&entry("x")));
        std::thread::sleep(Duration::from_millis(10));
        let _ = dedup.take_expired(Instant::now());
        // Fresh occurrence emits again
        assert!(dedup.check(&entry("x")));
    }

    #[test]
    fn test_drain_flushes_all_windows() {
        let dedup = Deduplicator::new(Duration::from_secs(3600));
        for _ in 0..3 {
            dedup.check(&entry("a"));
        }
        dedup.check(&entry("b"));
        let summaries = dedup.drain();
        // Only "a" suppressed repeats
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].message, "[dedupe] a repeated 2 times");
        assert_eq!(dedup.open_windows(), 0);
    }

    #[test]
    fn test_custom_key_fn() {
        let dedup = Deduplicator::new(Duration::from_secs(60)).with_key_fn(Arc::new(
            |entry: &LogEntry| entry.namespace.clone().unwrap_or_default(),
        ));
        let a = entry("first").with_namespace("api");
        let b = entry("second").with_namespace("api");
        assert!(dedup.check(&a));
        // Different message, same namespace key: suppressed
        assert!(!dedup.check(&b));
    }

    #[test]
    fn test_summary_carries_namespace() {
        let dedup = Deduplicator::new(Duration::from_secs(3600));
        let e = entry("slow query").with_namespace("db.orders");
        dedup.check(&e);
        dedup.check(&e);
        let summaries = dedup.drain();
        assert_eq!(summaries[0].namespace.as_deref(), Some("db.orders"));
    }
}
