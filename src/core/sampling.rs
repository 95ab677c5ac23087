//! Log sampling for high-volume scenarios
//!
//! Provides composable sampling strategies behind a common
//! `should_sample(entry) -> bool` contract:
//!
//! - **Probability**: uniform random draw against a clamped rate
//! - **Rate-limit**: fixed-window counter with automatic rollover
//! - **Namespace**: per-namespace strategy routing with wildcard patterns
//! - **Composite**: level/error bypass wrapped around an inner sampler so
//!   failures are never sampled away
//!
//! # Example
//!
//! ```
//! use obslog::core::{CompositeSampler, LogEntry, LogLevel, ProbabilitySampler, Sampler};
//! use std::sync::Arc;
//!
//! let sampler = CompositeSampler::new(Arc::new(ProbabilitySampler::new(0.0)));
//!
//! // Inner sampler always rejects, but errors bypass it
//! let entry = LogEntry::new(LogLevel::Error, "boom");
//! assert!(sampler.should_sample(&entry));
//! ```

use super::log_entry::LogEntry;
use super::log_level::LogLevel;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decision contract shared by all sampling strategies
pub trait Sampler: Send + Sync {
    /// `true` if the entry should be emitted, `false` to drop it
    fn should_sample(&self, entry: &LogEntry) -> bool;

    /// Release timers or other resources; composite samplers propagate
    /// this to their children
    fn destroy(&self) {}
}

/// Samples each entry independently with probability `rate`.
///
/// The rate is clamped into `[0, 1]`; a NaN rate clamps to 0 (reject all).
#[derive(Debug)]
pub struct ProbabilitySampler {
    rate: f64,
}

impl ProbabilitySampler {
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Sampler for ProbabilitySampler {
    fn should_sample(&self, _entry: &LogEntry) -> bool {
        if self.rate >= 1.0 {
            return true;
        }
        if self.rate <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() < self.rate
    }
}

#[derive(Debug)]
struct RateWindow {
    window_start: Instant,
    count: u64,
}

/// Accepts at most `max_per_second` entries per fixed window.
///
/// The window defaults to one second; with a custom `window_ms` the budget
/// scales to `floor(max_per_second * window_ms / 1000)`. A budget of zero
/// rejects unconditionally.
#[derive(Debug)]
pub struct RateLimitSampler {
    window: Duration,
    budget: u64,
    state: Mutex<RateWindow>,
}

impl RateLimitSampler {
    pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1000);

    pub fn new(max_per_second: u64) -> Self {
        Self::with_window(max_per_second, Self::DEFAULT_WINDOW)
    }

    pub fn with_window(max_per_second: u64, window: Duration) -> Self {
        let budget = max_per_second * window.as_millis() as u64 / 1000;
        Self {
            window,
            budget,
            state: Mutex::new(RateWindow {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }
}

impl Sampler for RateLimitSampler {
    fn should_sample(&self, _entry: &LogEntry) -> bool {
        if self.budget == 0 {
            return false;
        }
        let now = Instant::now();
        let mut state = self.state.lock();
        if now.duration_since(state.window_start) >= self.window {
            state.window_start = now;
            state.count = 0;
        }
        if state.count < self.budget {
            state.count += 1;
            true
        } else {
            false
        }
    }
}

/// Match a namespace against a glob pattern where `*` matches any run of
/// characters within a dot-delimited segment (never across segments).
fn glob_matches(pattern: &str, namespace: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    let namespace_segments: Vec<&str> = namespace.split('.').collect();
    if pattern_segments.len() != namespace_segments.len() {
        return false;
    }
    pattern_segments
        .iter()
        .zip(&namespace_segments)
        .all(|(p, s)| segment_matches(p, s))
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    // Classic wildcard match restricted to one segment
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = segment.chars().collect();
    let (mut pi, mut si) = (0, 0);
    let (mut star, mut mark) = (None, 0);
    while si < s.len() {
        if pi < p.len() && (p[pi] == s[si]) {
            pi += 1;
            si += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = si;
            pi += 1;
        } else if let Some(star_pos) = star {
            pi = star_pos + 1;
            mark += 1;
            si = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Routes the decision by the entry's namespace.
///
/// Exact-string rules always win over wildcard rules. An unmatched
/// namespace falls back to the configured default sampler; with no default
/// configured, unmatched entries are sampled unconditionally. The
/// permissive fallback is deliberate: a misspelled pattern degrades to
/// extra volume instead of silent data loss.
pub struct NamespaceSampler {
    exact: HashMap<String, Arc<dyn Sampler>>,
    wildcards: Vec<(String, Arc<dyn Sampler>)>,
    default: Option<Arc<dyn Sampler>>,
}

impl NamespaceSampler {
    pub fn new() -> Self {
        Self {
            exact: HashMap::new(),
            wildcards: Vec::new(),
            default: None,
        }
    }

    /// Add a rule; patterns containing `*` are treated as globs, everything
    /// else as an exact namespace string
    #[must_use]
    pub fn with_rule(mut self, pattern: impl Into<String>, sampler: Arc<dyn Sampler>) -> Self {
        let pattern = pattern.into();
        if pattern.contains('*') {
            self.wildcards.push((pattern, sampler));
        } else {
            self.exact.insert(pattern, sampler);
        }
        self
    }

    /// Set the fallback sampler for unmatched namespaces
    #[must_use]
    pub fn with_default(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.default = Some(sampler);
        self
    }

    fn route(&self, namespace: Option<&str>) -> Option<&Arc<dyn Sampler>> {
        let namespace = namespace?;
        if let Some(sampler) = self.exact.get(namespace) {
            return Some(sampler);
        }
        self.wildcards
            .iter()
            .find(|(pattern, _)| glob_matches(pattern, namespace))
            .map(|(_, sampler)| sampler)
    }
}

impl Default for NamespaceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for NamespaceSampler {
    fn should_sample(&self, entry: &LogEntry) -> bool {
        match self.route(entry.namespace.as_deref()) {
            Some(sampler) => sampler.should_sample(entry),
            None => match &self.default {
                Some(default) => default.should_sample(entry),
                None => true,
            },
        }
    }

    fn destroy(&self) {
        for sampler in self.exact.values() {
            sampler.destroy();
        }
        for (_, sampler) in &self.wildcards {
            sampler.destroy();
        }
        if let Some(default) = &self.default {
            default.destroy();
        }
    }
}

/// Wraps an inner sampler with a severity bypass.
///
/// Entries at or above `bypass_level` (default `Error`), or entries
/// carrying an error when `always_sample_errors` is set (default), are
/// emitted regardless of the inner decision. Everything else delegates to
/// the inner sampler.
pub struct CompositeSampler {
    inner: Arc<dyn Sampler>,
    bypass_level: LogLevel,
    always_sample_errors: bool,
}

impl CompositeSampler {
    pub fn new(inner: Arc<dyn Sampler>) -> Self {
        Self {
            inner,
            bypass_level: LogLevel::Error,
            always_sample_errors: true,
        }
    }

    #[must_use]
    pub fn with_bypass_level(mut self, level: LogLevel) -> Self {
        self.bypass_level = level;
        self
    }

    #[must_use]
    pub fn with_always_sample_errors(mut self, enabled: bool) -> Self {
        self.always_sample_errors = enabled;
        self
    }
}

impl Sampler for CompositeSampler {
    fn should_sample(&self, entry: &LogEntry) -> bool {
        if entry.level >= self.bypass_level {
            return true;
        }
        if self.always_sample_errors && entry.error.is_some() {
            return true;
        }
        self.inner.should_sample(entry)
    }

    fn destroy(&self) {
        self.inner.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_entry::ErrorInfo;

    fn entry(level: LogLevel) -> LogEntry {
        LogEntry::new(level, "test")
    }

    fn entry_ns(namespace: &str) -> LogEntry {
        LogEntry::new(LogLevel::Info, "test").with_namespace(namespace)
    }

    /// Sampler with a fixed decision, for routing tests
    struct Fixed(bool);
    impl Sampler for Fixed {
        fn should_sample(&self, _entry: &LogEntry) -> bool {
            self.0
        }
    }

    #[test]
    fn test_probability_extremes() {
        let always = ProbabilitySampler::new(1.0);
        let never = ProbabilitySampler::new(0.0);
        for _ in 0..100 {
            assert!(always.should_sample(&entry(LogLevel::Info)));
            assert!(!never.should_sample(&entry(LogLevel::Info)));
        }
    }

    #[test]
    fn test_probability_clamping() {
        assert_eq!(ProbabilitySampler::new(1.5).rate(), 1.0);
        assert_eq!(ProbabilitySampler::new(-0.5).rate(), 0.0);
        assert_eq!(ProbabilitySampler::new(f64::NAN).rate(), 0.0);
        assert!(!ProbabilitySampler::new(f64::NAN).should_sample(&entry(LogLevel::Info)));
    }

    #[test]
    fn test_probability_statistical_rate() {
        let sampler = ProbabilitySampler::new(0.5);
        let total = 10_000;
        let sampled = (0..total)
            .filter(|_| sampler.should_sample(&entry(LogLevel::Info)))
            .count();
        let rate = sampled as f64 / total as f64;
        assert!(
            (0.42..=0.58).contains(&rate),
            "Expected ~50% sample rate, got {}%",
            rate * 100.0
        );
    }

    #[test]
    fn test_rate_limit_exact_budget() {
        let sampler = RateLimitSampler::new(5);
        let mut accepted = 0;
        for _ in 0..20 {
            if sampler.should_sample(&entry(LogLevel::Info)) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 5);
    }

    #[test]
    fn test_rate_limit_window_rollover() {
        let sampler = RateLimitSampler::with_window(100, Duration::from_millis(20));
        // Budget = 100 * 20 / 1000 = 2
        assert!(sampler.should_sample(&entry(LogLevel::Info)));
        assert!(sampler.should_sample(&entry(LogLevel::Info)));
        assert!(!sampler.should_sample(&entry(LogLevel::Info)));

        std::thread::sleep(Duration::from_millis(25));
        assert!(sampler.should_sample(&entry(LogLevel::Info)));
    }

    #[test]
    fn test_rate_limit_zero_rejects_all() {
        let sampler = RateLimitSampler::new(0);
        for _ in 0..10 {
            assert!(!sampler.should_sample(&entry(LogLevel::Error)));
        }
    }

    #[test]
    fn test_glob_segment_boundaries() {
        assert!(glob_matches("api.*", "api.users"));
        assert!(!glob_matches("api.*", "api.users.create"));
        assert!(glob_matches("api.*.create", "api.users.create"));
        assert!(glob_matches("api*", "apiserver"));
        assert!(!glob_matches("api*", "api.server"));
        assert!(glob_matches("*", "anything"));
    }

    #[test]
    fn test_namespace_exact_beats_wildcard() {
        let sampler = NamespaceSampler::new()
            .with_rule("api.*", Arc::new(Fixed(false)))
            .with_rule("api.payments", Arc::new(Fixed(true)));
        assert!(sampler.should_sample(&entry_ns("api.payments")));
        assert!(!sampler.should_sample(&entry_ns("api.users")));
    }

    #[test]
    fn test_namespace_default_fallback() {
        let with_default = NamespaceSampler::new()
            .with_rule("noisy", Arc::new(Fixed(false)))
            .with_default(Arc::new(Fixed(false)));
        assert!(!with_default.should_sample(&entry_ns("unmatched")));

        // No default configured: unmatched namespaces sample unconditionally
        let permissive = NamespaceSampler::new().with_rule("noisy", Arc::new(Fixed(false)));
        assert!(permissive.should_sample(&entry_ns("unmatched")));
        // An entry without a namespace is also unmatched
        assert!(permissive.should_sample(&entry(LogLevel::Info)));
    }

    #[test]
    fn test_composite_level_bypass() {
        let sampler = CompositeSampler::new(Arc::new(Fixed(false)));
        assert!(sampler.should_sample(&entry(LogLevel::Error)));
        assert!(!sampler.should_sample(&entry(LogLevel::Warn)));
    }

    #[test]
    fn test_composite_error_bypass() {
        let sampler = CompositeSampler::new(Arc::new(Fixed(false)));
        let failing =
            entry(LogLevel::Debug).with_error(ErrorInfo::new("IoError", "disk gone"));
        assert!(sampler.should_sample(&failing));

        let no_error_bypass = CompositeSampler::new(Arc::new(Fixed(false)))
            .with_always_sample_errors(false);
        let failing =
            entry(LogLevel::Debug).with_error(ErrorInfo::new("IoError", "disk gone"));
        assert!(!no_error_bypass.should_sample(&failing));
    }

    #[test]
    fn test_composite_custom_bypass_level() {
        let sampler = CompositeSampler::new(Arc::new(Fixed(false)))
            .with_bypass_level(LogLevel::Warn);
        assert!(sampler.should_sample(&entry(LogLevel::Warn)));
        assert!(!sampler.should_sample(&entry(LogLevel::Info)));
    }

    #[test]
    fn test_composite_delegates_when_not_bypassed() {
        let sampler = CompositeSampler::new(Arc::new(Fixed(true)));
        assert!(sampler.should_sample(&entry(LogLevel::Trace)));
    }
}
