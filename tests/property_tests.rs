//! Property-based tests for obslog using proptest

use obslog::prelude::*;
use obslog::{parse_traceparent, sanitize, ProbabilitySampler, Sampler};
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// LogLevel Tests
// ============================================================================

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
    ]
}

proptest! {
    /// LogLevel string conversions roundtrip correctly
    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        let as_str = level.to_str();
        let parsed: LogLevel = as_str.parse().unwrap();
        prop_assert_eq!(level, parsed);
    }

    /// LogLevel ordering is consistent with its numeric discriminant
    #[test]
    fn test_log_level_ordering(level1 in any_level(), level2 in any_level()) {
        let val1 = level1 as u8;
        let val2 = level2 as u8;
        prop_assert_eq!(level1 <= level2, val1 <= val2);
        prop_assert_eq!(level1 < level2, val1 < val2);
    }
}

// ============================================================================
// Trace Context Tests
// ============================================================================

/// Well-formed tracestate keys per the W3C simple-key grammar
fn valid_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,14}"
}

/// Values from the safe printable subset (no comma, equals, or spaces)
fn valid_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9._~-]{1,16}"
}

fn unique_pairs(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    pairs
        .into_iter()
        .filter(|(key, _)| seen.insert(key.clone()))
        .collect()
}

proptest! {
    /// serialize → parse is the identity for well-formed tracestate lists
    #[test]
    fn test_tracestate_roundtrip(
        pairs in proptest::collection::vec((valid_key(), valid_value()), 0..32)
    ) {
        let pairs = unique_pairs(pairs);
        let header = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");

        let state = TraceState::parse(&header);
        prop_assert_eq!(state.len(), pairs.len());
        for (key, value) in &pairs {
            prop_assert_eq!(state.get(key), Some(value.as_str()));
        }
        prop_assert_eq!(state.serialize(), header);
    }

    /// The parser never panics and never yields more than the entry cap,
    /// regardless of input
    #[test]
    fn test_tracestate_parse_total(header in ".{0,512}") {
        let state = TraceState::parse(&header);
        prop_assert!(state.len() <= 32);
        // Whatever survived parsing must serialize back without panicking
        let _ = state.serialize();
    }

    /// Malformed members are skipped without affecting their neighbors
    #[test]
    fn test_tracestate_skips_malformed_member(
        good in (valid_key(), valid_value()),
        junk in "[A-Z =]{1,10}",
    ) {
        let header = format!("{}={},{}", good.0, good.1, junk);
        let state = TraceState::parse(&header);
        prop_assert_eq!(state.get(&good.0), Some(good.1.as_str()));
    }

    /// traceparent parsing never panics; a well-formed header roundtrips
    #[test]
    fn test_traceparent_parse_total(header in ".{0,128}") {
        let _ = parse_traceparent(&header);
    }

    #[test]
    fn test_traceparent_valid_roundtrip(
        trace_id in "[0-9a-f]{32}",
        span_id in "[0-9a-f]{16}",
    ) {
        // All-zero ids are invalid by definition
        prop_assume!(trace_id.chars().any(|c| c != '0'));
        prop_assume!(span_id.chars().any(|c| c != '0'));

        let header = format!("00-{}-{}-01", trace_id, span_id);
        let parsed = parse_traceparent(&header);
        prop_assert_eq!(parsed, Some((trace_id, span_id)));
    }
}

// ============================================================================
// Sanitizer Tests
// ============================================================================

/// Arbitrary JSON values, bounded in depth and width
fn any_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 @.:-]{0,40}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            proptest::collection::hash_map("[a-zA-Z_]{1,12}", inner, 0..6).prop_map(|m| {
                Value::Object(m.into_iter().collect())
            }),
        ]
    })
}

proptest! {
    /// Sanitization is idempotent: a second pass is a no-op
    #[test]
    fn test_sanitize_idempotent(value in any_json()) {
        let rules = SanitizePreset::Hipaa.rules().unwrap();
        let once = sanitize(&value, &rules);
        let twice = sanitize(&once, &rules);
        prop_assert_eq!(once, twice);
    }

    /// Sanitization never mutates its input and preserves object structure
    #[test]
    fn test_sanitize_pure_and_shape_preserving(value in any_json()) {
        let rules = SanitizePreset::Gdpr.rules().unwrap();
        let copy = value.clone();
        let out = sanitize(&value, &rules);
        prop_assert_eq!(&value, &copy);

        // Same top-level kind and, for objects, the same key set
        match (&value, &out) {
            (Value::Object(a), Value::Object(b)) => {
                let a_keys: Vec<_> = a.keys().collect();
                let b_keys: Vec<_> = b.keys().collect();
                prop_assert_eq!(a_keys, b_keys);
            }
            (Value::Array(a), Value::Array(b)) => prop_assert_eq!(a.len(), b.len()),
            (Value::String(_), Value::String(_)) => {}
            (a, b) => prop_assert_eq!(a, b),
        }
    }

    /// Email addresses never survive sanitization, wherever they appear
    #[test]
    fn test_sanitize_removes_emails(
        local in "[a-z0-9]{1,10}",
        domain in "[a-z0-9]{1,10}",
        prefix in "[a-z ]{0,10}",
    ) {
        let email = format!("{}@{}.com", local, domain);
        let rules = SanitizePreset::Hipaa.rules().unwrap();
        let out = sanitize(&json!({"body": format!("{}{}", prefix, email)}), &rules);
        prop_assert!(!out["body"].as_str().unwrap().contains(&email));
    }

    /// Values under sensitive keys are always replaced
    #[test]
    fn test_sensitive_fields_always_redacted(secret in "[ -~]{0,40}") {
        let rules = SanitizePreset::Hipaa.rules().unwrap();
        let out = sanitize(&json!({"password": secret}), &rules);
        prop_assert_eq!(&out["password"], &json!("[REDACTED]"));
    }
}

// ============================================================================
// Sampler and Entry Tests
// ============================================================================

proptest! {
    /// Rate 0 rejects everything, rate 1 accepts everything, for any level
    #[test]
    fn test_probability_sampler_extremes(level in any_level()) {
        let entry = LogEntry::new(level, "probe");
        prop_assert!(ProbabilitySampler::new(1.0).should_sample(&entry));
        prop_assert!(!ProbabilitySampler::new(0.0).should_sample(&entry));
    }

    /// Out-of-range rates clamp rather than misbehave
    #[test]
    fn test_probability_rate_clamped(rate in any::<f64>()) {
        let sampler = ProbabilitySampler::new(rate);
        prop_assert!((0.0..=1.0).contains(&sampler.rate()));
    }

    /// Entries survive a JSON roundtrip with control characters escaped
    #[test]
    fn test_entry_json_roundtrip(
        message in ".{0,80}",
        level in any_level(),
        namespace in "[a-z.]{1,20}",
    ) {
        let entry = LogEntry::new(level, message).with_namespace(namespace.clone());
        prop_assert!(!entry.message.contains('\n'));
        prop_assert!(!entry.message.contains('\r'));

        let json = serde_json::to_string(&entry).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.level, level);
        prop_assert_eq!(back.message, entry.message);
        prop_assert_eq!(back.namespace.as_deref(), Some(namespace.as_str()));
    }
}
