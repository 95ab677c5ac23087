//! Sensitive-data sanitization
//!
//! A pure function over structured values: mappings, sequences, and scalars
//! are walked recursively; mapping keys are checked against a configured
//! sensitive-field list, and string values are checked against content
//! patterns (email, credit-card, SSN, bearer-token) regardless of key name.
//!
//! Presets are data (field list + pattern list + masking strategies) looked
//! up from a table, so adding a preset is additive configuration, not code.
//! Recursion is depth-limited; anything past the limit is replaced with the
//! redaction marker rather than risking unbounded descent.
//!
//! # Example
//!
//! ```
//! use obslog::core::{sanitize, SanitizePreset};
//! use serde_json::json;
//!
//! let rules = SanitizePreset::Hipaa.rules().unwrap();
//! let clean = sanitize(&json!({"password": "hunter2", "note": "mail a@b.com"}), &rules);
//! assert_eq!(clean["password"], "[REDACTED]");
//! assert_ne!(clean["note"], "mail a@b.com");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::log_entry::Metadata;

/// Fixed replacement marker for fully redacted values
pub const REDACTED: &str = "[REDACTED]";

/// Maximum recursion depth before the remainder is redacted wholesale
pub const MAX_DEPTH: usize = 16;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static CREDIT_CARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d(?:[ -]?\d){12,18}\b").unwrap());
static SSN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/-]+=*").unwrap());

/// Content pattern applied to string values regardless of key name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentPattern {
    Email,
    CreditCard,
    Ssn,
    BearerToken,
}

impl ContentPattern {
    fn regex(self) -> &'static Regex {
        match self {
            ContentPattern::Email => &EMAIL_RE,
            ContentPattern::CreditCard => &CREDIT_CARD_RE,
            ContentPattern::Ssn => &SSN_RE,
            ContentPattern::BearerToken => &BEARER_RE,
        }
    }
}

/// How a matched value is replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskStrategy {
    /// Replace the whole value with [`REDACTED`]
    Full,
    /// Keep the first and last character, mask the middle
    Partial,
}

/// How field names are matched against the sensitive list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMatch {
    Exact,
    Substring,
}

/// Data-driven redaction ruleset
#[derive(Debug, Clone)]
pub struct RedactionRules {
    /// Sensitive field names, compared case-insensitively
    pub sensitive_fields: Vec<String>,
    pub field_match: FieldMatch,
    /// Content patterns applied to every string value
    pub patterns: Vec<ContentPattern>,
    /// Strategy for values whose key matched the sensitive list
    pub field_strategy: MaskStrategy,
    /// Strategy for content-pattern matches inside string values
    pub pattern_strategy: MaskStrategy,
}

impl RedactionRules {
    fn field_matches(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        match self.field_match {
            FieldMatch::Exact => self.sensitive_fields.iter().any(|f| f == &key),
            FieldMatch::Substring => self.sensitive_fields.iter().any(|f| key.contains(f.as_str())),
        }
    }
}

/// Built-in preset selection
///
/// Presets differ in field coverage and masking severity; `None` disables
/// sanitization entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SanitizePreset {
    #[default]
    None,
    Gdpr,
    Hipaa,
    PciDss,
}

impl SanitizePreset {
    /// Resolve the preset into its ruleset, or `None` for the no-op preset
    pub fn rules(&self) -> Option<RedactionRules> {
        fn fields(names: &[&str]) -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        }

        match self {
            SanitizePreset::None => None,
            SanitizePreset::Gdpr => Some(RedactionRules {
                sensitive_fields: fields(&[
                    "email", "name", "full_name", "phone", "address", "ip_address",
                    "location", "dob", "date_of_birth",
                ]),
                field_match: FieldMatch::Substring,
                patterns: vec![ContentPattern::Email],
                field_strategy: MaskStrategy::Full,
                pattern_strategy: MaskStrategy::Full,
            }),
            SanitizePreset::Hipaa => Some(RedactionRules {
                sensitive_fields: fields(&[
                    "password", "secret", "token", "api_key", "ssn", "social_security",
                    "mrn", "medical_record", "diagnosis", "prescription", "insurance",
                    "dob", "date_of_birth", "patient_id",
                ]),
                field_match: FieldMatch::Substring,
                patterns: vec![
                    ContentPattern::Email,
                    ContentPattern::Ssn,
                    ContentPattern::CreditCard,
                    ContentPattern::BearerToken,
                ],
                field_strategy: MaskStrategy::Full,
                pattern_strategy: MaskStrategy::Partial,
            }),
            SanitizePreset::PciDss => Some(RedactionRules {
                sensitive_fields: fields(&[
                    "password", "card_number", "cc_number", "pan", "cvv", "cvc",
                    "expiry", "account_number", "routing_number",
                ]),
                field_match: FieldMatch::Substring,
                patterns: vec![ContentPattern::CreditCard, ContentPattern::BearerToken],
                field_strategy: MaskStrategy::Full,
                pattern_strategy: MaskStrategy::Partial,
            }),
        }
    }
}

/// Partially mask a string: first and last character kept, middle replaced
/// with `***`. Already-masked input is a fixed point, so repeated
/// sanitization is stable.
fn mask_partial(s: &str) -> String {
    if s == REDACTED {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 2 {
        return REDACTED.to_string();
    }
    format!("{}***{}", chars[0], chars[chars.len() - 1])
}

fn mask_value(value: &Value, strategy: MaskStrategy) -> Value {
    match (strategy, value) {
        (MaskStrategy::Partial, Value::String(s)) => Value::String(mask_partial(s)),
        // Non-string sensitive values are always fully redacted
        _ => Value::String(REDACTED.to_string()),
    }
}

fn mask_patterns(s: &str, rules: &RedactionRules) -> Value {
    let mut out = s.to_string();
    for pattern in &rules.patterns {
        out = pattern
            .regex()
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                match rules.pattern_strategy {
                    MaskStrategy::Full => REDACTED.to_string(),
                    MaskStrategy::Partial => mask_partial(&caps[0]),
                }
            })
            .into_owned();
    }
    Value::String(out)
}

fn sanitize_at_depth(value: &Value, rules: &RedactionRules, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        // Truncate recursion: prefer false-positive redaction over descent
        return Value::String(REDACTED.to_string());
    }
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                if rules.field_matches(key) {
                    out.insert(key.clone(), mask_value(val, rules.field_strategy));
                } else {
                    out.insert(key.clone(), sanitize_at_depth(val, rules, depth + 1));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| sanitize_at_depth(v, rules, depth + 1))
                .collect(),
        ),
        Value::String(s) => mask_patterns(s, rules),
        other => other.clone(),
    }
}

/// Sanitize a structured value, returning a new structurally-equivalent
/// value. The input is never mutated; the function is idempotent.
pub fn sanitize(value: &Value, rules: &RedactionRules) -> Value {
    sanitize_at_depth(value, rules, 0)
}

/// Sanitize entry metadata in place of the untouched original
pub fn sanitize_metadata(metadata: &Metadata, rules: &RedactionRules) -> Metadata {
    match sanitize(&Value::Object(metadata.clone()), rules) {
        Value::Object(map) => map,
        _ => Metadata::new(),
    }
}
