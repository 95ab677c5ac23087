//! W3C trace-context wire format codec
//!
//! Implements the `tracestate` header representation: an ordered list of
//! vendor-namespaced key/value pairs propagated alongside a trace id, plus
//! a parser for the `traceparent` header.
//!
//! The parser never fails: malformed list members are skipped individually
//! and an empty or absent header parses to an empty list.
//!
//! # Example
//!
//! ```
//! use obslog::core::TraceState;
//!
//! let state = TraceState::parse("vendor1=value1,vendor2=value2");
//! assert_eq!(state.get("vendor1"), Some("value1"));
//!
//! // set() moves the updated entry to the front (most-recently-set-first)
//! let state = state.set("vendor2", "updated").unwrap();
//! assert_eq!(state.serialize(), "vendor2=updated,vendor1=value1");
//! ```

use serde::{Deserialize, Serialize};

/// Maximum number of list members carried in a tracestate header
pub const MAX_TRACESTATE_ENTRIES: usize = 32;

/// Maximum length of a tracestate key or value
pub const MAX_MEMBER_LEN: usize = 256;

/// A single `key=value` member of a tracestate list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStateEntry {
    pub key: String,
    pub value: String,
}

/// Ordered vendor key/value list, most-recently-updated-first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceState {
    entries: Vec<TraceStateEntry>,
}

/// Validate a tracestate key: `[a-z][a-z0-9_\-*/]*`, optionally in
/// `vendor@tenant` form, at most 256 characters total.
fn is_valid_key(key: &str) -> bool {
    if key.is_empty() || key.len() > MAX_MEMBER_LEN {
        return false;
    }
    let mut parts = key.splitn(2, '@');
    let first = parts.next().unwrap_or("");
    let second = parts.next();

    if !is_valid_key_part(first, false) {
        return false;
    }
    match second {
        // Tenant part may start with a digit
        Some(tenant) => is_valid_key_part(tenant, true),
        None => true,
    }
}

fn is_valid_key_part(part: &str, digit_start: bool) -> bool {
    let mut chars = part.chars();
    let lead_ok = match chars.next() {
        Some(c) => c.is_ascii_lowercase() || (digit_start && c.is_ascii_digit()),
        None => return false,
    };
    lead_ok
        && chars.all(|c| {
            c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || matches!(c, '_' | '-' | '*' | '/')
        })
}

/// Validate a tracestate value: printable ASCII excluding `,` and `=`,
/// 1..=256 characters.
fn is_valid_value(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_MEMBER_LEN
        && value
            .chars()
            .all(|c| (' '..='~').contains(&c) && c != ',' && c != '=')
}

impl TraceState {
    /// Create an empty tracestate
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a tracestate header value.
    ///
    /// Members are comma-separated `key=value` pairs. Malformed members are
    /// dropped individually; members beyond the 32-entry cap are ignored.
    /// This function never fails.
    pub fn parse(header: &str) -> Self {
        let mut entries = Vec::new();
        for raw in header.split(',') {
            if entries.len() >= MAX_TRACESTATE_ENTRIES {
                break;
            }
            let member = raw.trim();
            if member.is_empty() {
                continue;
            }
            let Some((key, value)) = member.split_once('=') else {
                continue;
            };
            if !is_valid_key(key) || !is_valid_value(value) {
                continue;
            }
            // Duplicate keys are invalid per W3C; first occurrence wins
            if entries.iter().any(|e: &TraceStateEntry| e.key == key) {
                continue;
            }
            entries.push(TraceStateEntry {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        Self { entries }
    }

    /// Serialize back to header form: comma-joined `key=value` pairs
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}={}", e.key, e.value))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Look up the value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Set a key, returning a new list with the entry at the front
    /// (most-recently-updated-first ordering).
    ///
    /// When the list would exceed 32 entries, the oldest-by-position entry
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedInput`](crate::core::PipelineError)
    /// when the key or value fails W3C validation.
    pub fn set(mut self, key: &str, value: &str) -> crate::core::Result<Self> {
        if !is_valid_key(key) {
            return Err(crate::core::PipelineError::malformed(
                "tracestate key",
                format!("'{}' is not a valid tracestate key", key),
            ));
        }
        if !is_valid_value(value) {
            return Err(crate::core::PipelineError::malformed(
                "tracestate value",
                format!("'{}' is not a valid tracestate value", value),
            ));
        }
        self.entries.retain(|e| e.key != key);
        self.entries.insert(
            0,
            TraceStateEntry {
                key: key.to_string(),
                value: value.to_string(),
            },
        );
        self.entries.truncate(MAX_TRACESTATE_ENTRIES);
        Ok(self)
    }

    /// Remove a key, returning the new list
    pub fn delete(mut self, key: &str) -> Self {
        self.entries.retain(|e| e.key != key);
        self
    }

    /// Entries in wire order
    pub fn entries(&self) -> &[TraceStateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a W3C `traceparent` header: `00-<32 hex>-<16 hex>-<2 hex>`.
///
/// Returns the trace id and parent span id on success. All-zero ids are
/// rejected per the specification. Returns `None` for any malformed input.
pub fn parse_traceparent(header: &str) -> Option<(String, String)> {
    let mut parts = header.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let span_id = parts.next()?;
    let flags = parts.next()?;

    // Version ff is explicitly invalid; future versions may carry extra
    // fields, which we tolerate only for versions > 00
    if version.len() != 2 || !is_lower_hex(version) || version == "ff" {
        return None;
    }
    if version == "00" && parts.next().is_some() {
        return None;
    }
    if trace_id.len() != 32 || !is_lower_hex(trace_id) || trace_id.bytes().all(|b| b == b'0') {
        return None;
    }
    if span_id.len() != 16 || !is_lower_hex(span_id) || span_id.bytes().all(|b| b == b'0') {
        return None;
    }
    if flags.len() != 2 || !is_lower_hex(flags) {
        return None;
    }
    Some((trace_id.to_string(), span_id.to_string()))
}

fn is_lower_hex(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
