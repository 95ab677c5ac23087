//! Correlation context and its execution-scoped carrier
//!
//! This module provides:
//! - `CorrelationContext`: immutable identifiers carried through a call chain
//! - `ContextScope`: RAII guard installing a context for the current scope
//! - `current_context()`: ambient lookup with graceful degradation
//!
//! A context is established at a trust boundary (process entry, request
//! arrival), propagated implicitly for the duration of that chain, and
//! discarded when the scope guard drops. Child scopes derive *new* context
//! values; a parent's context is never mutated.

use super::trace_context::{parse_traceparent, TraceState};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<CorrelationContext>> = const { RefCell::new(Vec::new()) };
}

// Process-wide fallback for callers outside any scoped chain. This is an
// explicit degradation path, not the propagation mechanism itself.
static GLOBAL_CONTEXT: Lazy<RwLock<Option<CorrelationContext>>> = Lazy::new(|| RwLock::new(None));

/// Generate `len` lowercase hex characters
fn random_hex(len: usize) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..len).map(|_| HEX[rng.gen_range(0..16)] as char).collect()
}

/// Propagated identifiers for a logical call chain
///
/// Immutable once created. `trace_id`/`span_id` are W3C-compatible lowercase
/// hex when present; `request_id` is always populated (generated when not
/// supplied by the caller).
///
/// # Example
///
/// ```
/// use obslog::core::CorrelationContext;
///
/// let ctx = CorrelationContext::new();
/// let child = ctx.child();
/// assert_eq!(child.request_id, ctx.request_id);
/// assert_ne!(child.span_id, ctx.span_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationContext {
    /// Request id, generated as a uuid v4 when absent at creation
    pub request_id: String,

    /// W3C trace id (32 lowercase hex chars)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// W3C span id (16 lowercase hex chars)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,

    /// Vendor key/value list propagated alongside the trace id
    #[serde(default, skip_serializing_if = "TraceState::is_empty")]
    pub tracestate: TraceState,
}

impl CorrelationContext {
    /// Create a fresh context with a generated request id and a new
    /// trace/span pair
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            trace_id: Some(random_hex(32)),
            span_id: Some(random_hex(16)),
            tracestate: TraceState::new(),
        }
    }

    /// Create a context carrying only a request id (no active trace)
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            trace_id: None,
            span_id: None,
            tracestate: TraceState::new(),
        }
    }

    /// Build a context from incoming `traceparent`/`tracestate` headers.
    ///
    /// A malformed traceparent yields a fresh trace rather than an error;
    /// the tracestate parser skips malformed members on its own.
    pub fn from_headers(traceparent: Option<&str>, tracestate: Option<&str>) -> Self {
        let parsed = traceparent.and_then(parse_traceparent);
        let (trace_id, span_id) = match parsed {
            Some((t, s)) => (Some(t), Some(s)),
            None => (Some(random_hex(32)), Some(random_hex(16))),
        };
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            trace_id,
            span_id,
            tracestate: tracestate.map(TraceState::parse).unwrap_or_default(),
        }
    }

    /// Derive a child context: shares the request id, trace id, and
    /// tracestate, with a fresh span id. The parent value is untouched.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            trace_id: self.trace_id.clone().or_else(|| Some(random_hex(32))),
            span_id: Some(random_hex(16)),
            tracestate: self.tracestate.clone(),
        }
    }

    /// Return a copy with the given tracestate (builder-style)
    #[must_use]
    pub fn with_tracestate(mut self, tracestate: TraceState) -> Self {
        self.tracestate = tracestate;
        self
    }

    /// Render the `traceparent` header for outgoing propagation, if this
    /// context carries an active trace
    pub fn to_traceparent(&self) -> Option<String> {
        match (&self.trace_id, &self.span_id) {
            (Some(t), Some(s)) => Some(format!("00-{}-{}-01", t, s)),
            _ => None,
        }
    }
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard installing a context for the current execution scope
///
/// The context is visible to `current_context()` from the same thread until
/// the guard drops. Scopes nest; the innermost wins.
///
/// # Example
///
/// ```
/// use obslog::core::{current_context, ContextScope, CorrelationContext};
///
/// let ctx = CorrelationContext::new();
/// {
///     let _scope = ContextScope::enter(ctx.clone());
///     assert_eq!(current_context().unwrap().request_id, ctx.request_id);
/// }
/// // Scope dropped: context no longer ambient
/// ```
pub struct ContextScope {
    _private: (),
}

impl ContextScope {
    /// Push a context onto the current thread's scope stack
    pub fn enter(context: CorrelationContext) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(context));
        Self { _private: () }
    }

    /// Enter a child scope derived from the current ambient context,
    /// or a fresh context when none is active
    pub fn enter_child() -> Self {
        let child = current_context()
            .map(|ctx| ctx.child())
            .unwrap_or_default();
        Self::enter(child)
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Read the ambient correlation context.
///
/// Resolution order: innermost thread-scoped context, then the explicitly
/// installed process-wide context, then `None`.
pub fn current_context() -> Option<CorrelationContext> {
    let scoped = CONTEXT_STACK.with(|stack| stack.borrow().last().cloned());
    scoped.or_else(|| GLOBAL_CONTEXT.read().clone())
}

/// Install a process-wide fallback context, returning the previous one.
///
/// Intended for hosts without scoped propagation (single-request edge
/// environments); scoped contexts always take priority.
pub fn set_global_context(context: CorrelationContext) -> Option<CorrelationContext> {
    GLOBAL_CONTEXT.write().replace(context)
}

/// Remove the process-wide fallback context
pub fn clear_global_context() -> Option<CorrelationContext> {
    GLOBAL_CONTEXT.write().take()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_generates_ids() {
        let ctx = CorrelationContext::new();
        assert!(!ctx.request_id.is_empty());
        assert_eq!(ctx.trace_id.as_ref().unwrap().len(), 32);
        assert_eq!(ctx.span_id.as_ref().unwrap().len(), 16);
    }

    #[test]
    fn test_child_shares_trace_fresh_span() {
        let parent = CorrelationContext::new();
        let child = parent.child();
        assert_eq!(child.request_id, parent.request_id);
        assert_eq!(child.trace_id, parent.trace_id);
        assert_ne!(child.span_id, parent.span_id);
    }

    #[test]
    fn test_child_fills_unset_trace_id() {
        let parent = CorrelationContext::with_request_id("req-1");
        assert!(parent.trace_id.is_none());
        let child = parent.child();
        assert!(child.trace_id.is_some());
        // The parent value is never mutated
        assert!(parent.trace_id.is_none());
    }

    #[test]
    fn test_from_headers_valid() {
        let ctx = CorrelationContext::from_headers(
            Some("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"),
            Some("congo=t61rcWkgMzE"),
        );
        assert_eq!(
            ctx.trace_id.as_deref(),
            Some("0af7651916cd43dd8448eb211c80319c")
        );
        assert_eq!(ctx.span_id.as_deref(), Some("b7ad6b7169203331"));
        assert_eq!(ctx.tracestate.get("congo"), Some("t61rcWkgMzE"));
    }

    #[test]
    fn test_from_headers_malformed_starts_fresh_trace() {
        let ctx = CorrelationContext::from_headers(Some("garbage"), None);
        assert!(ctx.trace_id.is_some());
        assert!(ctx.span_id.is_some());
    }

    #[test]
    fn test_to_traceparent() {
        let ctx = CorrelationContext::from_headers(
            Some("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"),
            None,
        );
        assert_eq!(
            ctx.to_traceparent().unwrap(),
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
        );
        assert!(CorrelationContext::with_request_id("r").to_traceparent().is_none());
    }

    #[test]
    fn test_scope_stack_nesting() {
        let outer = CorrelationContext::with_request_id("outer");
        let inner = CorrelationContext::with_request_id("inner");

        let _outer_scope = ContextScope::enter(outer);
        assert_eq!(current_context().unwrap().request_id, "outer");
        {
            let _inner_scope = ContextScope::enter(inner);
            assert_eq!(current_context().unwrap().request_id, "inner");
        }
        assert_eq!(current_context().unwrap().request_id, "outer");
    }

    #[test]
    fn test_enter_child_scope() {
        let root = CorrelationContext::new();
        let _root_scope = ContextScope::enter(root.clone());
        {
            let _child_scope = ContextScope::enter_child();
            let ambient = current_context().unwrap();
            assert_eq!(ambient.request_id, root.request_id);
            assert_ne!(ambient.span_id, root.span_id);
        }
    }

    #[test]
    fn test_scoped_context_is_thread_local() {
        let _scope = ContextScope::enter(CorrelationContext::with_request_id("main-thread"));
        let seen = std::thread::spawn(|| {
            // No scope and no global set on this thread path
            CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
        })
        .join()
        .unwrap();
        assert!(seen.is_none());
    }
}
