//! Error types for the logging pipeline

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid configuration, raised synchronously at setup time
    #[error("Invalid configuration for {component}: {message}")]
    Configuration { component: String, message: String },

    /// Transport delivery failure (network/sink), recovered via retry
    #[error("Transport '{transport}' delivery failed: {message}")]
    TransportDelivery { transport: String, message: String },

    /// Malformed input (trace-context header segment, received batch entry);
    /// the offending unit is skipped, the rest of the input is processed
    #[error("Malformed {what}: {message}")]
    MalformedInput { what: String, message: String },

    /// Sanitizer recursion exceeded the depth limit; remainder is redacted
    #[error("Sanitization depth limit exceeded at depth {depth}")]
    SanitizationDepthExceeded { depth: usize },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation attempted after the pipeline was destroyed
    #[error("Pipeline already shut down")]
    Shutdown,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create a configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a transport delivery error
    pub fn transport(transport: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::TransportDelivery {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create a malformed input error
    pub fn malformed(what: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::MalformedInput {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PipelineError::Other(msg.into())
    }
}
