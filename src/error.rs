//! Error types for the agent substrate

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the substrate
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error (network, timeout, refused, reset)
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input does not match a schema
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Value cannot be coerced to the target schema
    #[error("Coercion failed: {0}")]
    Coercion(String),

    /// The emitter's bounded queue is saturated
    #[error("Event queue is full")]
    QueueFull,

    /// No idle pool entry and no eviction candidate
    #[error("No available connections in the pool")]
    NoAvailableConnections,

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Operation not supported by this backend
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Double-init, use-before-init, or use-after-close
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// A subscriber's handler failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// Response body exceeded the read bound
    #[error("Response body exceeded {0} bytes")]
    BodyTooLarge(usize),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,
}

impl Error {
    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a new coercion error
    pub fn coercion(msg: impl Into<String>) -> Self {
        Error::Coercion(msg.into())
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Create a new unsupported-operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create a new lifecycle error
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Error::Lifecycle(msg.into())
    }

    /// Create a new handler error
    pub fn handler(msg: impl Into<String>) -> Self {
        Error::Handler(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }
}
