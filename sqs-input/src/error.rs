//! Error types for the SQS input

use thiserror::Error;

/// Boxed underlying cause kept in the error source chain
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// SQS input error
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Batch receive failed (transport, authentication, throttling)
    #[error("Receive error: {message}")]
    Receive {
        /// Failure description
        message: String,
        /// Underlying SDK error
        #[source]
        cause: Option<BoxError>,
    },

    /// Message delete (acknowledgment) failed
    #[error("Delete error: {message}")]
    Delete {
        /// Failure description
        message: String,
        /// Underlying SDK error
        #[source]
        cause: Option<BoxError>,
    },

    /// Downstream router rejected the event
    #[error("Emit error: {0}")]
    Emit(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Receive failure without an underlying cause
    pub fn receive(message: impl Into<String>) -> Self {
        Error::Receive {
            message: message.into(),
            cause: None,
        }
    }

    /// Delete failure without an underlying cause
    pub fn delete(message: impl Into<String>) -> Self {
        Error::Delete {
            message: message.into(),
            cause: None,
        }
    }

    /// Short class name used in cycle failure logs
    pub fn class(&self) -> &'static str {
        match self {
            Error::Config(_) => "Config",
            Error::Receive { .. } => "Receive",
            Error::Delete { .. } => "Delete",
            Error::Emit(_) => "Emit",
            Error::Serialization(_) => "Serialization",
            Error::Io(_) => "Io",
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
