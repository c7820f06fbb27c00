//! Error types for the scan engine

use thiserror::Error;

/// Main error type for template compilation and execution
#[derive(Debug, Error, Clone, serde::Serialize, serde::Deserialize)]
pub enum EngineError {
    #[error("Configuration error: {component} - {reason}")]
    ConfigurationError { component: String, reason: String },

    #[error("Invalid payload configuration: {reason}")]
    InvalidPayloadConfig { reason: String },

    #[error("Unknown attack type: {attack_type}")]
    UnknownAttackType { attack_type: String },

    #[error("Network error: {details}")]
    NetworkError { details: String },

    #[error("Timeout occurred: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("HTTP request failed: {details}")]
    HttpError { details: String },

    #[error("Request execution failed: {error}")]
    ExecutionFailed { error: String },

    #[error("Unresolved template variables: {names:?}")]
    UnresolvedVariables { names: Vec<String> },

    #[error("Operator compilation failed: {reason}")]
    OperatorCompile { reason: String },

    #[error("Serialization error: {error}")]
    SerializationError { error: String },
}

impl EngineError {
    /// Create a configuration error
    pub fn configuration(component: &str, reason: &str) -> Self {
        Self::ConfigurationError {
            component: component.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a transport-level error
    pub fn network(details: impl Into<String>) -> Self {
        Self::NetworkError {
            details: details.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: &str, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.to_string(),
            duration_ms,
        }
    }

    /// Create an invalid payload configuration error
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayloadConfig {
            reason: reason.into(),
        }
    }

    /// Errors that a scheduler may retry. Configuration problems never are.
    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::NetworkError { .. } => true,
            EngineError::Timeout { .. } => true,
            EngineError::HttpError { .. } => true,
            EngineError::ExecutionFailed { .. } => true,

            EngineError::ConfigurationError { .. } => false,
            EngineError::InvalidPayloadConfig { .. } => false,
            EngineError::UnknownAttackType { .. } => false,
            EngineError::UnresolvedVariables { .. } => false,
            EngineError::OperatorCompile { .. } => false,
            EngineError::SerializationError { .. } => false,
        }
    }

    /// Get error category for grouping and filtering
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::ConfigurationError { .. } => ErrorCategory::Configuration,
            EngineError::InvalidPayloadConfig { .. } => ErrorCategory::Configuration,
            EngineError::UnknownAttackType { .. } => ErrorCategory::Configuration,
            EngineError::OperatorCompile { .. } => ErrorCategory::Configuration,

            EngineError::NetworkError { .. } => ErrorCategory::Transport,
            EngineError::Timeout { .. } => ErrorCategory::Transport,
            EngineError::HttpError { .. } => ErrorCategory::Transport,

            EngineError::UnresolvedVariables { .. } => ErrorCategory::Evaluation,

            EngineError::ExecutionFailed { .. } => ErrorCategory::Runtime,
            EngineError::SerializationError { .. } => ErrorCategory::Runtime,
        }
    }
}

/// Error categories for grouping and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Evaluation,
    Runtime,
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::SerializationError {
            error: error.to_string(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => EngineError::Timeout {
                operation: "I/O operation".to_string(),
                duration_ms: 0, // Duration not available from std::io::Error
            },
            _ => EngineError::NetworkError {
                details: error.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            EngineError::Timeout {
                operation: "HTTP request".to_string(),
                duration_ms: 0,
            }
        } else if error.is_builder() {
            EngineError::configuration("http client", &error.to_string())
        } else {
            EngineError::HttpError {
                details: error.to_string(),
            }
        }
    }
}

impl From<hex::FromHexError> for EngineError {
    fn from(error: hex::FromHexError) -> Self {
        EngineError::InvalidPayloadConfig {
            reason: format!("invalid hex data: {}", error),
        }
    }
}

impl From<crate::template::RenderError> for EngineError {
    fn from(error: crate::template::RenderError) -> Self {
        match error {
            crate::template::RenderError::Unresolved { names } => EngineError::UnresolvedVariables { names },
        }
    }
}

impl From<url::ParseError> for EngineError {
    fn from(error: url::ParseError) -> Self {
        EngineError::configuration("target", &format!("invalid URL: {}", error))
    }
}

/// Result type for scan engine operations
pub type EngineResult<T> = Result<T, EngineError>;
