//! Error types for queue facade operations.

use chrono::Duration;
use thiserror::Error;

/// Comprehensive error type for all facade operations
///
/// The type is `Clone` so a single provisioning failure can be cached and
/// handed to every caller that resolves the connection.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("Invalid argument '{field}': {message}")]
    InvalidArgument { field: String, message: String },

    #[error("Queue provisioning failed: {message}")]
    ProvisioningFailed { message: String },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Extension '{extension}' failed: {message}")]
    ExtensionFailed { extension: String, message: String },

    #[error("Subscription could not be attached: {message}")]
    SubscriptionFailed { message: String },

    #[error("A message handler is already attached to queue '{queue_name}'")]
    HandlerAlreadyAttached { queue_name: String },

    #[error("Provider error ({provider}): {code} - {message}")]
    ProviderError {
        provider: String,
        code: String,
        message: String,
    },

    #[error("Queue client has been disposed")]
    Disposed,

    #[error("Serialization failed: {0}")]
    SerializationError(#[from] SerializationError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

impl QueueError {
    /// Check if error is transient and the caller may retry the operation
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidArgument { .. } => false,
            // Provisioning failures are cached for the life of the client
            Self::ProvisioningFailed { .. } => false,
            Self::QueueNotFound { .. } => false,
            Self::ConnectionFailed { .. } => true,
            Self::ExtensionFailed { .. } => false,
            Self::SubscriptionFailed { .. } => false,
            Self::HandlerAlreadyAttached { .. } => false,
            Self::ProviderError { .. } => true,
            Self::Disposed => false,
            Self::SerializationError(_) => false,
            Self::ConfigurationError(_) => false,
            Self::ValidationError(_) => false,
        }
    }

    /// Check if error should be retried by the caller's own retry policy
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }

    /// Get suggested retry delay
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ConnectionFailed { .. } => Some(Duration::seconds(5)),
            Self::ProviderError { .. } => Some(Duration::seconds(1)),
            _ => None,
        }
    }

    pub(crate) fn invalid_argument(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Errors during message serialization/deserialization
#[derive(Debug, Clone, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {message}")]
    Json { message: String },

    #[error("Unsupported content type '{content_type}' (expected '{expected}')")]
    UnsupportedContentType {
        content_type: String,
        expected: String,
    },

    #[error("Message body is empty")]
    EmptyBody,
}

impl From<serde_json::Error> for SerializationError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json {
            message: error.to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
