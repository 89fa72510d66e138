//! Error types for transport operations.

use std::time::Duration;
use thiserror::Error;

/// Error type shared by every queue and topic transport operation
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Queue or topic not found: {name}")]
    NotFound { name: String },

    #[error("Receipt handle is invalid or expired: {receipt}")]
    ReceiptNotFound { receipt: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request throttled by provider: {message}")]
    Throttled { message: String },

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Message rejected: {reason}")]
    MessageRejected { reason: String },

    #[error("Provider error ({provider}): {code} - {message}")]
    ProviderError {
        provider: String,
        code: String,
        message: String,
    },

    #[error("Malformed provider response: {message}")]
    MalformedResponse { message: String },

    #[error("Invalid transport configuration: {message}")]
    Configuration { message: String },
}

impl TransportError {
    /// Check if error is transient and the operation may succeed when repeated
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotFound { .. } => false,
            Self::ReceiptNotFound { .. } => false,
            Self::Timeout { .. } => true,
            Self::ConnectionFailed { .. } => true,
            Self::AuthenticationFailed { .. } => false,
            Self::Throttled { .. } => true,
            Self::MessageTooLarge { .. } => false,
            Self::MessageRejected { .. } => false,
            Self::ProviderError { .. } => true, // Service-side 5xx and unknown codes
            Self::MalformedResponse { .. } => true,
            Self::Configuration { .. } => false,
        }
    }

    /// Short, stable name of the error variant for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ReceiptNotFound { .. } => "receipt_not_found",
            Self::Timeout { .. } => "timeout",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::Throttled { .. } => "throttled",
            Self::MessageTooLarge { .. } => "message_too_large",
            Self::MessageRejected { .. } => "message_rejected",
            Self::ProviderError { .. } => "provider_error",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Configuration { .. } => "configuration",
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
