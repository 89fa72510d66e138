//! Error types for producing, dispatching and configuring the bridge.

use queue_bridge_runtime::TransportError;
use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

/// An event is not eligible to be sent or dispatched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Event identifier is missing or empty")]
    MissingIdentifier,
}

/// Failure converting between an event and a wire body
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode message body: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Errors returned by [`EventProducer::send`](crate::EventProducer::send)
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ProducerError {
    /// Check if the send may succeed when repeated unchanged
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(error) => error.is_transient(),
            Self::Validation(_) | Self::Encoding(_) => false,
        }
    }
}

/// Why a single message could not be processed
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Message body could not be decoded: {0}")]
    DecodeFailure(#[source] CodecError),

    #[error("Decoded event is invalid: {0}")]
    InvalidEvent(#[source] ValidationError),

    #[error("Handler did not finish within {timeout:?}")]
    HandlerTimeout { timeout: Duration },

    #[error("Handler asked for redelivery: {reason}")]
    HandlerRetry { reason: String },

    #[error("Handler rejected the event: {reason}")]
    HandlerRejected { reason: String },

    #[error("Handler panicked: {reason}")]
    HandlerPanicked { reason: String },

    #[error("Delivery limit of {max_deliveries} reached: {last_error}")]
    DeliveriesExhausted {
        max_deliveries: u32,
        last_error: String,
    },
}

impl DispatchError {
    /// Whether the message should be left on the queue for redelivery
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::HandlerTimeout { .. } | Self::HandlerRetry { .. } | Self::HandlerPanicked { .. }
        )
    }

    /// Stable name used for the `error_kind` log field and dead letters
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DecodeFailure(_) => "decode_failure",
            Self::InvalidEvent(_) => "invalid_event",
            Self::HandlerTimeout { .. } => "handler_timeout",
            Self::HandlerRetry { .. } => "handler_retry",
            Self::HandlerRejected { .. } => "handler_rejected",
            Self::HandlerPanicked { .. } => "handler_panicked",
            Self::DeliveriesExhausted { .. } => "deliveries_exhausted",
        }
    }
}

/// Invalid bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
