//! Per-event handlers invoked by the consumption loop.

use crate::event::Event;
use async_trait::async_trait;
use tracing::info;

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;

/// Result of handling one event, deciding what happens to its message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Acknowledge the message
    Success,
    /// Leave the message for redelivery after its visibility timeout
    RetryableFailure { reason: String },
    /// Acknowledge and dead-letter the message
    PermanentFailure { reason: String },
}

impl DispatchOutcome {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::RetryableFailure {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::PermanentFailure {
            reason: reason.into(),
        }
    }

    /// Whether the message is removed from the queue
    pub fn acknowledges(&self) -> bool {
        !matches!(self, Self::RetryableFailure { .. })
    }
}

/// Business logic applied to each consumed event.
///
/// Handlers are called concurrently from several workers and are bounded by
/// the loop's handler timeout; a handler that overruns it is abandoned and
/// its message redelivered.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> DispatchOutcome;
}

/// Logs each event and reports success
#[derive(Debug, Default, Clone)]
pub struct LogOnlyHandler;

#[async_trait]
impl EventHandler for LogOnlyHandler {
    async fn handle(&self, event: &Event) -> DispatchOutcome {
        info!(event_id = %event.id, data = %event.data, "Processed event");
        DispatchOutcome::Success
    }
}
