//! The application event carried through the bridge.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

/// An application event: an identifier plus an arbitrary JSON payload.
///
/// The identifier is used as the routing key when the event is sent, so it
/// must be non-empty. Whitespace-only identifiers count as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Check the event is eligible to be sent or dispatched
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingIdentifier);
        }

        Ok(())
    }

    /// Key used to group related messages on the transport
    pub fn routing_key(&self) -> &str {
        &self.id
    }
}
