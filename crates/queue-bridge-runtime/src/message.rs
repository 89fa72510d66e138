//! Message types exchanged with queue and topic transports.

use crate::error::TransportError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Core Identifiers
// ============================================================================

/// Identifier assigned to a message by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("message id must not be empty".to_string());
        }

        Ok(Self(s.to_string()))
    }
}

/// Longest message group id a FIFO queue or topic accepts
pub const MAX_GROUP_ID_LENGTH: usize = 128;

/// Reject group keys a FIFO queue or topic would refuse
pub(crate) fn check_group_id(group_key: &str) -> Result<(), TransportError> {
    let length = group_key.chars().count();
    if length > MAX_GROUP_ID_LENGTH {
        return Err(TransportError::MessageRejected {
            reason: format!(
                "message group id is {} characters, maximum is {}",
                length, MAX_GROUP_ID_LENGTH
            ),
        });
    }

    Ok(())
}

/// Enumeration of supported transport providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    AwsSqs,
    AwsSns,
    InMemory,
}

impl ProviderType {
    /// Maximum body size accepted by the provider
    pub fn max_message_size(&self) -> usize {
        match self {
            Self::AwsSqs => 256 * 1024,         // 256KB
            Self::AwsSns => 256 * 1024,         // 256KB
            Self::InMemory => 10 * 1024 * 1024, // 10MB
        }
    }

    /// Largest batch a single receive call may return
    pub fn max_batch_size(&self) -> u32 {
        match self {
            Self::AwsSqs => 10,
            Self::AwsSns => 1,
            Self::InMemory => 100,
        }
    }
}

// ============================================================================
// Received Messages
// ============================================================================

/// Opaque token proving the right to acknowledge one received message instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle {
    handle: String,
    provider_type: ProviderType,
}

impl ReceiptHandle {
    /// Create new receipt handle
    pub fn new(handle: String, provider_type: ProviderType) -> Self {
        Self {
            handle,
            provider_type,
        }
    }

    /// Get handle string
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Get provider type
    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.handle)
    }
}

/// A message received from a queue, awaiting acknowledgement
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub body: Bytes,
    pub receipt_handle: ReceiptHandle,
    /// Number of times this message has been handed out, including this one
    pub delivery_count: u32,
    /// Message group (FIFO queues only)
    pub group_id: Option<String>,
}

impl ReceivedMessage {
    /// Check if message has been delivered at least `max_count` times
    pub fn has_reached_delivery_count(&self, max_count: u32) -> bool {
        self.delivery_count >= max_count
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
