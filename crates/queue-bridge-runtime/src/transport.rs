//! Transport traits implemented by every queue and topic provider.

use crate::error::TransportError;
use crate::message::{MessageId, ProviderType, ReceiptHandle, ReceivedMessage};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Point-to-point queue operations used by producers and consumers
///
/// Implementations must be safe for concurrent use: the consumption loop shares
/// a single transport between all of its dispatch workers, and acknowledgements
/// of different messages are independent of each other.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Send one message body to the queue
    ///
    /// # Arguments
    ///
    /// * `body` - Encoded message body
    /// * `routing_key` - Key used to group related messages (FIFO message group)
    /// * `dedup_key` - Token the provider uses to suppress duplicate sends
    async fn send(
        &self,
        body: Bytes,
        routing_key: &str,
        dedup_key: &str,
    ) -> Result<MessageId, TransportError>;

    /// Receive up to `max_count` messages, waiting at most `wait` for the first one
    ///
    /// An empty vector is a normal result when nothing arrived within the wait budget.
    async fn receive(
        &self,
        max_count: u32,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError>;

    /// Delete a received message so it is never redelivered
    async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<(), TransportError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}

/// Publish side of a topic (fan-out) service
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    /// Publish one message body to the topic
    ///
    /// `group_key` and `dedup_key` are only honoured by FIFO topics.
    async fn publish(
        &self,
        body: Bytes,
        group_key: &str,
        dedup_key: &str,
    ) -> Result<MessageId, TransportError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}
