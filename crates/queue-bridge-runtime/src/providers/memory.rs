//! In-memory queue and topic providers for testing and development.
//!
//! This module provides a fully functional in-memory queue that:
//! - Hides received messages for a visibility timeout, then redelivers them
//! - Counts deliveries and issues a fresh receipt handle per delivery
//! - Suppresses sends with a repeated dedup key inside the dedup window
//! - Wakes long-polling receivers as soon as a message arrives
//!
//! The topic provider records every publish and fans it out to any
//! subscribed in-memory queues.

use crate::error::TransportError;
use crate::message::{MessageId, ProviderType, ReceiptHandle, ReceivedMessage};
use crate::provider::InMemoryConfig;
use crate::transport::{QueueTransport, TopicPublisher};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Upper bound on a single sleep while long-polling, so messages whose
/// visibility timeout lapses are picked up without a send to wake us
const POLL_SLICE: Duration = Duration::from_millis(50);

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    group_id: String,
    delivery_count: u32,
}

/// A message currently hidden from receivers
struct InFlightMessage {
    message: StoredMessage,
    visible_at: Instant,
}

/// Internal queue state
#[derive(Default)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<String, InFlightMessage>,
    dedup: HashMap<String, (MessageId, Instant)>,
    acknowledged: usize,
}

impl QueueState {
    /// Move messages whose visibility timeout has lapsed back to the ready queue
    fn release_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, m)| m.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in expired {
            if let Some(in_flight) = self.in_flight.remove(&receipt) {
                self.ready.push_back(in_flight.message);
            }
        }
    }

    fn prune_dedup(&mut self, now: Instant, window: Duration) {
        self.dedup
            .retain(|_, (_, sent_at)| now.saturating_duration_since(*sent_at) < window);
    }
}

// ============================================================================
// InMemoryTransport
// ============================================================================

/// In-memory queue transport
pub struct InMemoryTransport {
    state: Mutex<QueueState>,
    notify: Notify,
    config: InMemoryConfig,
}

impl InMemoryTransport {
    /// Create new in-memory queue with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            config,
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Messages waiting to be received, including ones whose visibility lapsed
    pub fn pending_count(&self) -> usize {
        let mut state = self.state();
        state.release_expired(Instant::now());
        state.ready.len()
    }

    /// Messages received but neither acknowledged nor visible again
    pub fn in_flight_count(&self) -> usize {
        let mut state = self.state();
        state.release_expired(Instant::now());
        state.in_flight.len()
    }

    /// Total successful acknowledgements
    pub fn acknowledged_count(&self) -> usize {
        self.state().acknowledged
    }

    fn take_visible(&self, max_count: u32) -> Vec<ReceivedMessage> {
        let now = Instant::now();
        let visible_at = now + self.config.visibility_timeout();
        let mut state = self.state();
        state.release_expired(now);

        let mut batch = Vec::new();
        while batch.len() < max_count as usize {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };
            message.delivery_count += 1;

            let receipt = uuid::Uuid::new_v4().to_string();
            batch.push(ReceivedMessage {
                message_id: message.message_id.clone(),
                body: message.body.clone(),
                receipt_handle: ReceiptHandle::new(receipt.clone(), ProviderType::InMemory),
                delivery_count: message.delivery_count,
                group_id: Some(message.group_id.clone()),
            });
            state.in_flight.insert(
                receipt,
                InFlightMessage {
                    message,
                    visible_at,
                },
            );
        }

        batch
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn send(
        &self,
        body: Bytes,
        routing_key: &str,
        dedup_key: &str,
    ) -> Result<MessageId, TransportError> {
        let max_size = ProviderType::InMemory.max_message_size();
        if body.len() > max_size {
            return Err(TransportError::MessageTooLarge {
                size: body.len(),
                max_size,
            });
        }

        let now = Instant::now();
        let message_id = {
            let mut state = self.state();
            state.prune_dedup(now, self.config.dedup_window());

            if !dedup_key.is_empty() {
                if let Some((existing, _)) = state.dedup.get(dedup_key) {
                    return Ok(existing.clone());
                }
            }

            if state.ready.len() + state.in_flight.len() >= self.config.max_queue_size {
                return Err(TransportError::Throttled {
                    message: format!("queue full ({} messages)", self.config.max_queue_size),
                });
            }

            let message_id = MessageId::new();
            if !dedup_key.is_empty() {
                state
                    .dedup
                    .insert(dedup_key.to_string(), (message_id.clone(), now));
            }
            state.ready.push_back(StoredMessage {
                message_id: message_id.clone(),
                body,
                group_id: routing_key.to_string(),
                delivery_count: 0,
            });
            message_id
        };

        self.notify.notify_waiters();
        Ok(message_id)
    }

    async fn receive(
        &self,
        max_count: u32,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let max_count = max_count.clamp(1, ProviderType::InMemory.max_batch_size());
        let deadline = Instant::now() + wait;

        loop {
            // Register interest before checking so a concurrent send cannot be missed
            let notified = self.notify.notified();

            let batch = self.take_visible(max_count);
            let now = Instant::now();
            if !batch.is_empty() || now >= deadline {
                return Ok(batch);
            }

            let slice = (deadline - now).min(POLL_SLICE);
            let _ = tokio::time::timeout(slice, notified).await;
        }
    }

    async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<(), TransportError> {
        let mut state = self.state();
        match state.in_flight.remove(receipt.handle()) {
            Some(_) => {
                state.acknowledged += 1;
                Ok(())
            }
            None => Err(TransportError::ReceiptNotFound {
                receipt: receipt.handle().to_string(),
            }),
        }
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}

// ============================================================================
// InMemoryTopic
// ============================================================================

/// A message recorded by [`InMemoryTopic`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub message_id: MessageId,
    pub body: Bytes,
    pub group_key: String,
    pub dedup_key: String,
}

/// In-memory topic that records publishes and fans them out to subscribed queues
#[derive(Default)]
pub struct InMemoryTopic {
    published: Mutex<Vec<PublishedMessage>>,
    subscribers: Vec<Arc<InMemoryTransport>>,
}

impl InMemoryTopic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every published message to `queue` as well
    pub fn with_subscriber(mut self, queue: Arc<InMemoryTransport>) -> Self {
        self.subscribers.push(queue);
        self
    }

    /// Snapshot of everything published so far
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TopicPublisher for InMemoryTopic {
    async fn publish(
        &self,
        body: Bytes,
        group_key: &str,
        dedup_key: &str,
    ) -> Result<MessageId, TransportError> {
        for subscriber in &self.subscribers {
            subscriber.send(body.clone(), group_key, dedup_key).await?;
        }

        let message_id = MessageId::new();
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedMessage {
                message_id: message_id.clone(),
                body,
                group_key: group_key.to_string(),
                dedup_key: dedup_key.to_string(),
            });

        Ok(message_id)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
