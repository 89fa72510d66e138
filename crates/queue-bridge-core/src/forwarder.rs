//! Handler that republishes consumed events to a topic.

use crate::codec;
use crate::event::Event;
use crate::handler::{DispatchOutcome, EventHandler};
use async_trait::async_trait;
use queue_bridge_runtime::TopicPublisher;
use std::sync::Arc;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod tests;

/// Publishes each event to a topic, grouped by event id and deduplicated by
/// content hash.
///
/// Transient publish failures leave the message for redelivery; anything
/// else (authorization, oversized or rejected messages) is permanent.
pub struct TopicForwarder {
    publisher: Arc<dyn TopicPublisher>,
}

impl TopicForwarder {
    pub fn new(publisher: Arc<dyn TopicPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl EventHandler for TopicForwarder {
    async fn handle(&self, event: &Event) -> DispatchOutcome {
        let body = match codec::encode(event) {
            Ok(body) => body,
            Err(e) => return DispatchOutcome::permanent(e.to_string()),
        };
        let dedup_token = codec::dedup_token(&body);

        match self
            .publisher
            .publish(body, event.routing_key(), &dedup_token)
            .await
        {
            Ok(published_id) => {
                debug!(
                    event_id = %event.id,
                    published_id = %published_id,
                    dedup_token = %dedup_token,
                    "Event forwarded to topic"
                );
                DispatchOutcome::Success
            }
            Err(e) => {
                warn!(
                    event_id = %event.id,
                    error_kind = e.kind(),
                    transient = e.is_transient(),
                    error = %e,
                    "Failed to forward event to topic"
                );
                if e.is_transient() {
                    DispatchOutcome::retryable(e.to_string())
                } else {
                    DispatchOutcome::permanent(e.to_string())
                }
            }
        }
    }
}
