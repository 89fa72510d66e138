//! Event producer: validate, encode and send events to a queue.

use crate::codec;
use crate::error::ProducerError;
use crate::event::Event;
use queue_bridge_runtime::{MessageId, QueueTransport};
use std::sync::Arc;
use tracing::{error, info, warn};

#[cfg(test)]
#[path = "producer_tests.rs"]
mod tests;

/// Sends events to a queue.
///
/// No local retry: a transport failure is returned to the caller as-is,
/// with [`ProducerError::is_transient`] telling whether repeating the send
/// makes sense. Repeats are safe because the dedup token depends only on the
/// event's content.
pub struct EventProducer {
    transport: Arc<dyn QueueTransport>,
}

impl EventProducer {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    /// Send one event, returning the id the transport assigned to it
    pub async fn send(&self, event: &Event) -> Result<MessageId, ProducerError> {
        if let Err(e) = event.validate() {
            warn!(event_id = %event.id, error = %e, "Rejected event before sending");
            return Err(e.into());
        }

        let body = codec::encode(event)?;
        let dedup_token = codec::dedup_token(&body);

        match self
            .transport
            .send(body, event.routing_key(), &dedup_token)
            .await
        {
            Ok(message_id) => {
                info!(
                    message_id = %message_id,
                    event_id = %event.id,
                    dedup_token = %dedup_token,
                    "Event sent"
                );
                Ok(message_id)
            }
            Err(e) => {
                error!(
                    event_id = %event.id,
                    error_kind = e.kind(),
                    transient = e.is_transient(),
                    error = %e,
                    "Failed to send event"
                );
                Err(e.into())
            }
        }
    }
}
