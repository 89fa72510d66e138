use super::*;
use async_trait::async_trait;
use bytes::Bytes;
use queue_bridge_runtime::{
    InMemoryTransport, ProviderType, ReceiptHandle, ReceivedMessage, TransportError,
};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

/// A send observed by [`RecordingTransport`]
#[derive(Debug, Clone)]
struct RecordedSend {
    body: Bytes,
    routing_key: String,
    dedup_key: String,
}

/// Transport that records sends and optionally fails them
#[derive(Default)]
struct RecordingTransport {
    sends: Mutex<Vec<RecordedSend>>,
    fail_with: Mutex<Option<TransportError>>,
}

impl RecordingTransport {
    fn failing(error: TransportError) -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            fail_with: Mutex::new(Some(error)),
        }
    }

    fn sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueTransport for RecordingTransport {
    async fn send(
        &self,
        body: Bytes,
        routing_key: &str,
        dedup_key: &str,
    ) -> Result<MessageId, TransportError> {
        self.sends.lock().unwrap().push(RecordedSend {
            body,
            routing_key: routing_key.to_string(),
            dedup_key: dedup_key.to_string(),
        });
        match self.fail_with.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(MessageId::new()),
        }
    }

    async fn receive(
        &self,
        _max_count: u32,
        _wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        Ok(Vec::new())
    }

    async fn acknowledge(&self, _receipt: &ReceiptHandle) -> Result<(), TransportError> {
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}

#[tokio::test]
async fn test_send_encodes_event_with_routing_and_dedup() {
    let transport = Arc::new(RecordingTransport::default());
    let producer = EventProducer::new(transport.clone());
    let event = Event::new("order-1", json!({"total": 5}));

    producer.send(&event).await.unwrap();

    let sends = transport.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].routing_key, "order-1");
    assert_eq!(codec::decode(&sends[0].body).unwrap(), event);
    assert_eq!(sends[0].dedup_key, codec::dedup_token(&sends[0].body));
}

#[tokio::test]
async fn test_empty_id_never_reaches_transport() {
    let transport = Arc::new(RecordingTransport::default());
    let producer = EventProducer::new(transport.clone());

    for id in ["", "   "] {
        let result = producer.send(&Event::new(id, json!({"x": 1}))).await;
        assert!(matches!(result, Err(ProducerError::Validation(_))));
    }

    assert!(transport.sends().is_empty());
}

#[tokio::test]
async fn test_identical_events_share_dedup_token() {
    let transport = Arc::new(RecordingTransport::default());
    let producer = EventProducer::new(transport.clone());

    producer.send(&Event::new("e", json!({"a": 1}))).await.unwrap();
    producer.send(&Event::new("e", json!({"a": 1}))).await.unwrap();
    producer.send(&Event::new("e", json!({"a": 2}))).await.unwrap();

    let sends = transport.sends();
    assert_eq!(sends[0].dedup_key, sends[1].dedup_key);
    assert_ne!(sends[0].dedup_key, sends[2].dedup_key);
}

#[tokio::test]
async fn test_transport_failure_is_returned_without_retry() {
    let transport = Arc::new(RecordingTransport::failing(TransportError::ConnectionFailed {
        message: "refused".to_string(),
    }));
    let producer = EventProducer::new(transport.clone());

    let error = producer
        .send(&Event::new("e", json!(null)))
        .await
        .unwrap_err();

    assert!(matches!(error, ProducerError::Transport(_)));
    assert!(error.is_transient());
    assert_eq!(transport.sends().len(), 1);
}

#[tokio::test]
async fn test_duplicate_send_is_suppressed_by_in_memory_queue() {
    let queue = Arc::new(InMemoryTransport::default());
    let producer = EventProducer::new(queue.clone());
    let event = Event::new("e", json!({"a": 1}));

    let first = producer.send(&event).await.unwrap();
    let second = producer.send(&event).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(queue.pending_count(), 1);
}

#[tokio::test]
async fn test_long_id_is_sent_to_in_memory_queue() {
    let queue = Arc::new(InMemoryTransport::default());
    let producer = EventProducer::new(queue.clone());

    producer
        .send(&Event::new("k".repeat(200), json!(null)))
        .await
        .unwrap();

    assert_eq!(queue.pending_count(), 1);
}
