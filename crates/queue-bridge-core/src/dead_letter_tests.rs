use super::*;
use queue_bridge_runtime::{InMemoryTransport, TransportError};
use std::time::Duration;

fn letter(body: &'static [u8]) -> DeadLetter {
    DeadLetter::new(
        MessageId::new(),
        "decode_failure",
        "expected value at line 1 column 1",
        1,
        Bytes::from_static(body),
    )
}

mod excerpt {
    use super::*;

    #[test]
    fn test_short_body_is_kept_whole() {
        assert_eq!(body_excerpt(b"hello", 256), "hello");
    }

    #[test]
    fn test_long_body_is_cut() {
        let body = vec![b'x'; 300];
        let excerpt = body_excerpt(&body, 256);
        assert_eq!(excerpt.len(), 259);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn test_cut_respects_char_boundaries() {
        // "é" is two bytes, so byte 5 falls inside the third character
        let excerpt = body_excerpt("ééé".as_bytes(), 5);
        assert_eq!(excerpt, "éé...");
    }

    #[test]
    fn test_invalid_utf8_is_rendered_lossily() {
        let excerpt = body_excerpt(&[b'a', 0xff, b'b'], 256);
        assert_eq!(excerpt, "a\u{fffd}b");
    }
}

mod sinks {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_sink_collects_letters() {
        let sink = InMemoryDeadLetterSink::new();
        assert!(sink.is_empty());

        sink.record(letter(b"not json")).await;

        let letters = sink.letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].error_kind, "decode_failure");
        assert_eq!(letters[0].body_excerpt, "not json");
    }

    #[tokio::test]
    async fn test_logging_sink_accepts_letters() {
        LoggingDeadLetterSink.record(letter(b"{")).await;
    }

    #[tokio::test]
    async fn test_queue_sink_forwards_raw_body() {
        let queue = Arc::new(InMemoryTransport::default());
        let sink = QueueDeadLetterSink::new(queue.clone());

        sink.record(letter(b"raw body")).await;

        let batch = queue.receive(10, Duration::ZERO).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, Bytes::from_static(b"raw body"));
        assert_eq!(batch[0].group_id.as_deref(), Some("decode_failure"));
    }

    #[tokio::test]
    async fn test_queue_sink_dedups_repeated_letters() {
        let queue = Arc::new(InMemoryTransport::default());
        let sink = QueueDeadLetterSink::new(queue.clone());
        let first = letter(b"same");
        let second = first.clone();

        sink.record(first).await;
        sink.record(second).await;

        assert_eq!(queue.pending_count(), 1);
    }

    struct FailingQueue;

    #[async_trait]
    impl QueueTransport for FailingQueue {
        async fn send(
            &self,
            _body: Bytes,
            _routing_key: &str,
            _dedup_key: &str,
        ) -> Result<MessageId, TransportError> {
            Err(TransportError::ConnectionFailed {
                message: "unreachable".to_string(),
            })
        }

        async fn receive(
            &self,
            _max_count: u32,
            _wait: Duration,
        ) -> Result<Vec<queue_bridge_runtime::ReceivedMessage>, TransportError> {
            Ok(Vec::new())
        }

        async fn acknowledge(
            &self,
            _receipt: &queue_bridge_runtime::ReceiptHandle,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        fn provider_type(&self) -> queue_bridge_runtime::ProviderType {
            queue_bridge_runtime::ProviderType::InMemory
        }
    }

    #[tokio::test]
    async fn test_queue_sink_swallows_send_failures() {
        let sink = QueueDeadLetterSink::new(Arc::new(FailingQueue));
        sink.record(letter(b"lost")).await;
    }
}
