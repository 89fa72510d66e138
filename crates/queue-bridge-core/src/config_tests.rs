use super::*;

fn valid_config() -> BridgeConfig {
    BridgeConfig {
        queue: QueueSettings {
            url: "https://sqs.us-east-1.amazonaws.com/000000000000/orders".to_string(),
            ..QueueSettings::default()
        },
        ..BridgeConfig::default()
    }
}

fn assert_invalid(config: &BridgeConfig, expected_key: &str) {
    match config.validate() {
        Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected_key),
        other => panic!("expected invalid {}, got {:?}", expected_key, other),
    }
}

mod defaults {
    use super::*;

    #[test]
    fn test_consumer_defaults() {
        let consumer = ConsumerConfig::default();
        assert_eq!(consumer.batch_size, 10);
        assert_eq!(consumer.wait_seconds, 20);
        assert_eq!(consumer.worker_count, 5);
        assert_eq!(consumer.handler_timeout(), Duration::from_secs(30));
        assert_eq!(consumer.max_deliveries, None);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"queue": {"url": "https://example.com/q"}}"#).unwrap();

        assert_eq!(config.provider, ProviderKind::Sqs);
        assert_eq!(config.consumer, ConsumerConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.topic.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_names() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"provider": "memory", "queue": {"url": "local"}}"#).unwrap();
        assert_eq!(config.provider, ProviderKind::Memory);
    }
}

mod validation {
    use super::*;

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_queue_url_is_missing() {
        let mut config = valid_config();
        config.queue.url = "  ".to_string();

        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRequired {
                key: "queue.url".to_string()
            })
        );
    }

    #[test]
    fn test_batch_size_bounds() {
        let mut config = valid_config();
        config.consumer.batch_size = 0;
        assert_invalid(&config, "consumer.batch_size");

        config.consumer.batch_size = 11;
        assert_invalid(&config, "consumer.batch_size");

        config.consumer.batch_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wait_seconds_bound() {
        let mut config = valid_config();
        config.consumer.wait_seconds = 21;
        assert_invalid(&config, "consumer.wait_seconds");

        config.consumer.wait_seconds = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worker_count_and_timeout_must_be_positive() {
        let mut config = valid_config();
        config.consumer.worker_count = 0;
        assert_invalid(&config, "consumer.worker_count");

        let mut config = valid_config();
        config.consumer.handler_timeout_seconds = 0;
        assert_invalid(&config, "consumer.handler_timeout_seconds");
    }

    #[test]
    fn test_zero_max_deliveries_is_invalid() {
        let mut config = valid_config();
        config.consumer.max_deliveries = Some(0);
        assert_invalid(&config, "consumer.max_deliveries");
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = valid_config();
        config.consumer.poll_backoff.initial_delay_ms = 60_000;
        assert_invalid(&config, "consumer.poll_backoff.initial_delay_ms");

        let mut config = valid_config();
        config.consumer.ack_retry.multiplier = 0.5;
        assert_invalid(&config, "consumer.ack_retry.multiplier");
    }

    #[test]
    fn test_ack_retry_must_be_bounded() {
        let mut config = valid_config();
        config.consumer.ack_retry.max_attempts = None;
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRequired {
                key: "consumer.ack_retry.max_attempts".to_string()
            })
        );
    }

    #[test]
    fn test_request_timeout_must_exceed_wait() {
        let mut config = valid_config();
        config.queue.request_timeout_seconds = 20;
        assert_invalid(&config, "queue.request_timeout_seconds");

        config.provider = ProviderKind::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dead_letter_queue_must_differ() {
        let mut config = valid_config();
        config.dead_letter.queue_url = Some(config.queue.url.clone());
        assert_invalid(&config, "dead_letter.queue_url");
    }

    #[test]
    fn test_forwarding_requires_topic_arn() {
        let mut config = valid_config();
        assert_eq!(
            config.validate_for_forwarding(),
            Err(ConfigError::MissingRequired {
                key: "topic.arn".to_string()
            })
        );

        config.topic = Some(TopicSettings {
            arn: "arn:aws:sns:us-east-1:000000000000:events".to_string(),
            ..TopicSettings::default()
        });
        assert!(config.validate_for_forwarding().is_ok());
    }
}

mod conversion {
    use super::*;

    #[test]
    fn test_topic_inherits_queue_credentials() {
        let mut queue = valid_config().queue;
        queue.credentials.access_key_id = Some("AKIA".to_string());
        let topic = TopicSettings {
            arn: " arn:aws:sns:eu-west-1:000000000000:events ".to_string(),
            ..TopicSettings::default()
        };

        let sns = topic.to_sns_config(&queue);

        assert_eq!(sns.topic_arn, "arn:aws:sns:eu-west-1:000000000000:events");
        assert_eq!(sns.credentials.access_key_id.as_deref(), Some("AKIA"));
    }

    #[test]
    fn test_backoff_to_policy() {
        let bounded = BackoffConfig {
            max_attempts: Some(2),
            ..BackoffConfig::default()
        }
        .to_policy();
        assert_eq!(bounded.max_attempts, 2);
        assert_eq!(bounded.initial_delay, Duration::from_secs(1));

        let unbounded = BackoffConfig::default().to_policy();
        assert_eq!(unbounded.max_attempts, u32::MAX);
    }
}
