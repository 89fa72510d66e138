//! Bridge configuration: queue binding, consumer tuning, topic, dead-letter
//! queue and logging.
//!
//! Every section has defaults so a configuration only needs `queue.url`.
//! Call [`BridgeConfig::validate`] after loading.

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use queue_bridge_runtime::{AwsAuthConfig, InMemoryConfig, SnsConfig, SqsConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Longest wait a single receive may use (SQS long-poll limit)
pub const MAX_WAIT_SECONDS: u64 = 20;

/// Largest batch a single receive may request (SQS limit)
pub const MAX_BATCH_SIZE: u32 = 10;

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub provider: ProviderKind,
    pub queue: QueueSettings,
    pub consumer: ConsumerConfig,
    /// Required by the forwarding consumer only
    pub topic: Option<TopicSettings>,
    pub dead_letter: DeadLetterSettings,
    pub logging: LoggingConfig,
    /// Settings for the in-memory provider
    pub memory: InMemoryConfig,
}

impl BridgeConfig {
    /// Check everything the producer and plain consumer need
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.url.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "queue.url".to_string(),
            });
        }

        if let Some(url) = &self.dead_letter.queue_url {
            if url.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "dead_letter.queue_url",
                    "must not be empty when set",
                ));
            }
            if url.trim() == self.queue.url.trim() {
                return Err(ConfigError::invalid(
                    "dead_letter.queue_url",
                    "must differ from queue.url",
                ));
            }
        }

        if self.provider == ProviderKind::Sqs
            && self.queue.request_timeout_seconds <= self.consumer.wait_seconds
        {
            return Err(ConfigError::invalid(
                "queue.request_timeout_seconds",
                format!(
                    "must exceed consumer.wait_seconds ({})",
                    self.consumer.wait_seconds
                ),
            ));
        }

        self.consumer.validate()
    }

    /// [`validate`](Self::validate) plus the topic binding
    pub fn validate_for_forwarding(&self) -> Result<(), ConfigError> {
        self.validate()?;

        match &self.topic {
            Some(topic) if !topic.arn.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::MissingRequired {
                key: "topic.arn".to_string(),
            }),
        }
    }
}

/// Which transport implementation backs the queue and topic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Sqs,
    /// Process-local queue and topic. Nothing survives the process and no
    /// other process can see them, so from the CLI this is a dry run.
    Memory,
}

/// The queue the bridge sends to and consumes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub url: String,
    /// Derived from the queue URL when empty
    pub region: String,
    pub credentials: AwsAuthConfig,
    pub request_timeout_seconds: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            region: String::new(),
            credentials: AwsAuthConfig::default(),
            request_timeout_seconds: 30,
        }
    }
}

impl QueueSettings {
    pub fn to_sqs_config(&self) -> SqsConfig {
        self.sqs_config_for(&self.url)
    }

    /// SQS binding for another queue sharing this queue's region and credentials
    pub fn sqs_config_for(&self, queue_url: &str) -> SqsConfig {
        SqsConfig {
            queue_url: queue_url.trim().to_string(),
            region: self.region.clone(),
            credentials: self.credentials.clone(),
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }
}

/// Topic the forwarding consumer publishes to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicSettings {
    pub arn: String,
    /// Derived from the ARN when empty
    pub region: String,
    /// Endpoint override, e.g. for a local emulator
    pub endpoint: Option<String>,
    /// Falls back to the queue credentials when unset
    pub credentials: Option<AwsAuthConfig>,
}

impl TopicSettings {
    pub fn to_sns_config(&self, queue: &QueueSettings) -> SnsConfig {
        SnsConfig {
            topic_arn: self.arn.trim().to_string(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            credentials: self
                .credentials
                .clone()
                .unwrap_or_else(|| queue.credentials.clone()),
            request_timeout_seconds: queue.request_timeout_seconds,
        }
    }
}

/// Optional queue that receives the raw body of dead-lettered messages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadLetterSettings {
    pub queue_url: Option<String>,
}

/// Consumption loop tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Messages requested per poll (1..=10)
    pub batch_size: u32,

    /// Long-poll wait per receive (0..=20)
    pub wait_seconds: u64,

    /// Concurrent handler invocations
    pub worker_count: usize,

    pub handler_timeout_seconds: u64,

    /// Dead-letter a message once it has been delivered this many times
    /// and still fails retryably
    pub max_deliveries: Option<u32>,

    /// Spacing between polls after receive failures
    pub poll_backoff: BackoffConfig,

    /// Retries for failed acknowledgements
    pub ack_retry: BackoffConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            wait_seconds: MAX_WAIT_SECONDS,
            worker_count: 5,
            handler_timeout_seconds: 30,
            max_deliveries: None,
            poll_backoff: BackoffConfig {
                initial_delay_ms: 1_000,
                max_delay_ms: 30_000,
                multiplier: 2.0,
                max_attempts: None,
            },
            ack_retry: BackoffConfig {
                initial_delay_ms: 200,
                max_delay_ms: 2_000,
                multiplier: 2.0,
                max_attempts: Some(3),
            },
        }
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(ConfigError::invalid(
                "consumer.batch_size",
                format!("must be between 1 and {}", MAX_BATCH_SIZE),
            ));
        }

        if self.wait_seconds > MAX_WAIT_SECONDS {
            return Err(ConfigError::invalid(
                "consumer.wait_seconds",
                format!("must be at most {}", MAX_WAIT_SECONDS),
            ));
        }

        if self.worker_count == 0 {
            return Err(ConfigError::invalid(
                "consumer.worker_count",
                "must be at least 1",
            ));
        }

        if self.handler_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "consumer.handler_timeout_seconds",
                "must be at least 1",
            ));
        }

        if self.max_deliveries == Some(0) {
            return Err(ConfigError::invalid(
                "consumer.max_deliveries",
                "must be at least 1 when set",
            ));
        }

        // Acknowledgement retries must stop before the receipt expires
        if self.ack_retry.max_attempts.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "consumer.ack_retry.max_attempts".to_string(),
            });
        }

        self.poll_backoff.validate("consumer.poll_backoff")?;
        self.ack_retry.validate("consumer.ack_retry")
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_seconds)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_seconds)
    }
}

/// Serializable form of a [`RetryPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Retries before giving up; unlimited when unset
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl BackoffConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ConfigError::invalid(
                &format!("{}.initial_delay_ms", section),
                "must not exceed max_delay_ms",
            ));
        }

        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::invalid(
                &format!("{}.multiplier", section),
                "must be a finite number of at least 1.0",
            ));
        }

        Ok(())
    }

    pub fn to_policy(&self) -> RetryPolicy {
        let initial = Duration::from_millis(self.initial_delay_ms);
        let max = Duration::from_millis(self.max_delay_ms);
        match self.max_attempts {
            Some(attempts) => RetryPolicy::new(attempts, initial, max, self.multiplier),
            None => RetryPolicy::unbounded(initial, max, self.multiplier),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON records instead of text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
