//! AWS SNS topic publisher using the HTTP query API.

use crate::error::TransportError;
use crate::message::{check_group_id, MessageId, ProviderType};
use crate::provider::SnsConfig;
use crate::providers::signing::{first_element_text, QueryApiClient};
use crate::transport::TopicPublisher;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[cfg(test)]
#[path = "sns_tests.rs"]
mod tests;

const SNS_API_VERSION: &str = "2010-03-31";

/// AWS SNS topic publisher
///
/// FIFO topics (ARN ending in `.fifo`) receive `MessageGroupId` and
/// `MessageDeduplicationId`; standard topics ignore both keys. Group keys
/// longer than 128 characters are rejected on FIFO topics.
#[derive(Clone)]
pub struct SnsPublisher {
    client: QueryApiClient,
    config: SnsConfig,
}

impl SnsPublisher {
    /// Create new SNS publisher
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the topic ARN is empty or the region
    /// cannot be resolved.
    pub fn new(config: SnsConfig) -> Result<Self, TransportError> {
        if config.topic_arn.trim().is_empty() {
            return Err(TransportError::Configuration {
                message: "topic ARN cannot be empty".to_string(),
            });
        }

        let region = config.resolved_region()?;
        let endpoint = config.resolved_endpoint()?;
        let client = QueryApiClient::new(
            &endpoint,
            config.credentials.resolve(),
            region,
            "sns",
            "AwsSns",
            config.request_timeout(),
        )?;

        Ok(Self { client, config })
    }

    pub fn topic_arn(&self) -> &str {
        &self.config.topic_arn
    }
}

impl fmt::Debug for SnsPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnsPublisher")
            .field("topic_arn", &self.config.topic_arn)
            .finish()
    }
}

#[async_trait]
impl TopicPublisher for SnsPublisher {
    async fn publish(
        &self,
        body: Bytes,
        group_key: &str,
        dedup_key: &str,
    ) -> Result<MessageId, TransportError> {
        let max_size = ProviderType::AwsSns.max_message_size();
        if body.len() > max_size {
            return Err(TransportError::MessageTooLarge {
                size: body.len(),
                max_size,
            });
        }

        let message = String::from_utf8(body.to_vec()).map_err(|_| TransportError::MessageRejected {
            reason: "SNS messages must be valid UTF-8".to_string(),
        })?;

        if self.config.is_fifo() {
            check_group_id(group_key)?;
        }

        let mut params = BTreeMap::new();
        params.insert("Action".to_string(), "Publish".to_string());
        params.insert("Version".to_string(), SNS_API_VERSION.to_string());
        params.insert("TopicArn".to_string(), self.config.topic_arn.clone());
        params.insert("Message".to_string(), message);

        if self.config.is_fifo() {
            params.insert("MessageGroupId".to_string(), group_key.to_string());
            params.insert("MessageDeduplicationId".to_string(), dedup_key.to_string());
        }

        let response = self.client.call(&params).await?;
        let raw = first_element_text(&response, b"MessageId").ok_or_else(|| {
            TransportError::MalformedResponse {
                message: "MessageId not found in Publish response".to_string(),
            }
        })?;
        let message_id =
            MessageId::from_str(&raw).map_err(|message| TransportError::MalformedResponse { message })?;

        debug!(
            message_id = %message_id,
            topic_arn = %self.config.topic_arn,
            "SNS message published"
        );

        Ok(message_id)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsSns
    }
}
