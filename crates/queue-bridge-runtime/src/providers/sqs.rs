//! AWS SQS transport using the HTTP query API.
//!
//! Each transport instance is bound to one queue URL. Requests are POSTed to
//! the queue URL with their parameters in the query string and signed with
//! AWS Signature V4; responses are XML documents parsed with `quick-xml`.
//!
//! ## Queue Types
//!
//! ### Standard Queues
//! - At-least-once delivery, best-effort ordering
//! - The routing key travels as the `routing-key` message attribute
//!
//! ### FIFO Queues
//! - Queue URL ends with `.fifo`
//! - Routing key maps to `MessageGroupId`, dedup key to `MessageDeduplicationId`
//! - Routing keys longer than 128 characters are rejected before sending
//! - SQS suppresses repeated sends with the same dedup key for five minutes
//!
//! ## Limits
//!
//! - Receive batches are capped at 10 messages
//! - Long-poll waits are capped at 20 seconds
//! - Bodies must be valid UTF-8 and at most 256KB

use crate::error::TransportError;
use crate::message::{
    check_group_id, MessageId, ProviderType, ReceiptHandle, ReceivedMessage,
};
use crate::provider::SqsConfig;
use crate::providers::signing::{first_element_text, QueryApiClient};
use crate::transport::QueueTransport;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
#[path = "sqs_tests.rs"]
mod tests;

const SQS_API_VERSION: &str = "2012-11-05";
const MAX_WAIT_SECONDS: u64 = 20;

/// Message attribute carrying the routing key on standard queues
pub const ROUTING_KEY_ATTRIBUTE: &str = "routing-key";

/// AWS SQS queue transport
///
/// The transport is cheap to share: clone it or wrap it in an `Arc` and hand it
/// to any number of concurrent workers.
#[derive(Clone)]
pub struct SqsTransport {
    client: QueryApiClient,
    config: SqsConfig,
}

impl SqsTransport {
    /// Create new SQS transport
    ///
    /// # Errors
    ///
    /// Returns a configuration error if:
    /// - The queue URL is empty or not a valid URL
    /// - The region is neither configured nor derivable from the queue URL
    ///
    /// Missing credentials are not an error here; every call then fails with
    /// `AuthenticationFailed`.
    pub fn new(config: SqsConfig) -> Result<Self, TransportError> {
        if config.queue_url.trim().is_empty() {
            return Err(TransportError::Configuration {
                message: "queue URL cannot be empty".to_string(),
            });
        }

        let region = config.resolved_region()?;
        let client = QueryApiClient::new(
            &config.queue_url,
            config.credentials.resolve(),
            region,
            "sqs",
            "AwsSqs",
            config.request_timeout(),
        )?;

        Ok(Self { client, config })
    }

    /// Check if the bound queue is a FIFO queue
    pub fn is_fifo(&self) -> bool {
        self.config.is_fifo()
    }

    pub fn has_credentials(&self) -> bool {
        self.client.has_credentials()
    }

    fn base_params(action: &str) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("Action".to_string(), action.to_string());
        params.insert("Version".to_string(), SQS_API_VERSION.to_string());
        params
    }

    /// Parse SendMessage XML response
    fn parse_send_message_response(xml: &str) -> Result<MessageId, TransportError> {
        let raw = first_element_text(xml, b"MessageId").ok_or_else(|| {
            TransportError::MalformedResponse {
                message: "MessageId not found in SendMessage response".to_string(),
            }
        })?;

        MessageId::from_str(&raw).map_err(|message| TransportError::MalformedResponse { message })
    }

    /// Parse ReceiveMessage XML response
    fn parse_receive_message_response(xml: &str) -> Result<Vec<ReceivedMessage>, TransportError> {
        use quick_xml::events::Event;
        use quick_xml::Reader;

        // Body text is kept byte-exact; other fields are trimmed below
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        let mut messages = Vec::new();
        let mut current: Option<PartialMessage> = None;
        let mut element: Vec<u8> = Vec::new();
        let mut attribute_name: Option<String> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let name = e.name().as_ref().to_vec();
                    if name == b"Message" {
                        current = Some(PartialMessage::default());
                    }
                    element = name;
                }
                Ok(Event::Text(e)) => {
                    let Some(message) = current.as_mut() else {
                        buf.clear();
                        continue;
                    };
                    let text = e
                        .unescape()
                        .map_err(|e| TransportError::MalformedResponse {
                            message: format!("Failed to parse XML text: {}", e),
                        })?
                        .into_owned();

                    if element.as_slice() == b"Body" {
                        message.body.get_or_insert_with(String::new).push_str(&text);
                        buf.clear();
                        continue;
                    }

                    let text = text.trim().to_string();
                    match element.as_slice() {
                        b"MessageId" => message.message_id = Some(text),
                        b"ReceiptHandle" => message.receipt_handle = Some(text),
                        b"Name" => attribute_name = Some(text),
                        b"Value" => match attribute_name.take().as_deref() {
                            Some("ApproximateReceiveCount") => {
                                message.delivery_count = text.parse().unwrap_or(1);
                            }
                            Some("MessageGroupId") => message.group_id = Some(text),
                            _ => {}
                        },
                        _ => {}
                    }
                }
                Ok(Event::End(ref e)) => {
                    if e.name().as_ref() == b"Message" {
                        if let Some(partial) = current.take() {
                            messages.push(partial.finish()?);
                        }
                    }
                    element.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(TransportError::MalformedResponse {
                        message: format!("XML parsing error: {}", e),
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(messages)
    }
}

/// Fields collected while walking one `<Message>` element
#[derive(Default)]
struct PartialMessage {
    message_id: Option<String>,
    receipt_handle: Option<String>,
    body: Option<String>,
    delivery_count: u32,
    group_id: Option<String>,
}

impl PartialMessage {
    fn finish(self) -> Result<ReceivedMessage, TransportError> {
        let receipt_handle =
            self.receipt_handle
                .ok_or_else(|| TransportError::MalformedResponse {
                    message: "ReceiptHandle missing from received message".to_string(),
                })?;

        let message_id = self
            .message_id
            .as_deref()
            .and_then(|id| MessageId::from_str(id).ok())
            .unwrap_or_default();

        Ok(ReceivedMessage {
            message_id,
            // An empty body is legal in the XML but arrives without a text node
            body: Bytes::from(self.body.unwrap_or_default()),
            receipt_handle: ReceiptHandle::new(receipt_handle, ProviderType::AwsSqs),
            delivery_count: self.delivery_count.max(1),
            group_id: self.group_id,
        })
    }
}

impl fmt::Debug for SqsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsTransport")
            .field("queue_url", &self.config.queue_url)
            .field("fifo", &self.is_fifo())
            .finish()
    }
}

#[async_trait]
impl QueueTransport for SqsTransport {
    async fn send(
        &self,
        body: Bytes,
        routing_key: &str,
        dedup_key: &str,
    ) -> Result<MessageId, TransportError> {
        let max_size = ProviderType::AwsSqs.max_message_size();
        if body.len() > max_size {
            return Err(TransportError::MessageTooLarge {
                size: body.len(),
                max_size,
            });
        }

        let body = String::from_utf8(body.to_vec()).map_err(|_| TransportError::MessageRejected {
            reason: "SQS message bodies must be valid UTF-8".to_string(),
        })?;

        if self.is_fifo() {
            check_group_id(routing_key)?;
        }

        let mut params = Self::base_params("SendMessage");
        params.insert("MessageBody".to_string(), body);

        if self.is_fifo() {
            params.insert("MessageGroupId".to_string(), routing_key.to_string());
            params.insert("MessageDeduplicationId".to_string(), dedup_key.to_string());
        } else {
            params.insert(
                "MessageAttribute.1.Name".to_string(),
                ROUTING_KEY_ATTRIBUTE.to_string(),
            );
            params.insert(
                "MessageAttribute.1.Value.DataType".to_string(),
                "String".to_string(),
            );
            params.insert(
                "MessageAttribute.1.Value.StringValue".to_string(),
                routing_key.to_string(),
            );
        }

        let response = self.client.call(&params).await?;
        let message_id = Self::parse_send_message_response(&response)?;

        debug!(
            message_id = %message_id,
            routing_key = routing_key,
            "SQS message sent"
        );

        Ok(message_id)
    }

    async fn receive(
        &self,
        max_count: u32,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let max_count = max_count.clamp(1, ProviderType::AwsSqs.max_batch_size());
        let wait_time_seconds = wait.as_secs().min(MAX_WAIT_SECONDS);

        let mut params = Self::base_params("ReceiveMessage");
        params.insert("MaxNumberOfMessages".to_string(), max_count.to_string());
        params.insert("WaitTimeSeconds".to_string(), wait_time_seconds.to_string());
        params.insert("AttributeName.1".to_string(), "All".to_string());

        let response = self.client.call(&params).await?;
        Self::parse_receive_message_response(&response)
    }

    async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<(), TransportError> {
        let mut params = Self::base_params("DeleteMessage");
        params.insert("ReceiptHandle".to_string(), receipt.handle().to_string());

        // DeleteMessage returns an empty result on success
        self.client.call(&params).await?;
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsSqs
    }
}
