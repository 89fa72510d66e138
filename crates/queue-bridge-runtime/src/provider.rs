//! Provider configuration types.

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Environment variable holding the AWS access key ID
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
/// Environment variable holding the AWS secret access key
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// Environment variable holding the AWS session token for temporary credentials
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// Static AWS credentials used for request signing
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    /// Read credentials from the standard AWS environment variables
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var(ENV_ACCESS_KEY_ID).ok()?;
        let secret_access_key = std::env::var(ENV_SECRET_ACCESS_KEY).ok()?;
        if access_key_id.is_empty() || secret_access_key.is_empty() {
            return None;
        }

        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: std::env::var(ENV_SESSION_TOKEN)
                .ok()
                .filter(|t| !t.is_empty()),
        })
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Optional explicit credentials in configuration files
///
/// When the key pair is absent the standard AWS environment variables are used.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsAuthConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl AwsAuthConfig {
    /// Resolve configured credentials, falling back to the environment
    pub fn resolve(&self) -> Option<AwsCredentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key))
                if !access_key_id.is_empty() && !secret_access_key.is_empty() =>
            {
                Some(AwsCredentials {
                    access_key_id: access_key_id.clone(),
                    secret_access_key: secret_access_key.clone(),
                    session_token: self.session_token.clone(),
                })
            }
            _ => AwsCredentials::from_env(),
        }
    }
}

impl fmt::Debug for AwsAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsAuthConfig")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// AWS SQS queue binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqsConfig {
    /// Full queue URL, e.g. `https://sqs.us-east-1.amazonaws.com/123456789012/orders`
    pub queue_url: String,
    /// Signing region; derived from the queue URL host when empty
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub credentials: AwsAuthConfig,
    /// HTTP request timeout; must exceed the longest receive wait (20s)
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl SqsConfig {
    /// Create config for a queue URL with credentials taken from the environment
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            region: String::new(),
            credentials: AwsAuthConfig::default(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Resolve the signing region from config or the queue URL host
    pub fn resolved_region(&self) -> Result<String, TransportError> {
        if !self.region.is_empty() {
            return Ok(self.region.clone());
        }

        region_from_host(&self.queue_url, "sqs").ok_or_else(|| TransportError::Configuration {
            message: format!(
                "region not configured and not derivable from queue URL '{}'",
                self.queue_url
            ),
        })
    }

    /// Check if the bound queue is a FIFO queue
    pub fn is_fifo(&self) -> bool {
        self.queue_url.trim_end_matches('/').ends_with(".fifo")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// AWS SNS topic binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnsConfig {
    /// Topic ARN, e.g. `arn:aws:sns:us-east-1:123456789012:orders`
    pub topic_arn: String,
    /// Signing region; derived from the topic ARN when empty
    #[serde(default)]
    pub region: String,
    /// Endpoint override (LocalStack, VPC endpoints)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub credentials: AwsAuthConfig,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl SnsConfig {
    pub fn new(topic_arn: impl Into<String>) -> Self {
        Self {
            topic_arn: topic_arn.into(),
            region: String::new(),
            endpoint: None,
            credentials: AwsAuthConfig::default(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Resolve the signing region from config or the topic ARN
    pub fn resolved_region(&self) -> Result<String, TransportError> {
        if !self.region.is_empty() {
            return Ok(self.region.clone());
        }

        // arn:partition:sns:region:account:name
        self.topic_arn
            .split(':')
            .nth(3)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .ok_or_else(|| TransportError::Configuration {
                message: format!(
                    "region not configured and not derivable from topic ARN '{}'",
                    self.topic_arn
                ),
            })
    }

    /// Resolve the service endpoint for the topic
    pub fn resolved_endpoint(&self) -> Result<String, TransportError> {
        match &self.endpoint {
            Some(endpoint) if !endpoint.is_empty() => Ok(endpoint.trim_end_matches('/').to_string()),
            _ => Ok(format!("https://sns.{}.amazonaws.com", self.resolved_region()?)),
        }
    }

    /// Check if the bound topic is a FIFO topic
    pub fn is_fifo(&self) -> bool {
        self.topic_arn.ends_with(".fifo")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryConfig {
    /// How long a received message stays hidden before it is redelivered
    pub visibility_timeout_seconds: u64,
    /// Window within which sends with the same dedup key are suppressed
    pub dedup_window_seconds: u64,
    pub max_queue_size: usize,
}

impl InMemoryConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_seconds)
    }
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_seconds: 30,
            dedup_window_seconds: 300, // Same window as SQS FIFO queues
            max_queue_size: 10000,
        }
    }
}

fn default_request_timeout_seconds() -> u64 {
    30
}

/// Extract `<region>` from hosts of the form `<service>.<region>.amazonaws.com`
fn region_from_host(endpoint: &str, service: &str) -> Option<String> {
    let url = url::Url::parse(endpoint).ok()?;
    let host = url.host_str()?;
    let mut parts = host.split('.');
    if parts.next()? != service {
        return None;
    }
    let region = parts.next()?;
    if parts.next()? != "amazonaws" {
        return None;
    }
    Some(region.to_string())
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
