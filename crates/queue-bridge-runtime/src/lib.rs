//! # Queue-Bridge Runtime
//!
//! Queue and topic transports for Queue-Bridge, with AWS SQS, AWS SNS and
//! in-memory implementations.
//!
//! This library provides:
//! - Provider-agnostic queue operations: send, long-poll receive, acknowledge
//! - Topic publishing for fan-out forwarding
//! - AWS query-API providers signed with Signature V4
//! - In-memory providers with visibility timeouts and deduplication for tests
//!
//! ## Module Organization
//!
//! - [`error`] - Error type for all transport operations
//! - [`message`] - Message identifiers and receipt handles
//! - [`provider`] - Provider configuration
//! - [`transport`] - Transport traits
//! - [`providers`] - Concrete providers

pub mod error;
pub mod message;
pub mod provider;
pub mod providers;
pub mod transport;

// Re-export commonly used types at crate root for convenience
pub use error::TransportError;
pub use message::{MessageId, ProviderType, ReceiptHandle, ReceivedMessage, MAX_GROUP_ID_LENGTH};
pub use provider::{AwsAuthConfig, AwsCredentials, InMemoryConfig, SnsConfig, SqsConfig};
pub use providers::{InMemoryTopic, InMemoryTransport, PublishedMessage, SnsPublisher, SqsTransport};
pub use transport::{QueueTransport, TopicPublisher};
