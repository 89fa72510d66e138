//! # Queue-Bridge Core
//!
//! Producer and consumer wrappers around a message queue, plus a topic
//! forwarder built on the same consumption loop.
//!
//! The flow on the producing side is:
//! 1. Validate the [`Event`] (its id doubles as the routing key)
//! 2. Encode it with the [`codec`] and derive a content-hash dedup token
//! 3. Hand the body to a [`QueueTransport`](queue_bridge_runtime::QueueTransport)
//!
//! On the consuming side a [`ConsumptionLoop`] polls bounded batches, runs an
//! [`EventHandler`] per message on a bounded worker pool and acknowledges only
//! messages that succeeded or were classified as permanent failures.

pub mod codec;
pub mod config;
pub mod consumer;
pub mod dead_letter;
pub mod error;
pub mod event;
pub mod forwarder;
pub mod handler;
pub mod producer;
pub mod retry;

pub use config::{
    BackoffConfig, BridgeConfig, ConsumerConfig, DeadLetterSettings, LoggingConfig,
    ProviderKind, QueueSettings, TopicSettings,
};
pub use consumer::{ConsumerStats, ConsumptionLoop, LoopState};
pub use dead_letter::{
    DeadLetter, DeadLetterSink, InMemoryDeadLetterSink, LoggingDeadLetterSink,
    QueueDeadLetterSink,
};
pub use error::{CodecError, ConfigError, DispatchError, ProducerError, ValidationError};
pub use event::Event;
pub use forwarder::TopicForwarder;
pub use handler::{DispatchOutcome, EventHandler, LogOnlyHandler};
pub use producer::EventProducer;
pub use retry::{RetryPolicy, RetryState};
