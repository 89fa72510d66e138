//! Transport provider implementations.
//!
//! This module contains concrete implementations of the `QueueTransport` and
//! `TopicPublisher` traits for different backends.

pub mod memory;
mod signing;
pub mod sns;
pub mod sqs;

pub use memory::{InMemoryTopic, InMemoryTransport, PublishedMessage};
pub use sns::SnsPublisher;
pub use sqs::SqsTransport;
