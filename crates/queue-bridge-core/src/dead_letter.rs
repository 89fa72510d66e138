//! Dead-letter records and the sinks that receive them.
//!
//! A message classified as a permanent failure is acknowledged so it stops
//! being redelivered. Before that happens the consumption loop hands a
//! [`DeadLetter`] to the configured [`DeadLetterSink`].

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use queue_bridge_runtime::{MessageId, QueueTransport};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

#[cfg(test)]
#[path = "dead_letter_tests.rs"]
mod tests;

/// Longest body excerpt kept on a dead letter, in bytes
pub const BODY_EXCERPT_LIMIT: usize = 256;

/// A message that was given up on
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub message_id: MessageId,
    /// Stable error kind, e.g. `decode_failure`
    pub error_kind: String,
    pub reason: String,
    pub delivery_count: u32,
    pub body_excerpt: String,
    #[serde(skip)]
    pub body: Bytes,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        message_id: MessageId,
        error_kind: impl Into<String>,
        reason: impl Into<String>,
        delivery_count: u32,
        body: Bytes,
    ) -> Self {
        Self {
            message_id,
            error_kind: error_kind.into(),
            reason: reason.into(),
            delivery_count,
            body_excerpt: body_excerpt(&body, BODY_EXCERPT_LIMIT),
            body,
            failed_at: Utc::now(),
        }
    }
}

/// Lossy UTF-8 rendering of `body`, cut to at most `limit` bytes on a
/// character boundary. A `...` suffix marks a cut.
pub fn body_excerpt(body: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= limit {
        return text.into_owned();
    }

    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Receives messages classified as permanent failures.
///
/// Recording never fails from the caller's point of view; sinks log their own
/// problems.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn record(&self, letter: DeadLetter);
}

/// Writes each dead letter as a structured error log record
#[derive(Debug, Default, Clone)]
pub struct LoggingDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LoggingDeadLetterSink {
    async fn record(&self, letter: DeadLetter) {
        error!(
            message_id = %letter.message_id,
            error_kind = %letter.error_kind,
            delivery_count = letter.delivery_count,
            body = %letter.body_excerpt,
            reason = %letter.reason,
            "Message dead-lettered"
        );
    }
}

/// Keeps dead letters in memory
#[derive(Debug, Default)]
pub struct InMemoryDeadLetterSink {
    letters: Mutex<Vec<DeadLetter>>,
}

impl InMemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterSink {
    async fn record(&self, letter: DeadLetter) {
        self.letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(letter);
    }
}

/// Forwards the raw body of each dead letter to a separate queue.
///
/// The original message id is the dedup key, so a letter recorded twice
/// (e.g. after a failed acknowledgement) lands once.
pub struct QueueDeadLetterSink {
    transport: Arc<dyn QueueTransport>,
}

impl QueueDeadLetterSink {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl DeadLetterSink for QueueDeadLetterSink {
    async fn record(&self, letter: DeadLetter) {
        let dedup_key = letter.message_id.to_string();
        match self
            .transport
            .send(letter.body.clone(), &letter.error_kind, &dedup_key)
            .await
        {
            Ok(dead_letter_id) => {
                info!(
                    message_id = %letter.message_id,
                    dead_letter_id = %dead_letter_id,
                    error_kind = %letter.error_kind,
                    "Message forwarded to dead-letter queue"
                );
            }
            Err(e) => {
                error!(
                    message_id = %letter.message_id,
                    error_kind = %letter.error_kind,
                    transport_error = %e,
                    body = %letter.body_excerpt,
                    reason = %letter.reason,
                    "Failed to forward message to dead-letter queue"
                );
            }
        }
    }
}
