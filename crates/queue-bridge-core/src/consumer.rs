//! # Consumption Loop
//!
//! Polls a queue in bounded batches and runs an [`EventHandler`] for each
//! message on a bounded pool of worker tasks.
//!
//! Per message:
//! 1. Decode the body (failure is permanent)
//! 2. Validate the event (failure is permanent)
//! 3. Run the handler under the handler timeout (timeout and panics are retryable)
//! 4. Acknowledge on success or permanent failure, dead-lettering the latter
//!
//! Retryable failures are never acknowledged; the transport redelivers the
//! message once its visibility timeout lapses. With `max_deliveries`
//! configured, a retryable failure on a message that has already been
//! delivered that many times is dead-lettered instead.
//!
//! Cancellation is checked before each poll. A poll or backoff sleep in
//! progress is abandoned, but messages already handed to workers always run
//! to completion before [`ConsumptionLoop::run`] returns.

use crate::codec;
use crate::config::ConsumerConfig;
use crate::dead_letter::{body_excerpt, DeadLetter, DeadLetterSink, BODY_EXCERPT_LIMIT};
use crate::error::DispatchError;
use crate::handler::{DispatchOutcome, EventHandler};
use crate::retry::{RetryPolicy, RetryState};
use futures::FutureExt;
use queue_bridge_runtime::{QueueTransport, ReceivedMessage};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

/// Observable state of a [`ConsumptionLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for a free worker before the next poll
    Idle,
    /// Waiting on the transport for a batch
    Polling,
    /// Handing a batch to workers, or draining workers after cancellation
    Dispatching,
    /// Cancelled and all workers finished
    Stopped,
}

/// Counters accumulated by a [`ConsumptionLoop`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub polls: u64,
    pub received: u64,
    pub succeeded: u64,
    /// Messages left on the queue for redelivery
    pub retried: u64,
    pub dead_lettered: u64,
    pub ack_failures: u64,
    pub poll_failures: u64,
}

#[derive(Default)]
struct StatsCounters {
    polls: AtomicU64,
    received: AtomicU64,
    succeeded: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    ack_failures: AtomicU64,
    poll_failures: AtomicU64,
}

impl StatsCounters {
    fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            polls: self.polls.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
        }
    }
}

/// Everything a worker needs to process one message
struct Dispatcher {
    transport: Arc<dyn QueueTransport>,
    handler: Arc<dyn EventHandler>,
    dead_letters: Arc<dyn DeadLetterSink>,
    handler_timeout: Duration,
    max_deliveries: Option<u32>,
    ack_policy: RetryPolicy,
    stats: StatsCounters,
}

impl Dispatcher {
    async fn dispatch(&self, message: ReceivedMessage) -> DispatchOutcome {
        let result = match self.process(&message).await {
            Err(e) if e.is_retryable() => match self.max_deliveries {
                Some(max) if message.has_reached_delivery_count(max) => {
                    Err(DispatchError::DeliveriesExhausted {
                        max_deliveries: max,
                        last_error: e.to_string(),
                    })
                }
                _ => Err(e),
            },
            other => other,
        };

        let outcome = match result {
            Ok(()) => {
                StatsCounters::add(&self.stats.succeeded, 1);
                debug!(
                    message_id = %message.message_id,
                    delivery_count = message.delivery_count,
                    "Message processed"
                );
                DispatchOutcome::Success
            }
            Err(e) if e.is_retryable() => {
                StatsCounters::add(&self.stats.retried, 1);
                warn!(
                    message_id = %message.message_id,
                    error_kind = e.kind(),
                    delivery_count = message.delivery_count,
                    error = %e,
                    "Message left for redelivery"
                );
                DispatchOutcome::retryable(e.to_string())
            }
            Err(e) => {
                StatsCounters::add(&self.stats.dead_lettered, 1);
                warn!(
                    message_id = %message.message_id,
                    error_kind = e.kind(),
                    delivery_count = message.delivery_count,
                    body = %body_excerpt(&message.body, BODY_EXCERPT_LIMIT),
                    error = %e,
                    "Message failed permanently"
                );
                self.dead_letters
                    .record(DeadLetter::new(
                        message.message_id.clone(),
                        e.kind(),
                        e.to_string(),
                        message.delivery_count,
                        message.body.clone(),
                    ))
                    .await;
                DispatchOutcome::permanent(e.to_string())
            }
        };

        // Dead letters are recorded before the message leaves the queue
        if outcome.acknowledges() {
            self.acknowledge(&message).await;
        }
        outcome
    }

    async fn process(&self, message: &ReceivedMessage) -> Result<(), DispatchError> {
        let event = codec::decode(&message.body).map_err(DispatchError::DecodeFailure)?;
        event.validate().map_err(DispatchError::InvalidEvent)?;

        let handled = AssertUnwindSafe(self.handler.handle(&event)).catch_unwind();
        match tokio::time::timeout(self.handler_timeout, handled).await {
            Err(_) => Err(DispatchError::HandlerTimeout {
                timeout: self.handler_timeout,
            }),
            Ok(Err(panic)) => Err(DispatchError::HandlerPanicked {
                reason: panic_message(panic.as_ref()),
            }),
            Ok(Ok(DispatchOutcome::Success)) => Ok(()),
            Ok(Ok(DispatchOutcome::RetryableFailure { reason })) => {
                Err(DispatchError::HandlerRetry { reason })
            }
            Ok(Ok(DispatchOutcome::PermanentFailure { reason })) => {
                Err(DispatchError::HandlerRejected { reason })
            }
        }
    }

    /// Acknowledge, retrying transient failures. A message that cannot be
    /// acknowledged is redelivered later, so failures are only logged.
    async fn acknowledge(&self, message: &ReceivedMessage) {
        let mut retry = RetryState::new();
        loop {
            match self.transport.acknowledge(&message.receipt_handle).await {
                Ok(()) => {
                    debug!(message_id = %message.message_id, "Message acknowledged");
                    return;
                }
                Err(e) if e.is_transient() && retry.can_retry(&self.ack_policy) => {
                    let delay = retry.get_delay(&self.ack_policy);
                    retry.next_attempt();
                    warn!(
                        message_id = %message.message_id,
                        error_kind = e.kind(),
                        attempt = retry.attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Acknowledgement failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    StatsCounters::add(&self.stats.ack_failures, 1);
                    error!(
                        message_id = %message.message_id,
                        error_kind = e.kind(),
                        attempts = retry.attempt + 1,
                        error = %e,
                        "Failed to acknowledge message, it will be redelivered"
                    );
                    return;
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked with a non-string payload".to_string()
    }
}

/// Polling consumer for one queue binding
pub struct ConsumptionLoop {
    dispatcher: Arc<Dispatcher>,
    config: ConsumerConfig,
    poll_policy: RetryPolicy,
    state: watch::Sender<LoopState>,
}

impl ConsumptionLoop {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        handler: Arc<dyn EventHandler>,
        dead_letters: Arc<dyn DeadLetterSink>,
        config: ConsumerConfig,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        let dispatcher = Dispatcher {
            transport,
            handler,
            dead_letters,
            handler_timeout: config.handler_timeout(),
            max_deliveries: config.max_deliveries,
            ack_policy: config.ack_retry.to_policy(),
            stats: StatsCounters::default(),
        };

        Self {
            dispatcher: Arc::new(dispatcher),
            poll_policy: config.poll_backoff.to_policy(),
            config,
            state,
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Counters so far; also returned by [`run`](Self::run)
    pub fn stats(&self) -> ConsumerStats {
        self.dispatcher.stats.snapshot()
    }

    fn set_state(&self, state: LoopState) {
        self.state.send_replace(state);
    }

    /// Process a single received message: decode, validate, handle,
    /// then acknowledge or leave it for redelivery.
    pub async fn dispatch(&self, message: ReceivedMessage) -> DispatchOutcome {
        self.dispatcher.dispatch(message).await
    }

    /// Run until `cancel` fires, then wait for in-flight messages.
    ///
    /// Never returns early on per-message or transport errors.
    pub async fn run(&self, cancel: CancellationToken) -> ConsumerStats {
        let workers = Arc::new(Semaphore::new(self.config.worker_count.max(1)));
        let batch_size = self.config.batch_size.max(1) as usize;
        let wait = self.config.wait();
        let mut in_flight = JoinSet::new();
        let mut poll_failures = RetryState::new();

        info!(
            batch_size,
            worker_count = self.config.worker_count,
            wait_seconds = self.config.wait_seconds,
            handler_timeout_seconds = self.config.handler_timeout_seconds,
            provider = ?self.dispatcher.transport.provider_type(),
            "Consumption loop started"
        );

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                log_worker_exit(joined);
            }

            if cancel.is_cancelled() {
                break;
            }

            // Poll only for as many messages as there are free workers
            self.set_state(LoopState::Idle);
            let first_permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&workers).acquire_owned() => permit,
            };
            let Ok(first_permit) = first_permit else {
                break;
            };
            let mut permits = vec![first_permit];
            while permits.len() < batch_size {
                match Arc::clone(&workers).try_acquire_owned() {
                    Ok(permit) => permits.push(permit),
                    Err(_) => break,
                }
            }

            self.set_state(LoopState::Polling);
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.dispatcher.transport.receive(permits.len() as u32, wait) => result,
            };
            StatsCounters::add(&self.dispatcher.stats.polls, 1);

            let batch = match received {
                Ok(batch) => {
                    poll_failures.reset();
                    batch
                }
                Err(e) => {
                    StatsCounters::add(&self.dispatcher.stats.poll_failures, 1);
                    let delay = poll_failures.get_delay(&self.poll_policy);
                    poll_failures.next_attempt();
                    warn!(
                        error_kind = e.kind(),
                        transient = e.is_transient(),
                        consecutive_failures = poll_failures.attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Failed to poll queue"
                    );
                    drop(permits);

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                continue;
            }

            StatsCounters::add(&self.dispatcher.stats.received, batch.len() as u64);
            self.set_state(LoopState::Dispatching);
            debug!(count = batch.len(), "Dispatching batch");

            let mut permits = permits.into_iter();
            for message in batch {
                // A transport may return more than asked for; extra messages wait for a worker
                let permit = match permits.next() {
                    Some(permit) => Some(permit),
                    None => Arc::clone(&workers).acquire_owned().await.ok(),
                };
                let dispatcher = Arc::clone(&self.dispatcher);
                in_flight.spawn(async move {
                    let _permit = permit;
                    dispatcher.dispatch(message).await;
                });
            }
        }

        if !in_flight.is_empty() {
            self.set_state(LoopState::Dispatching);
            info!(
                in_flight = in_flight.len(),
                "Cancellation requested, waiting for in-flight messages"
            );
        }
        while let Some(joined) = in_flight.join_next().await {
            log_worker_exit(joined);
        }

        self.set_state(LoopState::Stopped);
        let stats = self.stats();
        info!(
            polls = stats.polls,
            received = stats.received,
            succeeded = stats.succeeded,
            retried = stats.retried,
            dead_lettered = stats.dead_lettered,
            ack_failures = stats.ack_failures,
            poll_failures = stats.poll_failures,
            "Consumption loop stopped"
        );
        stats
    }
}

fn log_worker_exit(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Dispatch worker terminated abnormally");
    }
}
