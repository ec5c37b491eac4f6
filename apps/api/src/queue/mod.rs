//! Queue: the durable hand-off between the trigger and the worker pool.
//!
//! One logical job class: serialized [`Session`] envelopes. Delivery is
//! at-least-once on the wire; when a message is acknowledged is the
//! consumer's choice (see [`AckMode`]).

mod redis;

pub use self::redis::RedisQueue;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::session::Session;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("encode job: {0}")]
    Encode(#[from] serde_json::Error),
}

/// When a received message is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// Immediately on receipt, before processing. A crash mid-job loses it.
    OnReceipt,
    /// Only after the session is marked completed. Failed jobs stay
    /// unacknowledged and are redelivered by [`JobQueue::recover_unacked`].
    AfterCommit,
}

impl FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on_receipt" => Ok(AckMode::OnReceipt),
            "after_commit" => Ok(AckMode::AfterCommit),
            other => Err(format!(
                "unknown ack mode '{other}' (expected on_receipt or after_commit)"
            )),
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckMode::OnReceipt => f.write_str("on_receipt"),
            AckMode::AfterCommit => f.write_str("after_commit"),
        }
    }
}

/// One received message. Handed back to [`QueueConsumer::ack`].
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub payload: String,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn publish(&self, payload: String) -> Result<(), QueueError>;

    /// Opens a consumer with its own connection. One per worker.
    async fn consumer(&self) -> Result<Box<dyn QueueConsumer>, QueueError>;

    /// Returns received-but-unacknowledged messages to the queue.
    async fn recover_unacked(&self) -> Result<usize, QueueError>;
}

#[async_trait]
pub trait QueueConsumer: Send {
    /// Waits up to the consumer's poll interval. `Ok(None)` means nothing
    /// arrived; callers loop.
    async fn receive(&mut self) -> Result<Option<Delivery>, QueueError>;

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), QueueError>;
}

pub async fn publish_session(queue: &dyn JobQueue, session: &Session) -> Result<(), QueueError> {
    let payload = serde_json::to_string(session)?;
    queue.publish(payload).await
}
