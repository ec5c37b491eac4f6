//! Update Broadcaster: in-memory fan-out of status messages to the live
//! streaming connections of a session.
//!
//! Best effort: sends never block, a full or closed subscriber simply misses
//! the message, and nothing is replayed to late subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::session::SessionStatus;

/// Per-subscriber buffer. A client that falls this far behind drops messages.
pub const SUBSCRIBER_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<String>,
}

#[derive(Default)]
pub struct UpdateBroadcaster {
    subscribers: RwLock<HashMap<Uuid, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl UpdateBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: Uuid, tx: mpsc::Sender<String>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut map = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(session_id).or_default().push(Subscriber { id, tx });
        id
    }

    /// Removes the subscriber and drops its sender, which closes the channel
    /// once any buffered messages are read.
    pub fn unregister(&self, session_id: Uuid, id: SubscriberId) -> bool {
        let mut map = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = map.get_mut(&session_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(&session_id);
        }
        removed
    }

    /// Sends `message` to every current subscriber of the session without
    /// waiting. Returns how many accepted it.
    pub fn broadcast(&self, session_id: Uuid, message: &str) -> usize {
        let map = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = map.get(&session_id) else {
            return 0;
        };
        list.iter()
            .filter(|s| s.tx.try_send(message.to_string()).is_ok())
            .count()
    }

    pub fn subscriber_count(&self, session_id: Uuid) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .map_or(0, Vec::len)
    }

    /// Registers a fresh channel and returns a handle that unregisters itself
    /// when dropped.
    pub fn subscribe(self: &Arc<Self>, session_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.register(session_id, tx);
        Subscription {
            broadcaster: Arc::clone(self),
            session_id,
            id,
            rx,
        }
    }
}

pub struct Subscription {
    broadcaster: Arc<UpdateBroadcaster>,
    session_id: Uuid,
    id: SubscriberId,
    rx: mpsc::Receiver<String>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Result<String, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unregister(self.session_id, self.id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status messages
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Created,
    Pending,
    Processing,
    Completed,
    Failed,
}

impl From<SessionStatus> for UpdateStatus {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Created => UpdateStatus::Created,
            SessionStatus::Pending => UpdateStatus::Pending,
            SessionStatus::Completed => UpdateStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub session_id: Uuid,
    pub status: UpdateStatus,
    pub processed: usize,
    pub total: usize,
    pub message: String,
}

impl StatusUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, UpdateStatus::Completed | UpdateStatus::Failed)
    }

    pub fn to_json(&self) -> String {
        // a struct of plain fields always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Whether a broadcast message ends a session's stream.
pub fn is_terminal_message(message: &str) -> bool {
    serde_json::from_str::<StatusUpdate>(message)
        .map(|u| u.is_terminal())
        .unwrap_or(false)
}
