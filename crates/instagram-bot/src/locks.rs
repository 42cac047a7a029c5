//! Per-conversation request serialization
//!
//! A conversation's scratch directory belongs to exactly one in-flight
//! request. Requests for the same conversation queue on a shared async
//! mutex; different conversations never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use instagram_types::ConversationId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default, Clone)]
pub struct ConversationLocks {
    locks: Arc<Mutex<HashMap<ConversationId, Arc<AsyncMutex<()>>>>>,
}

/// Held for the lifetime of one request
pub type ConversationGuard = OwnedMutexGuard<()>;

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request for `conversation` is in flight.
    pub async fn lock(&self, conversation: ConversationId) -> ConversationGuard {
        let lock = self.get_or_create(conversation);
        lock.lock_owned().await
    }

    fn get_or_create(&self, conversation: ConversationId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());

        // Prune locks held only by the map (no task is using them).
        locks.retain(|_, arc| Arc::strong_count(arc) > 1);

        locks
            .entry(conversation)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Number of conversations with a request in flight or queued.
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|arc| Arc::strong_count(arc) > 1).count()
    }
}
