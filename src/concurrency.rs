//! Per-context write serialization
//!
//! Every mutation of a context runs load → merge → save. Two such sequences on
//! the same `(type, id)` must not interleave, otherwise the second one reads a
//! stale record and the first write is lost. Callers take the lock for the key
//! before loading and hold it until the save has completed.

use crate::types::{ContextId, ContextType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockKey = (ContextType, ContextId);

/// Hands out one async mutex per context key
#[derive(Debug, Default)]
pub struct ContextLockManager {
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl ContextLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock for a context key
    pub fn get_lock(&self, id: &ContextId, context_type: ContextType) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry((context_type, id.clone()))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to a context key
    pub async fn acquire(&self, id: &ContextId, context_type: ContextType) -> OwnedMutexGuard<()> {
        self.get_lock(id, context_type).lock_owned().await
    }

    /// Drop locks nobody holds or waits on
    pub fn prune(&self) {
        self.locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
