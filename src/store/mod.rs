//! Context Store
//!
//! Durable key-value persistence for context records. Every operation returns
//! a `ContextResult`; nothing panics across this boundary. Each call is atomic
//! only for the single key it touches; there are no cross-record transactions.

pub mod persistence;

pub use persistence::SledContextStore;

use crate::context::{Context, ContextSummary};
use crate::error::ContextResult;
use crate::types::{ContextId, ContextType, Timestamp};
use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::watch;

/// Size and per-type record counts of a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub size_bytes: u64,
    pub counts: BTreeMap<ContextType, usize>,
    pub quota_bytes: Option<u64>,
}

impl StorageStats {
    pub fn total_records(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, context_type: ContextType) -> usize {
        self.counts.get(&context_type).copied().unwrap_or(0)
    }
}

/// Store tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Upper bound on the total size of live records
    pub quota_bytes: Option<u64>,
    /// Prior versions kept per context; 0 disables history
    pub max_history_versions: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            quota_bytes: None,
            max_history_versions: 10,
        }
    }
}

/// Persistence interface for context records.
///
/// Records are keyed by `(type, id)`. Saving a context whose stored version is
/// older moves the stored copy into version history.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn save(&self, context: &Context) -> ContextResult<()>;

    /// Load a record; `ContextError::NotFound` when absent.
    async fn load(&self, id: &ContextId, context_type: ContextType) -> ContextResult<Context>;

    /// Remove a record and its history; `ContextError::NotFound` when absent.
    async fn delete(&self, id: &ContextId, context_type: ContextType) -> ContextResult<()>;

    /// Metadata for every record, or only those of one type.
    async fn list(&self, context_type: Option<ContextType>) -> ContextResult<Vec<ContextSummary>>;

    /// Prior versions of a record, oldest first.
    async fn history(&self, id: &ContextId, context_type: ContextType)
        -> ContextResult<Vec<Context>>;

    async fn current_session_id(&self) -> ContextResult<Option<ContextId>>;

    async fn set_current_session_id(&self, id: &ContextId) -> ContextResult<()>;

    /// Make completed writes durable.
    async fn flush(&self) -> ContextResult<()> {
        Ok(())
    }

    fn stats(&self) -> StorageStats;

    /// Receiver updated after every successful save or delete.
    fn subscribe_stats(&self) -> watch::Receiver<StorageStats>;

    /// Delete every record last updated more than `retention` before `now`,
    /// except those listed in `keep`. Returns the removed records.
    async fn cleanup(
        &self,
        retention: Duration,
        now: Timestamp,
        keep: &[ContextId],
    ) -> ContextResult<Vec<ContextSummary>> {
        let cutoff = now - retention;
        let mut removed = Vec::new();
        for summary in self.list(None).await? {
            if summary.updated_at >= cutoff || keep.contains(&summary.id) {
                continue;
            }
            match self.delete(&summary.id, summary.context_type).await {
                Ok(()) => removed.push(summary),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}
