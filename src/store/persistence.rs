//! Persistence layer for the Context Store

use crate::context::{Context, ContextSummary};
use crate::error::{ContextResult, StorageError};
use crate::store::{ContextStore, StorageStats, StoreOptions};
use crate::types::{ContextId, ContextType};
use async_trait::async_trait;
use sled::{Db, Tree};
use std::io;
use std::path::Path;
use tokio::sync::watch;
use tracing::{debug, warn};

const TREE_CONTEXTS: &str = "contexts";
const TREE_HISTORY: &str = "context_history";
const TREE_META: &str = "context_meta";
const CURRENT_SESSION_KEY: &str = "current_session_id";
const VERSION_KEY_PAD: usize = 20;

/// Sled-based implementation of ContextStore
pub struct SledContextStore {
    db: Db,
    contexts: Tree,
    history: Tree,
    meta: Tree,
    options: StoreOptions,
    stats_tx: watch::Sender<StorageStats>,
}

impl SledContextStore {
    /// Open or create a store at the given directory
    pub fn open<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(to_storage_io)?;
        Self::from_db(db, options)
    }

    /// Wrap an already opened sled database
    pub fn from_db(db: Db, options: StoreOptions) -> Result<Self, StorageError> {
        let contexts = db.open_tree(TREE_CONTEXTS).map_err(to_storage_io)?;
        let history = db.open_tree(TREE_HISTORY).map_err(to_storage_io)?;
        let meta = db.open_tree(TREE_META).map_err(to_storage_io)?;
        let (stats_tx, _) = watch::channel(StorageStats {
            quota_bytes: options.quota_bytes,
            ..Default::default()
        });
        let store = Self {
            db,
            contexts,
            history,
            meta,
            options,
            stats_tx,
        };
        store.refresh_stats()?;
        Ok(store)
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Flush all pending writes to disk
    pub fn flush_sync(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }

    pub fn record_key(id: &ContextId, context_type: ContextType) -> String {
        format!("{}:{}", context_type, id)
    }

    /// History keys carry the id length so an id containing `:` never
    /// prefixes another id's versions.
    fn history_prefix(id: &ContextId, context_type: ContextType) -> String {
        format!("{}:{}:{}:", context_type, id.as_str().len(), id)
    }

    fn history_key(id: &ContextId, context_type: ContextType, version: u64) -> String {
        format!(
            "{}{:0pad$}",
            Self::history_prefix(id, context_type),
            version,
            pad = VERSION_KEY_PAD
        )
    }

    fn decode(key: &str, raw: &[u8]) -> Result<Context, StorageError> {
        serde_json::from_slice(raw).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Recompute size and per-type counts and broadcast them.
    fn refresh_stats(&self) -> Result<StorageStats, StorageError> {
        let mut stats = StorageStats {
            quota_bytes: self.options.quota_bytes,
            ..Default::default()
        };
        for item in self.contexts.iter() {
            let (key, value) = item.map_err(to_storage_io)?;
            stats.size_bytes += value.len() as u64;
            let key = String::from_utf8_lossy(&key);
            match key.split_once(':').map(|(ty, _)| ty.parse::<ContextType>()) {
                Some(Ok(ty)) => *stats.counts.entry(ty).or_insert(0) += 1,
                _ => warn!(key = %key, "Skipping record with unrecognized key"),
            }
        }
        self.stats_tx.send_replace(stats.clone());
        Ok(stats)
    }

    fn check_quota(&self, old_len: u64, new_len: u64) -> Result<(), StorageError> {
        let Some(quota) = self.options.quota_bytes else {
            return Ok(());
        };
        let current = self.stats_tx.borrow().size_bytes;
        let required = current.saturating_sub(old_len) + new_len;
        if required > quota {
            return Err(StorageError::QuotaExceeded { required, quota });
        }
        Ok(())
    }

    fn archive(&self, previous: &Context, raw: &[u8]) -> Result<(), StorageError> {
        if self.options.max_history_versions == 0 {
            return Ok(());
        }
        let key = Self::history_key(&previous.id, previous.context_type(), previous.version());
        self.history
            .insert(key.as_bytes(), raw)
            .map_err(to_storage_io)?;

        let prefix = Self::history_prefix(&previous.id, previous.context_type());
        let keys: Vec<sled::IVec> = self
            .history
            .scan_prefix(prefix.as_bytes())
            .keys()
            .collect::<Result<_, _>>()
            .map_err(to_storage_io)?;
        let excess = keys.len().saturating_sub(self.options.max_history_versions);
        for key in keys.into_iter().take(excess) {
            self.history.remove(key).map_err(to_storage_io)?;
        }
        Ok(())
    }

    fn save_sync(&self, context: &Context) -> Result<(), StorageError> {
        let key = Self::record_key(&context.id, context.context_type());
        let value = serde_json::to_vec(context).map_err(|e| {
            StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
        })?;

        let existing = self.contexts.get(key.as_bytes()).map_err(to_storage_io)?;
        let old_len = existing.as_ref().map_or(0, |v| v.len() as u64);
        self.check_quota(old_len, value.len() as u64)?;

        if let Some(raw) = existing {
            match Self::decode(&key, &raw) {
                Ok(previous) if previous.version() < context.version() => {
                    self.archive(&previous, &raw)?;
                }
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "Overwriting unreadable record"),
            }
        }

        self.contexts
            .insert(key.as_bytes(), value)
            .map_err(to_storage_io)?;
        debug!(key = %key, version = context.version(), "Saved context");
        self.refresh_stats()?;
        Ok(())
    }

    fn load_sync(&self, id: &ContextId, context_type: ContextType) -> Result<Context, StorageError> {
        let key = Self::record_key(id, context_type);
        let Some(raw) = self.contexts.get(key.as_bytes()).map_err(to_storage_io)? else {
            return Err(StorageError::RecordNotFound {
                context_type,
                id: id.clone(),
            });
        };
        Self::decode(&key, &raw)
    }

    fn delete_sync(&self, id: &ContextId, context_type: ContextType) -> Result<(), StorageError> {
        let key = Self::record_key(id, context_type);
        if self
            .contexts
            .remove(key.as_bytes())
            .map_err(to_storage_io)?
            .is_none()
        {
            return Err(StorageError::RecordNotFound {
                context_type,
                id: id.clone(),
            });
        }
        let prefix = Self::history_prefix(id, context_type);
        let keys: Vec<sled::IVec> = self
            .history
            .scan_prefix(prefix.as_bytes())
            .keys()
            .collect::<Result<_, _>>()
            .map_err(to_storage_io)?;
        for key in keys {
            self.history.remove(key).map_err(to_storage_io)?;
        }
        debug!(key = %key, "Deleted context");
        self.refresh_stats()?;
        Ok(())
    }

    fn list_sync(&self, context_type: Option<ContextType>) -> Result<Vec<ContextSummary>, StorageError> {
        let prefix = context_type.map(|ty| format!("{}:", ty)).unwrap_or_default();
        let mut out = Vec::new();
        for item in self.contexts.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item.map_err(to_storage_io)?;
            let key = String::from_utf8_lossy(&key).to_string();
            let context = Self::decode(&key, &value)?;
            out.push(context.summary(value.len() as u64));
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    fn history_sync(&self, id: &ContextId, context_type: ContextType) -> Result<Vec<Context>, StorageError> {
        let prefix = Self::history_prefix(id, context_type);
        let mut out = Vec::new();
        for item in self.history.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item.map_err(to_storage_io)?;
            out.push(Self::decode(&String::from_utf8_lossy(&key), &value)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl ContextStore for SledContextStore {
    async fn save(&self, context: &Context) -> ContextResult<()> {
        context.validate()?;
        Ok(self.save_sync(context)?)
    }

    async fn load(&self, id: &ContextId, context_type: ContextType) -> ContextResult<Context> {
        Ok(self.load_sync(id, context_type)?)
    }

    async fn delete(&self, id: &ContextId, context_type: ContextType) -> ContextResult<()> {
        Ok(self.delete_sync(id, context_type)?)
    }

    async fn list(&self, context_type: Option<ContextType>) -> ContextResult<Vec<ContextSummary>> {
        Ok(self.list_sync(context_type)?)
    }

    async fn history(
        &self,
        id: &ContextId,
        context_type: ContextType,
    ) -> ContextResult<Vec<Context>> {
        Ok(self.history_sync(id, context_type)?)
    }

    async fn current_session_id(&self) -> ContextResult<Option<ContextId>> {
        let raw = self
            .meta
            .get(CURRENT_SESSION_KEY.as_bytes())
            .map_err(to_storage_io)?;
        Ok(raw.map(|v| ContextId::new(String::from_utf8_lossy(&v).to_string())))
    }

    async fn set_current_session_id(&self, id: &ContextId) -> ContextResult<()> {
        self.meta
            .insert(CURRENT_SESSION_KEY.as_bytes(), id.as_str().as_bytes())
            .map_err(to_storage_io)?;
        Ok(())
    }

    async fn flush(&self) -> ContextResult<()> {
        self.db.flush_async().await.map_err(to_storage_io)?;
        Ok(())
    }

    fn stats(&self) -> StorageStats {
        self.stats_tx.borrow().clone()
    }

    fn subscribe_stats(&self) -> watch::Receiver<StorageStats> {
        self.stats_tx.subscribe()
    }
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}
