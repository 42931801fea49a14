//! Context Manager
//!
//! Authoritative in-memory view over a `ContextStore`. The manager owns the
//! live `ContextCollection` and the `ActiveContextSet`, publishes both through
//! `watch` channels, and is the only writer of either. Every mutation runs
//! store-first: memory is mirrored only after the store accepted the write.
//!
//! Writes to one `(type, id)` are serialized by a `ContextLockManager`, so a
//! load → merge → save sequence never reads a record another writer is about
//! to replace.

use crate::concurrency::ContextLockManager;
use crate::context::{
    ActiveContextSet, Branch, ChatMessage, Context, ContextCollection, ContextData, ContextPatch,
    ContextQuery, ContextSummary, MessageRole, SessionData, WorkspaceState,
};
use crate::error::{ContextError, ContextResult};
use crate::generation::{FleshOutKind, GenerationService};
use crate::migration::{migrate, validate_composed_state, LegacyState, MigrationOptions, MigrationResult};
use crate::store::{ContextStore, StorageStats};
use crate::transfer::{self, ConflictResolver, ExportBundle, ExportOptions, ImportOptions, ImportReport};
use crate::types::{now, ContextId, ContextType};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Manager behaviour drawn from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Workspace layout of a freshly created session
    pub default_layout: String,
    /// Age after which `cleanup` removes a context; never when `None`
    pub retention_days: Option<u32>,
    pub migration: MigrationOptions,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_layout: "default".to_string(),
            retention_days: None,
            migration: MigrationOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    pub tags: Vec<String>,
}

pub struct ContextManager {
    store: Arc<dyn ContextStore>,
    config: ManagerConfig,
    locks: ContextLockManager,
    collection_tx: watch::Sender<ContextCollection>,
    active_tx: watch::Sender<ActiveContextSet>,
}

impl ContextManager {
    /// Build a manager and bootstrap the session.
    ///
    /// The persisted current session is adopted when it can be loaded;
    /// otherwise a default session is created and remembered. The session's
    /// active story, character, and conversation are then reloaded.
    pub async fn open(store: Arc<dyn ContextStore>, config: ManagerConfig) -> ContextResult<Self> {
        let (collection_tx, _) = watch::channel(ContextCollection::default());
        let (active_tx, _) = watch::channel(ActiveContextSet::default());
        let manager = Self {
            store,
            config,
            locks: ContextLockManager::new(),
            collection_tx,
            active_tx,
        };
        manager.bootstrap_session().await?;
        Ok(manager)
    }

    async fn bootstrap_session(&self) -> ContextResult<()> {
        let adopted = match self.store.current_session_id().await? {
            Some(id) => match self.store.load(&id, ContextType::Session).await {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(session = %id, error = %e, "Persisted session unavailable, starting a new one");
                    None
                }
            },
            None => None,
        };

        let session = match adopted {
            Some(session) => {
                info!(session = %session.id, "Adopted persisted session");
                session
            }
            None => {
                let ts = now();
                let session = Context::new(
                    ContextId::generate(),
                    ContextData::Session(SessionData {
                        workspace: WorkspaceState {
                            layout: self.config.default_layout.clone(),
                            ..Default::default()
                        },
                        started_at: Some(ts),
                        ..Default::default()
                    }),
                    vec![],
                    ts,
                );
                self.store.save(&session).await?;
                self.store.set_current_session_id(&session.id).await?;
                info!(session = %session.id, "Created default session");
                session
            }
        };

        self.mirror(&session);
        let session_id = session.id.clone();
        self.active_tx.send_modify(|active| active.session = Some(session_id));

        if let ContextData::Session(data) = &session.data {
            let restore = [
                (ContextType::Story, data.active_story_id.as_ref()),
                (ContextType::Character, data.active_character_id.as_ref()),
                (ContextType::Conversation, data.active_conversation_id.as_ref()),
            ];
            for (context_type, id) in restore {
                let Some(id) = id else { continue };
                match self.load_context(id, context_type).await {
                    Ok(_) => self.active_tx.send_modify(|active| {
                        if let Some(slot) = active.slot_mut(context_type) {
                            *slot = Some(id.clone());
                        }
                    }),
                    Err(e) => warn!(id = %id, %context_type, error = %e, "Could not restore active context"),
                }
            }
        }
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Snapshot of the live collection
    pub fn collection(&self) -> ContextCollection {
        self.collection_tx.borrow().clone()
    }

    /// Snapshot of the active ids
    pub fn active(&self) -> ActiveContextSet {
        self.active_tx.borrow().clone()
    }

    pub fn subscribe_collection(&self) -> watch::Receiver<ContextCollection> {
        self.collection_tx.subscribe()
    }

    pub fn subscribe_active(&self) -> watch::Receiver<ActiveContextSet> {
        self.active_tx.subscribe()
    }

    pub fn stats(&self) -> StorageStats {
        self.store.stats()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<StorageStats> {
        self.store.subscribe_stats()
    }

    /// Id of the adopted session
    pub fn session_id(&self) -> Option<ContextId> {
        self.active_tx.borrow().session.clone()
    }

    fn mirror(&self, context: &Context) {
        let context = context.clone();
        self.collection_tx.send_modify(|collection| collection.insert(context));
    }

    /// Create a version-1 context on a single active "Main" branch.
    #[instrument(skip(self, data, options), fields(context_type = %data.context_type()))]
    pub async fn create_context(
        &self,
        data: ContextData,
        options: CreateOptions,
    ) -> ContextResult<Context> {
        let context = Context::new(ContextId::generate(), data, options.tags, now());
        context.validate()?;
        self.store.save(&context).await?;
        self.mirror(&context);
        debug!(id = %context.id, "Created context");
        Ok(context)
    }

    /// Load from the store and replace whatever memory holds for that id.
    pub async fn load_context(&self, id: &ContextId, context_type: ContextType) -> ContextResult<Context> {
        let context = self.store.load(id, context_type).await?;
        self.mirror(&context);
        Ok(context)
    }

    /// Shallow-merge a patch over the stored record, bumping its version.
    pub async fn update_context(
        &self,
        id: &ContextId,
        context_type: ContextType,
        patch: ContextPatch,
    ) -> ContextResult<Context> {
        self.modify(id, context_type, None, |current| patch.apply(current, now()))
            .await
    }

    /// Like `update_context`, but fail with `MergeConflict` unless the stored
    /// version equals `expected_version`.
    pub async fn update_context_if_version(
        &self,
        id: &ContextId,
        context_type: ContextType,
        expected_version: u64,
        patch: ContextPatch,
    ) -> ContextResult<Context> {
        self.modify(id, context_type, Some(expected_version), |current| {
            patch.apply(current, now())
        })
        .await
    }

    async fn modify<F>(
        &self,
        id: &ContextId,
        context_type: ContextType,
        expected_version: Option<u64>,
        change: F,
    ) -> ContextResult<Context>
    where
        F: FnOnce(&Context) -> ContextResult<Context>,
    {
        let guard = self.locks.acquire(id, context_type).await;
        let result = self.modify_locked(id, context_type, expected_version, change).await;
        drop(guard);
        self.locks.prune();
        result
    }

    async fn modify_locked<F>(
        &self,
        id: &ContextId,
        context_type: ContextType,
        expected_version: Option<u64>,
        change: F,
    ) -> ContextResult<Context>
    where
        F: FnOnce(&Context) -> ContextResult<Context>,
    {
        let current = self.store.load(id, context_type).await?;
        if let Some(expected) = expected_version {
            if current.version() != expected {
                return Err(ContextError::MergeConflict(format!(
                    "{} {} is at version {}, expected {}",
                    context_type,
                    id,
                    current.version(),
                    expected
                )));
            }
        }
        let next = change(&current)?;
        self.store.save(&next).await?;
        self.mirror(&next);
        debug!(%id, %context_type, version = next.version(), "Updated context");
        Ok(next)
    }

    /// Delete a context. The adopted session cannot be deleted.
    pub async fn delete_context(&self, id: &ContextId, context_type: ContextType) -> ContextResult<()> {
        if context_type == ContextType::Session && self.session_id().as_ref() == Some(id) {
            return Err(ContextError::ValidationFailure(format!(
                "session {} is in use and cannot be deleted",
                id
            )));
        }
        {
            let _guard = self.locks.acquire(id, context_type).await;
            self.store.delete(id, context_type).await?;
        }
        self.forget(id, context_type).await;
        self.locks.prune();
        debug!(%id, %context_type, "Deleted context");
        Ok(())
    }

    /// Drop a deleted context from memory and from any active slot.
    async fn forget(&self, id: &ContextId, context_type: ContextType) {
        self.collection_tx.send_modify(|collection| {
            collection.remove(id, context_type);
        });
        let was_active = self.active_tx.borrow().get(context_type) == Some(id);
        if was_active {
            self.active_tx
                .send_modify(|active| active.clear_if(id, context_type));
            self.persist_active_ids().await;
        }
    }

    /// Load every context of the query's type and apply its filters.
    pub async fn query_contexts(&self, query: &ContextQuery) -> ContextResult<Vec<Context>> {
        let summaries = self.store.list(Some(query.context_type)).await?;
        let mut contexts = Vec::with_capacity(summaries.len());
        for summary in summaries {
            match self.store.load(&summary.id, summary.context_type).await {
                Ok(context) => contexts.push(context),
                Err(e) if e.is_not_found() => {
                    debug!(id = %summary.id, "Context vanished during query");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(query.apply(contexts))
    }

    /// Select the current context of a type.
    ///
    /// Non-session selections are mirrored into the session record; failures
    /// of that write are logged, not returned.
    pub async fn set_active_context(&self, id: &ContextId, context_type: ContextType) -> ContextResult<()> {
        if context_type == ContextType::Server {
            return Err(ContextError::ValidationFailure(
                "server contexts cannot be made active".to_string(),
            ));
        }
        let held = self.collection_tx.borrow().get(id, context_type).is_some();
        if !held {
            self.load_context(id, context_type).await?;
        }
        self.active_tx.send_modify(|active| {
            if let Some(slot) = active.slot_mut(context_type) {
                *slot = Some(id.clone());
            }
        });

        if context_type == ContextType::Session {
            if let Err(e) = self.store.set_current_session_id(id).await {
                warn!(session = %id, error = %e, "Failed to persist current session id");
            }
        } else {
            self.persist_active_ids().await;
        }
        Ok(())
    }

    /// Write the active story, character, and conversation ids into the session.
    async fn persist_active_ids(&self) {
        let active = self.active();
        let Some(session_id) = active.session.clone() else {
            return;
        };
        let unchanged = match self.collection_tx.borrow().session.as_ref().map(|s| &s.data) {
            Some(ContextData::Session(data)) => {
                data.active_story_id == active.story
                    && data.active_character_id == active.character
                    && data.active_conversation_id == active.conversation
            }
            _ => false,
        };
        if unchanged {
            return;
        }

        let patch = ContextPatch::new()
            .set("active_story_id", &active.story)
            .and_then(|p| p.set("active_character_id", &active.character))
            .and_then(|p| p.set("active_conversation_id", &active.conversation));
        let result = match patch {
            Ok(patch) => self
                .update_context(&session_id, ContextType::Session, patch)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(session = %session_id, error = %e, "Failed to mirror active contexts into session");
        }
    }

    /// Add an inactive branch to a context.
    pub async fn create_branch(
        &self,
        id: &ContextId,
        context_type: ContextType,
        name: &str,
    ) -> ContextResult<Branch> {
        if name.trim().is_empty() {
            return Err(ContextError::ValidationFailure(
                "branch name cannot be empty".to_string(),
            ));
        }
        let branch = Branch::named(name, now());
        let created = branch.clone();
        self.modify(id, context_type, None, move |current| {
            let mut branches = current.branches.clone();
            branches.push(branch);
            ContextPatch::new().set("branches", branches)?.apply(current, now())
        })
        .await?;
        Ok(created)
    }

    /// Make `branch_id` the current branch and the only active one.
    pub async fn switch_branch(
        &self,
        id: &ContextId,
        context_type: ContextType,
        branch_id: &str,
    ) -> ContextResult<Context> {
        self.modify(id, context_type, None, |current| {
            if current.branch(branch_id).is_none() {
                return Err(ContextError::ValidationFailure(format!(
                    "{} {} has no branch '{}'",
                    context_type, id, branch_id
                )));
            }
            let ts = now();
            let branches: Vec<Branch> = current
                .branches
                .iter()
                .map(|b| {
                    let is_active = b.id == branch_id;
                    Branch {
                        is_active,
                        last_active: if is_active { ts } else { b.last_active },
                        ..b.clone()
                    }
                })
                .collect();
            ContextPatch::new()
                .set("branches", branches)?
                .set("current_branch_id", branch_id)?
                .apply(current, ts)
        })
        .await
    }

    /// Migrate legacy chapter state and store it as the story's composition.
    ///
    /// A failed migration is returned as-is and writes nothing.
    pub async fn apply_migration(
        &self,
        story_id: &ContextId,
        legacy: &LegacyState,
        options: Option<&MigrationOptions>,
    ) -> ContextResult<MigrationResult> {
        let result = migrate(legacy, options.unwrap_or(&self.config.migration));
        let Some(state) = result.state.as_ref().filter(|_| result.success) else {
            warn!(story = %story_id, errors = ?result.errors, "Migration failed, story left unchanged");
            return Ok(result);
        };
        let report = validate_composed_state(state);
        if !report.valid {
            return Err(ContextError::ValidationFailure(report.errors.join("; ")));
        }
        let patch = ContextPatch::new().set("composition", state)?;
        self.update_context(story_id, ContextType::Story, patch).await?;
        info!(story = %story_id, phase = %state.current_phase, "Stored migrated composition");
        Ok(result)
    }

    /// Ask the collaborator for a reply and append prompt and reply to the
    /// conversation.
    pub async fn generate_reply(
        &self,
        conversation_id: &ContextId,
        prompt: &str,
        service: &dyn GenerationService,
    ) -> ContextResult<ChatMessage> {
        let conversation = self
            .store
            .load(conversation_id, ContextType::Conversation)
            .await?;
        let ContextData::Conversation(data) = &conversation.data else {
            return Err(ContextError::ValidationFailure(format!(
                "{} is not a conversation",
                conversation_id
            )));
        };
        let story = match self.store.load(&data.story_id, ContextType::Story).await?.data {
            ContextData::Story(story) => story,
            _ => {
                return Err(ContextError::ValidationFailure(format!(
                    "{} is not a story",
                    data.story_id
                )))
            }
        };

        let reply = service
            .generate_response(&story, prompt, &data.messages)
            .await?;

        let ts = now();
        let user = ChatMessage::new(MessageRole::User, prompt, ts);
        let assistant = ChatMessage::new(MessageRole::Assistant, reply, ts);
        let appended = assistant.clone();
        self.modify(conversation_id, ContextType::Conversation, None, move |current| {
            let ContextData::Conversation(data) = &current.data else {
                return Err(ContextError::ValidationFailure(format!(
                    "{} is not a conversation",
                    current.id
                )));
            };
            let mut messages = data.messages.clone();
            messages.push(user);
            messages.push(assistant);
            ContextPatch::new().set("messages", messages)?.apply(current, ts)
        })
        .await?;
        Ok(appended)
    }

    /// Replace a character's description with collaborator-expanded text.
    pub async fn flesh_out_character(
        &self,
        character_id: &ContextId,
        service: &dyn GenerationService,
    ) -> ContextResult<Context> {
        let character = self
            .store
            .load(character_id, ContextType::Character)
            .await?;
        let ContextData::Character(data) = &character.data else {
            return Err(ContextError::ValidationFailure(format!(
                "{} is not a character",
                character_id
            )));
        };
        let notes = if data.description.trim().is_empty() {
            data.name.as_str()
        } else {
            data.description.as_str()
        };
        let expanded = service.flesh_out(FleshOutKind::Character, notes).await?;
        let patch = ContextPatch::new().set("description", expanded)?;
        self.update_context(character_id, ContextType::Character, patch)
            .await
    }

    pub async fn history(&self, id: &ContextId, context_type: ContextType) -> ContextResult<Vec<Context>> {
        self.store.history(id, context_type).await
    }

    pub async fn export(&self, options: &ExportOptions) -> ContextResult<ExportBundle> {
        transfer::export(self.store.as_ref(), options, now()).await
    }

    /// Import a bundle and reload every written context into memory.
    ///
    /// Imported sessions other than the adopted one are stored but not
    /// mirrored, so the collection keeps holding the adopted session.
    pub async fn import(
        &self,
        bundle: &ExportBundle,
        options: &ImportOptions,
        resolver: Option<&dyn ConflictResolver>,
    ) -> ContextResult<ImportReport> {
        let report = transfer::import(self.store.as_ref(), bundle, options, resolver, now()).await?;
        let adopted = self.session_id();
        for entry in report.written() {
            if entry.context_type == ContextType::Session && adopted.as_ref() != Some(&entry.id) {
                debug!(session = %entry.id, "Stored imported session without adopting it");
                continue;
            }
            self.load_context(&entry.id, entry.context_type).await?;
        }
        Ok(report)
    }

    /// Remove contexts older than the retention window. Active contexts and
    /// the adopted session are kept.
    pub async fn cleanup(&self) -> ContextResult<Vec<ContextSummary>> {
        let Some(days) = self.config.retention_days else {
            return Ok(Vec::new());
        };
        let active = self.active();
        let keep: Vec<ContextId> = [
            active.session,
            active.story,
            active.character,
            active.conversation,
        ]
        .into_iter()
        .flatten()
        .collect();

        let removed = self
            .store
            .cleanup(chrono::Duration::days(i64::from(days)), now(), &keep)
            .await?;
        for summary in &removed {
            self.collection_tx.send_modify(|collection| {
                collection.remove(&summary.id, summary.context_type);
            });
        }
        self.locks.prune();
        info!(removed = removed.len(), retention_days = days, "Cleaned up stale contexts");
        Ok(removed)
    }
}
