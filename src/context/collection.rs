//! Live in-memory view of loaded contexts.

use crate::context::record::Context;
use crate::types::{ContextId, ContextType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of every context the manager currently holds.
///
/// Keys in each map always equal the `id` of the stored context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextCollection {
    pub session: Option<Context>,
    pub server: Option<Context>,
    pub stories: BTreeMap<ContextId, Context>,
    pub characters: BTreeMap<ContextId, Context>,
    pub conversations: BTreeMap<ContextId, Context>,
}

/// Where a context type lives inside the collection
pub enum Slot<'a> {
    Singleton(&'a mut Option<Context>),
    Keyed(&'a mut BTreeMap<ContextId, Context>),
}

impl ContextCollection {
    pub fn slot_mut(&mut self, context_type: ContextType) -> Slot<'_> {
        match context_type {
            ContextType::Session => Slot::Singleton(&mut self.session),
            ContextType::Server => Slot::Singleton(&mut self.server),
            ContextType::Story => Slot::Keyed(&mut self.stories),
            ContextType::Character => Slot::Keyed(&mut self.characters),
            ContextType::Conversation => Slot::Keyed(&mut self.conversations),
        }
    }

    /// Insert or replace a context (last write wins).
    pub fn insert(&mut self, context: Context) {
        match self.slot_mut(context.context_type()) {
            Slot::Singleton(slot) => *slot = Some(context),
            Slot::Keyed(map) => {
                map.insert(context.id.clone(), context);
            }
        }
    }

    /// Remove a context by id. Singletons are cleared only when the id matches.
    pub fn remove(&mut self, id: &ContextId, context_type: ContextType) -> Option<Context> {
        match self.slot_mut(context_type) {
            Slot::Singleton(slot) => {
                if slot.as_ref().is_some_and(|c| &c.id == id) {
                    slot.take()
                } else {
                    None
                }
            }
            Slot::Keyed(map) => map.remove(id),
        }
    }

    pub fn get(&self, id: &ContextId, context_type: ContextType) -> Option<&Context> {
        match context_type {
            ContextType::Session => self.session.as_ref().filter(|c| &c.id == id),
            ContextType::Server => self.server.as_ref().filter(|c| &c.id == id),
            ContextType::Story => self.stories.get(id),
            ContextType::Character => self.characters.get(id),
            ContextType::Conversation => self.conversations.get(id),
        }
    }

    pub fn len(&self) -> usize {
        self.session.iter().count()
            + self.server.iter().count()
            + self.stories.len()
            + self.characters.len()
            + self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All held contexts, singletons first.
    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.session
            .iter()
            .chain(self.server.iter())
            .chain(self.stories.values())
            .chain(self.characters.values())
            .chain(self.conversations.values())
    }
}

/// Currently selected context id per type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveContextSet {
    pub session: Option<ContextId>,
    pub story: Option<ContextId>,
    pub character: Option<ContextId>,
    pub conversation: Option<ContextId>,
}

impl ActiveContextSet {
    /// Mutable slot for a type; `None` for types without an active selection.
    pub fn slot_mut(&mut self, context_type: ContextType) -> Option<&mut Option<ContextId>> {
        match context_type {
            ContextType::Session => Some(&mut self.session),
            ContextType::Story => Some(&mut self.story),
            ContextType::Character => Some(&mut self.character),
            ContextType::Conversation => Some(&mut self.conversation),
            ContextType::Server => None,
        }
    }

    pub fn get(&self, context_type: ContextType) -> Option<&ContextId> {
        match context_type {
            ContextType::Session => self.session.as_ref(),
            ContextType::Story => self.story.as_ref(),
            ContextType::Character => self.character.as_ref(),
            ContextType::Conversation => self.conversation.as_ref(),
            ContextType::Server => None,
        }
    }

    /// Forget any selection pointing at a deleted context.
    pub fn clear_if(&mut self, id: &ContextId, context_type: ContextType) {
        if let Some(slot) = self.slot_mut(context_type) {
            if slot.as_ref() == Some(id) {
                *slot = None;
            }
        }
    }
}
