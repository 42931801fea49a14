//! Partial updates.
//!
//! A patch is a set of top-level fields merged shallowly over the serialized
//! record: a key present in the patch replaces the whole stored value for that
//! key, nested objects included. The merged record must still deserialize as
//! the same context type and pass `Context::validate`.

use crate::context::record::Context;
use crate::error::{ContextError, ContextResult};
use crate::types::Timestamp;
use serde::Serialize;
use serde_json::{Map, Value};

/// Header keys that can never be patched
const IMMUTABLE_KEYS: &[&str] = &["id", "type"];
/// The only metadata field callers may set; the rest is owned by the update path
const PATCHABLE_METADATA_KEYS: &[&str] = &["tags"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    fields: Map<String, Value>,
}

impl ContextPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a top-level field to any serializable value.
    pub fn set(mut self, key: impl Into<String>, value: impl Serialize) -> ContextResult<Self> {
        let value = serde_json::to_value(value)?;
        self.fields.insert(key.into(), value);
        Ok(self)
    }

    /// Set a top-level field to a raw JSON value.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn tags(self, tags: Vec<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert(
            "tags".to_string(),
            Value::Array(tags.into_iter().map(Value::String).collect()),
        );
        self.with("metadata", Value::Object(metadata))
    }

    pub fn from_value(value: Value) -> ContextResult<Self> {
        match value {
            Value::Object(fields) => Ok(ContextPatch { fields }),
            other => Err(ContextError::ValidationFailure(format!(
                "patch must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Merge this patch over `current`, bumping the version by one and
    /// stamping `updated_at`.
    pub fn apply(&self, current: &Context, now: Timestamp) -> ContextResult<Context> {
        let mut record = match serde_json::to_value(current)? {
            Value::Object(map) => map,
            _ => {
                return Err(ContextError::ValidationFailure(
                    "context did not serialize to an object".to_string(),
                ))
            }
        };

        for (key, value) in &self.fields {
            if IMMUTABLE_KEYS.contains(&key.as_str()) {
                return Err(ContextError::ValidationFailure(format!(
                    "field '{}' cannot be updated",
                    key
                )));
            }
            if key == "metadata" {
                merge_metadata(&mut record, value)?;
                continue;
            }
            record.insert(key.clone(), value.clone());
        }

        let mut next: Context = serde_json::from_value(Value::Object(record)).map_err(|e| {
            ContextError::ValidationFailure(format!("patched {} is malformed: {}", current.id, e))
        })?;
        if next.context_type() != current.context_type() {
            return Err(ContextError::ValidationFailure(format!(
                "patch changed the type of {}",
                current.id
            )));
        }

        next.metadata.version = current.metadata.version + 1;
        next.metadata.created_at = current.metadata.created_at;
        next.metadata.updated_at = now.max(current.metadata.created_at);
        next.validate()?;
        Ok(next)
    }
}

fn merge_metadata(record: &mut Map<String, Value>, patch: &Value) -> ContextResult<()> {
    let Value::Object(patch) = patch else {
        return Err(ContextError::ValidationFailure(
            "metadata patch must be an object".to_string(),
        ));
    };
    let Some(Value::Object(metadata)) = record.get_mut("metadata") else {
        return Err(ContextError::ValidationFailure(
            "stored context has no metadata".to_string(),
        ));
    };
    for (key, value) in patch {
        if !PATCHABLE_METADATA_KEYS.contains(&key.as_str()) {
            return Err(ContextError::ValidationFailure(format!(
                "metadata.{} is managed by the store",
                key
            )));
        }
        metadata.insert(key.clone(), value.clone());
    }
    Ok(())
}
