//! Error types for the plotweave context store.

use crate::types::{ContextId, ContextType};
use thiserror::Error;

/// Storage-related errors raised inside a store backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {context_type}:{id}")]
    RecordNotFound {
        context_type: ContextType,
        id: ContextId,
    },

    #[error("Storage quota exceeded: {required} bytes required, {quota} bytes allowed")]
    QuotaExceeded { required: u64, quota: u64 },

    #[error("Corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced by the store, manager, and transfer boundaries.
///
/// Every public operation returns one of these instead of panicking; the
/// `Display` text is the human-readable failure message.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("{context_type} context not found: {id}")]
    NotFound {
        context_type: ContextType,
        id: ContextId,
    },

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    #[error("Merge conflict: {0}")]
    MergeConflict(String),
}

impl From<StorageError> for ContextError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::RecordNotFound { context_type, id } => {
                ContextError::NotFound { context_type, id }
            }
            other => ContextError::StorageFailure(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ContextError {
    fn from(err: serde_json::Error) -> Self {
        ContextError::ValidationFailure(err.to_string())
    }
}

impl ContextError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContextError::NotFound { .. })
    }
}

/// Failures raised while running a migration step.
///
/// These never escape `migrate`; they are folded into the result's error list.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Unknown phase '{0}' on legacy feedback item")]
    UnknownPhase(String),

    #[error("Unknown priority '{0}' on legacy feedback item")]
    UnknownPriority(String),

    #[error("Phase {0} missing from skeleton")]
    MissingPhase(String),
}

/// Errors reported by a generation collaborator
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation backend unavailable: {0}")]
    Unavailable(String),

    #[error("Generation request rejected: {0}")]
    Rejected(String),
}

/// A rejected request is a problem with the input; an unreachable backend is
/// reported like any other failed I/O.
impl From<GenerationError> for ContextError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Rejected(_) => ContextError::ValidationFailure(err.to_string()),
            GenerationError::Unavailable(_) => ContextError::StorageFailure(err.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

pub type ContextResult<T> = Result<T, ContextError>;
