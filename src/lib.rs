//! Plotweave: Story Context Store
//!
//! Typed, versioned, branchable context records for a story-writing
//! assistant, persisted in sled, with bundle export/import and migration of
//! legacy chapter state.

pub mod cli;
pub mod concurrency;
pub mod config;
pub mod context;
pub mod error;
pub mod generation;
pub mod logging;
pub mod manager;
pub mod migration;
pub mod store;
pub mod transfer;
pub mod types;
