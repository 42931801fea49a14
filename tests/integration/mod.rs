//! Integration tests for the plotweave context store

mod cli_commands;
mod config_integration;
mod manager_lifecycle;
mod migration_integration;
mod store_integration;
mod test_utils;
mod transfer_roundtrip;
