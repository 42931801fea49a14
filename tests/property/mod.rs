//! Property-based tests for record versioning and query filtering

mod query_filters;
mod version_monotonic;
