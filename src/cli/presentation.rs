//! CLI presentation: text and json formatters per command family.

mod context;
mod transfer;

pub use context::{
    context_label, format_context_json, format_section_heading, format_status_json,
    format_status_text, format_summaries_json, format_summaries_text,
};
pub use transfer::{format_cleanup, format_import_report, format_migration_result};
