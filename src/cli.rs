//! CLI domain: parse, route, prompt, output, and presentation only.
//! No domain orchestration; single route table dispatches to the manager.

mod output;
mod parse;
mod presentation;
mod prompt;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{
    context_label, format_cleanup, format_context_json, format_import_report,
    format_migration_result, format_section_heading, format_status_json, format_status_text,
    format_summaries_json, format_summaries_text,
};
pub use prompt::DialoguerResolver;
pub use route::RunContext;
