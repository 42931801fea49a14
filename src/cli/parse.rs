//! CLI parse: clap types for plotweave. No behavior; definitions only.

use crate::migration::PhaseKind;
use crate::transfer::MergeStrategy;
use crate::types::ContextType;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// plotweave - story context store
#[derive(Parser)]
#[command(name = "plotweave")]
#[command(about = "Inspect, export, import, and migrate plotweave story contexts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides storage.path)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the current session, active contexts, and storage usage
    Status {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List stored contexts
    List {
        /// Only list one context type
        #[arg(long = "type")]
        context_type: Option<ContextType>,
        /// Only contexts carrying any of these tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show one context as JSON
    Show {
        context_type: ContextType,
        id: String,
        /// Include prior versions
        #[arg(long)]
        history: bool,
    },
    /// Write an export bundle
    Export {
        /// Destination file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Only export these context types
        #[arg(long = "type", value_delimiter = ',')]
        types: Vec<ContextType>,
        /// Leave out version history
        #[arg(long)]
        no_history: bool,
        /// Export only each context's current branch
        #[arg(long)]
        no_branches: bool,
    },
    /// Import an export bundle
    Import {
        file: PathBuf,
        /// overwrite, deep_merge, shallow_merge, keep_both, or ask_user
        #[arg(long, default_value = "overwrite")]
        strategy: MergeStrategy,
        /// Give every imported context a fresh id
        #[arg(long)]
        fresh_ids: bool,
        /// Skip the pre-import backup
        #[arg(long)]
        no_backup: bool,
        /// Where to write the pre-import backup
        #[arg(long)]
        backup_file: Option<PathBuf>,
        /// Skip checksum and record validation
        #[arg(long)]
        no_validate: bool,
    },
    /// Migrate legacy chapter state into a story's composition
    Migrate {
        story_id: String,
        /// Legacy state JSON file
        legacy_file: PathBuf,
        /// Phase used when nothing in the legacy state implies another
        #[arg(long)]
        default_phase: Option<PhaseKind>,
        /// Reuse legacy ids instead of generating new ones
        #[arg(long)]
        keep_ids: bool,
        /// Print the migration log without storing the result
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove contexts older than storage.retention_days
    Cleanup,
}

impl Commands {
    /// Command name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Status { .. } => "status",
            Commands::List { .. } => "list",
            Commands::Show { .. } => "show",
            Commands::Export { .. } => "export",
            Commands::Import { .. } => "import",
            Commands::Migrate { .. } => "migrate",
            Commands::Cleanup => "cleanup",
        }
    }
}
