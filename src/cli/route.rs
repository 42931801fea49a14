//! CLI route: single route table and run context. Dispatches to the context
//! manager, transfer, and migration services, then to presentation.

use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{
    format_cleanup, format_context_json, format_import_report, format_migration_result,
    format_status_json, format_status_text, format_summaries_json, format_summaries_text,
};
use crate::cli::prompt::DialoguerResolver;
use crate::config::{ConfigLoader, PlotweaveConfig};
use crate::manager::ContextManager;
use crate::migration::{migrate, LegacyState, MigrationOptions, PhaseKind};
use crate::store::{ContextStore, SledContextStore};
use crate::transfer::{
    ConflictResolver, ExportBundle, ExportOptions, ImportOptions, MergeStrategy,
};
use crate::types::{ContextId, ContextType};
use anyhow::Context as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runtime context for CLI execution: loaded config and an open manager.
pub struct RunContext {
    config: PlotweaveConfig,
    manager: ContextManager,
    store_path: PathBuf,
}

impl RunContext {
    /// Load config, open the store, and bootstrap the session.
    pub async fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        store_override: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let mut config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        if let Some(path) = store_override {
            config.storage.path = path;
        }
        config.resolve_paths(&workspace_root);

        let store_path = config.storage.path.clone();
        std::fs::create_dir_all(&store_path).with_context(|| {
            format!("Failed to create store directory {}", store_path.display())
        })?;
        let store = SledContextStore::open(&store_path, config.storage.store_options())
            .with_context(|| format!("Failed to open store at {}", store_path.display()))?;
        let store: Arc<dyn ContextStore> = Arc::new(store);
        let manager = ContextManager::open(store, config.manager_config()).await?;
        debug!(store = %store_path.display(), "Run context ready");

        Ok(Self {
            config,
            manager,
            store_path,
        })
    }

    pub fn manager(&self) -> &ContextManager {
        &self.manager
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Execute a CLI command via the single route table. The store is
    /// flushed whether or not the command succeeded.
    pub async fn execute(&self, command: &Commands) -> anyhow::Result<String> {
        let started = Instant::now();
        let result = self.execute_inner(command).await;
        self.manager
            .store()
            .flush()
            .await
            .context("Failed to flush store")?;
        info!(
            command = command.name(),
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    async fn execute_inner(&self, command: &Commands) -> anyhow::Result<String> {
        match command {
            Commands::Status { format } => self.handle_status(*format).await,
            Commands::List {
                context_type,
                tags,
                format,
            } => self.handle_list(*context_type, tags, *format).await,
            Commands::Show {
                context_type,
                id,
                history,
            } => self.handle_show(*context_type, id, *history).await,
            Commands::Export {
                output,
                types,
                no_history,
                no_branches,
            } => {
                let options = ExportOptions {
                    context_types: (!types.is_empty()).then(|| types.clone()),
                    include_history: !*no_history,
                    include_branches: !*no_branches,
                };
                self.handle_export(&options, output.as_deref()).await
            }
            Commands::Import {
                file,
                strategy,
                fresh_ids,
                no_backup,
                backup_file,
                no_validate,
            } => {
                let options = ImportOptions {
                    merge_strategy: *strategy,
                    preserve_ids: !*fresh_ids,
                    create_backup: !*no_backup,
                    validate: !*no_validate,
                };
                self.handle_import(file, &options, backup_file.as_deref())
                    .await
            }
            Commands::Migrate {
                story_id,
                legacy_file,
                default_phase,
                keep_ids,
                dry_run,
            } => {
                self.handle_migrate(story_id, legacy_file, *default_phase, *keep_ids, *dry_run)
                    .await
            }
            Commands::Cleanup => {
                let removed = self.manager.cleanup().await?;
                Ok(format_cleanup(&removed, self.config.storage.retention_days))
            }
        }
    }

    async fn handle_status(&self, format: OutputFormat) -> anyhow::Result<String> {
        let session = match self.manager.session_id() {
            Some(id) => Some(self.manager.load_context(&id, ContextType::Session).await?),
            None => None,
        };
        let active = self.manager.active();
        let stats = self.manager.stats();
        Ok(match format {
            OutputFormat::Text => format_status_text(session.as_ref(), &active, &stats),
            OutputFormat::Json => format_status_json(session.as_ref(), &active, &stats)?,
        })
    }

    async fn handle_list(
        &self,
        context_type: Option<ContextType>,
        tags: &[String],
        format: OutputFormat,
    ) -> anyhow::Result<String> {
        let mut summaries = self.manager.store().list(context_type).await?;
        if !tags.is_empty() {
            summaries.retain(|s| s.tags.iter().any(|t| tags.contains(t)));
        }
        Ok(match format {
            OutputFormat::Text => format_summaries_text(&summaries),
            OutputFormat::Json => format_summaries_json(&summaries)?,
        })
    }

    async fn handle_show(
        &self,
        context_type: ContextType,
        id: &str,
        with_history: bool,
    ) -> anyhow::Result<String> {
        let id = ContextId::new(id);
        let context = self.manager.store().load(&id, context_type).await?;
        let history = if with_history {
            Some(self.manager.history(&id, context_type).await?)
        } else {
            None
        };
        Ok(format_context_json(&context, history.as_deref())?)
    }

    async fn handle_export(
        &self,
        options: &ExportOptions,
        output: Option<&Path>,
    ) -> anyhow::Result<String> {
        let bundle = self.manager.export(options).await?;
        let json = bundle.to_json()?;
        match output {
            Some(path) => {
                std::fs::write(path, &json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                Ok(format!(
                    "Exported {} context(s) to {}",
                    bundle.metadata.context_count,
                    path.display()
                ))
            }
            None => Ok(json),
        }
    }

    async fn handle_import(
        &self,
        file: &Path,
        options: &ImportOptions,
        backup_file: Option<&Path>,
    ) -> anyhow::Result<String> {
        let json = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let bundle = ExportBundle::from_json(&json)
            .with_context(|| format!("{} is not an export bundle", file.display()))?;

        let prompt = DialoguerResolver;
        let resolver: Option<&dyn ConflictResolver> =
            if options.merge_strategy == MergeStrategy::AskUser {
                Some(&prompt)
            } else {
                None
            };
        let report = self
            .manager
            .import(&bundle, options, resolver)
            .await
            .context("Import failed")?;

        let backup_path = match &report.backup {
            Some(backup) => {
                let path = backup_file.map(Path::to_path_buf).unwrap_or_else(|| {
                    self.store_path.join(format!(
                        "backup-{}.json",
                        backup.exported_at.format("%Y%m%dT%H%M%S")
                    ))
                });
                std::fs::write(&path, backup.to_json()?)
                    .with_context(|| format!("Failed to write backup {}", path.display()))?;
                Some(path)
            }
            None => None,
        };
        Ok(format_import_report(&report, backup_path.as_deref()))
    }

    async fn handle_migrate(
        &self,
        story_id: &str,
        legacy_file: &Path,
        default_phase: Option<PhaseKind>,
        keep_ids: bool,
        dry_run: bool,
    ) -> anyhow::Result<String> {
        let json = std::fs::read_to_string(legacy_file)
            .with_context(|| format!("Failed to read {}", legacy_file.display()))?;
        let legacy: LegacyState = serde_json::from_str(&json)
            .with_context(|| format!("{} is not legacy chapter state", legacy_file.display()))?;

        let base = &self.config.migration;
        let options = MigrationOptions {
            default_phase: default_phase.unwrap_or(base.default_phase),
            generate_new_ids: base.generate_new_ids && !keep_ids,
        };

        if dry_run {
            let result = migrate(&legacy, &options);
            return Ok(format_migration_result(&result, false));
        }
        let story_id = ContextId::new(story_id);
        let result = self
            .manager
            .apply_migration(&story_id, &legacy, Some(&options))
            .await?;
        let stored = result.success;
        Ok(format_migration_result(&result, stored))
    }
}
