//! Export and import of context bundles
//!
//! A bundle is a self-describing JSON document holding full context records,
//! optionally with their version history. Its `checksum` is the blake3 digest
//! of the serialized `contexts` array. Compression is not supported: exported
//! bundles always say `compressed: false` and bundles claiming otherwise are
//! rejected.

use crate::context::{Branch, Context, ContextPatch};
use crate::error::{ContextError, ContextResult};
use crate::store::ContextStore;
use crate::types::{ContextId, ContextType, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Bundle format written by this release
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Header fields owned by the record itself, never merged from a payload
const HEADER_KEYS: &[&str] = &["id", "type", "metadata", "branches", "current_branch_id"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedContext {
    pub context_type: ContextType,
    pub data: Context,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_history: Option<Vec<Context>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<Branch>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub total_size: u64,
    pub context_count: usize,
    pub includes_history: bool,
    pub includes_branches: bool,
    pub compressed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub format_version: String,
    pub exported_at: Timestamp,
    pub contexts: Vec<ExportedContext>,
    pub metadata: ExportMetadata,
    pub checksum: String,
}

impl ExportBundle {
    fn new(contexts: Vec<ExportedContext>, options: &ExportOptions, now: Timestamp) -> ContextResult<Self> {
        let total_size = contexts
            .iter()
            .map(|c| serde_json::to_vec(&c.data).map(|v| v.len() as u64))
            .sum::<Result<u64, _>>()?;
        let checksum = checksum_of(&contexts)?;
        Ok(ExportBundle {
            format_version: EXPORT_FORMAT_VERSION.to_string(),
            exported_at: now,
            metadata: ExportMetadata {
                total_size,
                context_count: contexts.len(),
                includes_history: options.include_history,
                includes_branches: options.include_branches,
                compressed: false,
            },
            contexts,
            checksum,
        })
    }

    pub fn to_json(&self) -> ContextResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ContextResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ContextError::ValidationFailure(format!("unreadable bundle: {}", e)))
    }

    /// Reject bundles this release cannot read.
    pub fn check_format(&self) -> ContextResult<()> {
        if self.format_version != EXPORT_FORMAT_VERSION {
            return Err(ContextError::ValidationFailure(format!(
                "unsupported bundle format {}",
                self.format_version
            )));
        }
        if self.metadata.compressed {
            return Err(ContextError::ValidationFailure(
                "compressed bundles are not supported".to_string(),
            ));
        }
        Ok(())
    }

    /// Full integrity check: format, checksum, counts, and every record.
    pub fn verify(&self) -> ContextResult<()> {
        self.check_format()?;
        let actual = checksum_of(&self.contexts)?;
        if actual != self.checksum {
            return Err(ContextError::ValidationFailure(format!(
                "checksum mismatch: bundle says {}, contents hash to {}",
                self.checksum, actual
            )));
        }
        if self.metadata.context_count != self.contexts.len() {
            return Err(ContextError::ValidationFailure(format!(
                "bundle lists {} contexts but holds {}",
                self.metadata.context_count,
                self.contexts.len()
            )));
        }
        for entry in &self.contexts {
            if entry.data.context_type() != entry.context_type {
                return Err(ContextError::ValidationFailure(format!(
                    "entry {} is tagged {} but holds a {} record",
                    entry.data.id,
                    entry.context_type,
                    entry.data.context_type()
                )));
            }
            entry.data.validate()?;
            for prior in entry.version_history.iter().flatten() {
                prior.validate()?;
            }
        }
        Ok(())
    }
}

fn checksum_of(contexts: &[ExportedContext]) -> ContextResult<String> {
    let bytes = serde_json::to_vec(contexts)?;
    Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportOptions {
    /// Only export these types; all types when `None`
    pub context_types: Option<Vec<ContextType>>,
    pub include_history: bool,
    /// When false, each record is exported with only its current branch
    pub include_branches: bool,
}

impl ExportOptions {
    pub fn full() -> Self {
        ExportOptions {
            context_types: None,
            include_history: true,
            include_branches: true,
        }
    }
}

/// Serialize the store's records into a bundle
pub async fn export(
    store: &dyn ContextStore,
    options: &ExportOptions,
    now: Timestamp,
) -> ContextResult<ExportBundle> {
    let mut contexts = Vec::new();
    for summary in store.list(None).await? {
        if let Some(types) = &options.context_types {
            if !types.contains(&summary.context_type) {
                continue;
            }
        }
        let mut data = store.load(&summary.id, summary.context_type).await?;
        let branches = if options.include_branches {
            Some(data.branches.clone())
        } else {
            let current = data.current_branch_id.clone();
            data.branches.retain(|b| b.id == current);
            None
        };
        let version_history = if options.include_history {
            Some(store.history(&summary.id, summary.context_type).await?)
        } else {
            None
        };
        contexts.push(ExportedContext {
            context_type: summary.context_type,
            data,
            version_history,
            branches,
        });
    }
    let bundle = ExportBundle::new(contexts, options, now)?;
    info!(
        contexts = bundle.metadata.context_count,
        bytes = bundle.metadata.total_size,
        "Exported context bundle"
    );
    Ok(bundle)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Replace the stored record with the incoming one, version included
    #[default]
    Overwrite,
    /// Recursively merge incoming objects into the stored record
    DeepMerge,
    /// Replace stored top-level fields with incoming ones
    ShallowMerge,
    /// Store the incoming record under a fresh id
    KeepBoth,
    /// Ask a `ConflictResolver` per conflict
    AskUser,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeStrategy::Overwrite => "overwrite",
            MergeStrategy::DeepMerge => "deep_merge",
            MergeStrategy::ShallowMerge => "shallow_merge",
            MergeStrategy::KeepBoth => "keep_both",
            MergeStrategy::AskUser => "ask_user",
        };
        f.write_str(name)
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "overwrite" => Ok(MergeStrategy::Overwrite),
            "deep_merge" => Ok(MergeStrategy::DeepMerge),
            "shallow_merge" => Ok(MergeStrategy::ShallowMerge),
            "keep_both" => Ok(MergeStrategy::KeepBoth),
            "ask_user" => Ok(MergeStrategy::AskUser),
            other => Err(format!("unknown merge strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub merge_strategy: MergeStrategy,
    /// Keep bundle ids; otherwise every record gets a fresh id and references
    /// between imported records are rewritten
    pub preserve_ids: bool,
    /// Export the whole store into the report before writing anything
    pub create_backup: bool,
    /// Verify checksum and record invariants before writing anything
    pub validate: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            merge_strategy: MergeStrategy::Overwrite,
            preserve_ids: true,
            create_backup: true,
            validate: true,
        }
    }
}

/// Answer to an import conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepExisting,
    UseIncoming,
    DeepMerge,
    ShallowMerge,
    KeepBoth,
}

/// Decides conflicts for `MergeStrategy::AskUser`
pub trait ConflictResolver: Send + Sync {
    fn resolve(&self, existing: &Context, incoming: &Context) -> ContextResult<Resolution>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    Created,
    Overwritten,
    Merged,
    Duplicated,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEntry {
    pub context_type: ContextType,
    /// Id in the bundle
    pub source_id: ContextId,
    /// Id in the store after import
    pub id: ContextId,
    pub outcome: ImportOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub entries: Vec<ImportEntry>,
    pub backup: Option<ExportBundle>,
}

impl ImportReport {
    pub fn count(&self, outcome: ImportOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    /// Entries that changed the store
    pub fn written(&self) -> impl Iterator<Item = &ImportEntry> {
        self.entries
            .iter()
            .filter(|e| e.outcome != ImportOutcome::Skipped)
    }
}

/// Write a bundle's records into the store
pub async fn import(
    store: &dyn ContextStore,
    bundle: &ExportBundle,
    options: &ImportOptions,
    resolver: Option<&dyn ConflictResolver>,
    now: Timestamp,
) -> ContextResult<ImportReport> {
    bundle.check_format()?;
    if options.validate {
        bundle.verify()?;
    }
    if options.merge_strategy == MergeStrategy::AskUser && resolver.is_none() {
        return Err(ContextError::MergeConflict(
            "ask_user strategy needs a conflict resolver".to_string(),
        ));
    }

    let mut report = ImportReport::default();
    if options.create_backup {
        report.backup = Some(export(store, &ExportOptions::full(), now).await?);
    }

    let id_map = if options.preserve_ids {
        BTreeMap::new()
    } else {
        bundle
            .contexts
            .iter()
            .map(|entry| (entry.data.id.clone(), ContextId::generate()))
            .collect()
    };

    for entry in &bundle.contexts {
        let source_id = entry.data.id.clone();
        let incoming = prepare_incoming(entry, &id_map);
        let history: Vec<Context> = entry
            .version_history
            .iter()
            .flatten()
            .map(|prior| relabel(prior, &incoming.id, &id_map))
            .collect();

        let existing = match store.load(&incoming.id, incoming.context_type()).await {
            Ok(existing) => Some(existing),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let (id, outcome) = match existing {
            None => {
                save_with_history(store, &incoming, &history).await?;
                (incoming.id.clone(), ImportOutcome::Created)
            }
            Some(existing) => {
                let resolution = match options.merge_strategy {
                    MergeStrategy::Overwrite => Resolution::UseIncoming,
                    MergeStrategy::DeepMerge => Resolution::DeepMerge,
                    MergeStrategy::ShallowMerge => Resolution::ShallowMerge,
                    MergeStrategy::KeepBoth => Resolution::KeepBoth,
                    MergeStrategy::AskUser => match resolver {
                        Some(resolver) => resolver.resolve(&existing, &incoming)?,
                        None => {
                            return Err(ContextError::MergeConflict(format!(
                                "{} {} already exists",
                                existing.context_type(),
                                existing.id
                            )))
                        }
                    },
                };
                apply_resolution(store, resolution, &existing, incoming, &history, now).await?
            }
        };
        debug!(source = %source_id, id = %id, ?outcome, "Imported context");
        report.entries.push(ImportEntry {
            context_type: entry.context_type,
            source_id,
            id,
            outcome,
        });
    }

    info!(
        created = report.count(ImportOutcome::Created),
        overwritten = report.count(ImportOutcome::Overwritten),
        merged = report.count(ImportOutcome::Merged),
        duplicated = report.count(ImportOutcome::Duplicated),
        skipped = report.count(ImportOutcome::Skipped),
        "Imported context bundle"
    );
    Ok(report)
}

fn prepare_incoming(entry: &ExportedContext, id_map: &BTreeMap<ContextId, ContextId>) -> Context {
    let mut incoming = entry.data.clone();
    if let Some(branches) = &entry.branches {
        if branches.iter().any(|b| b.id == incoming.current_branch_id) {
            incoming.branches = branches.clone();
        } else {
            warn!(id = %incoming.id, "Ignoring branch list without the current branch");
        }
    }
    let id = id_map
        .get(&incoming.id)
        .cloned()
        .unwrap_or_else(|| incoming.id.clone());
    relabel(&incoming, &id, id_map)
}

fn relabel(context: &Context, id: &ContextId, id_map: &BTreeMap<ContextId, ContextId>) -> Context {
    let mut out = context.clone();
    out.id = id.clone();
    if !id_map.is_empty() {
        out.data.remap_refs(id_map);
    }
    out
}

async fn save_with_history(
    store: &dyn ContextStore,
    context: &Context,
    history: &[Context],
) -> ContextResult<()> {
    for prior in history.iter().filter(|p| p.version() < context.version()) {
        store.save(prior).await?;
    }
    store.save(context).await
}

async fn apply_resolution(
    store: &dyn ContextStore,
    resolution: Resolution,
    existing: &Context,
    incoming: Context,
    history: &[Context],
    now: Timestamp,
) -> ContextResult<(ContextId, ImportOutcome)> {
    match resolution {
        Resolution::KeepExisting => Ok((existing.id.clone(), ImportOutcome::Skipped)),
        Resolution::UseIncoming => {
            store.save(&incoming).await?;
            Ok((incoming.id, ImportOutcome::Overwritten))
        }
        Resolution::ShallowMerge => {
            let merged = shallow_merge(existing, &incoming, now)?;
            store.save(&merged).await?;
            Ok((merged.id, ImportOutcome::Merged))
        }
        Resolution::DeepMerge => {
            let merged = deep_merge(existing, &incoming, now)?;
            store.save(&merged).await?;
            Ok((merged.id, ImportOutcome::Merged))
        }
        Resolution::KeepBoth => {
            let mut copy = incoming;
            copy.id = ContextId::generate();
            let history: Vec<Context> = history
                .iter()
                .map(|prior| relabel(prior, &copy.id, &BTreeMap::new()))
                .collect();
            save_with_history(store, &copy, &history).await?;
            Ok((copy.id, ImportOutcome::Duplicated))
        }
    }
}

/// Incoming payload fields without the record header
fn payload_of(context: &Context) -> ContextResult<Map<String, Value>> {
    match serde_json::to_value(context)? {
        Value::Object(mut map) => {
            for key in HEADER_KEYS {
                map.remove(*key);
            }
            Ok(map)
        }
        _ => Err(ContextError::ValidationFailure(
            "context did not serialize to an object".to_string(),
        )),
    }
}

/// Replace stored top-level payload fields with incoming ones, through the
/// regular update path.
pub fn shallow_merge(existing: &Context, incoming: &Context, now: Timestamp) -> ContextResult<Context> {
    let mut patch = ContextPatch::from_value(Value::Object(payload_of(incoming)?))?;
    patch = patch.tags(union(&existing.metadata.tags, &incoming.metadata.tags));
    patch.apply(existing, now)
}

/// Recursively merge incoming payload objects into the stored record. Arrays
/// and scalars from the incoming side win; branches are unioned by id.
pub fn deep_merge(existing: &Context, incoming: &Context, now: Timestamp) -> ContextResult<Context> {
    let mut record = serde_json::to_value(existing)?;
    merge_values(&mut record, &Value::Object(payload_of(incoming)?));

    let mut merged: Context = serde_json::from_value(record).map_err(|e| {
        ContextError::ValidationFailure(format!("deep merge of {} is malformed: {}", existing.id, e))
    })?;
    for branch in &incoming.branches {
        if merged.branch(&branch.id).is_none() {
            merged.branches.push(Branch {
                is_active: false,
                ..branch.clone()
            });
        }
    }
    merged.metadata.tags = union(&existing.metadata.tags, &incoming.metadata.tags);
    merged.metadata.version = existing.metadata.version + 1;
    merged.metadata.created_at = existing.metadata.created_at;
    merged.metadata.updated_at = now.max(existing.metadata.created_at);
    merged.validate()?;
    Ok(merged)
}

fn merge_values(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, incoming) => *target = incoming.clone(),
    }
}

fn union(a: &[String], b: &[String]) -> Vec<String> {
    let mut out = a.to_vec();
    for tag in b {
        if !out.contains(tag) {
            out.push(tag.clone());
        }
    }
    out
}
