//! Tree-to-tree comparison of generated configuration.
//!
//! [`DiffOrchestrator::compare`] walks an old and a new build output,
//! buckets documents into sections by schema epoch, normalizes away volatile
//! build fields, diffs each document pair with a [`DiffProvider`] and feeds
//! the changes through the classifier. Results accumulate in a
//! [`CompareAccumulator`] owned by the call, so independent comparisons never
//! share state.
//!
//! ```no_run
//! use config_review::orchestrator::{CompareOptions, DiffOrchestrator};
//! use config_review::policy::PermissionTable;
//! use std::path::Path;
//!
//! let table = PermissionTable::stock();
//! let orchestrator = DiffOrchestrator::new(&table, CompareOptions::default());
//! let outcome = orchestrator.compare(Path::new("old/generated"), Path::new("new/generated"))?;
//! println!("approve: {}", outcome.verdict().should_approve);
//! # Ok::<(), config_review::errors::CompareError>(())
//! ```

mod epoch;
mod normalize;

pub use epoch::{detect_epoch, epoch_number, list_epochs, section_for};
pub use normalize::normalize;

use crate::aggregate::{
    AggregateVerdict, ChangeSummary, DocumentStatus, DocumentVerdict, SectionKey, SectionReport,
    aggregate,
};
use crate::classify::PatchClassifier;
use crate::errors::CompareError;
use crate::patch::{Change, ChangeKind, DiffProvider, StructuralDiff, split_pointer};
use crate::policy::PermissionTable;
use crate::review_config::CompareSection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Knobs for one comparison run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareOptions {
    /// Epoch to treat as current; detected from the new tree when `None`.
    pub current_epoch: Option<String>,
    pub volatile_fields: Vec<String>,
    pub extensions: Vec<String>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self::from(&CompareSection::default())
    }
}

impl From<&CompareSection> for CompareOptions {
    fn from(section: &CompareSection) -> Self {
        Self {
            current_epoch: section.current_epoch.clone(),
            volatile_fields: section.volatile_fields.clone(),
            extensions: section.extensions.clone(),
        }
    }
}

/// Result of a comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompareOutcome {
    /// The old tree has no output for the current epoch yet; nothing was compared.
    NewEpoch { epoch: String },
    Compared(ComparisonReport),
}

impl CompareOutcome {
    pub fn verdict(&self) -> AggregateVerdict {
        match self {
            Self::NewEpoch { epoch } => AggregateVerdict::reject(vec![format!(
                "new epoch {}: nothing to compare yet",
                epoch
            )]),
            Self::Compared(report) => report.verdict.clone(),
        }
    }

    pub fn report(&self) -> Option<&ComparisonReport> {
        match self {
            Self::Compared(report) => Some(report),
            Self::NewEpoch { .. } => None,
        }
    }
}

/// Everything a completed comparison produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub current_epoch: Option<String>,
    pub sections: Vec<SectionReport>,
    pub verdict: AggregateVerdict,
    pub summary: ChangeSummary,
    /// Domains added to any `exceptions` list, deduplicated across documents.
    pub excepted_domains: BTreeSet<String>,
    pub generated_at: DateTime<Utc>,
}

impl ComparisonReport {
    pub fn section(&self, key: &SectionKey) -> Option<&SectionReport> {
        self.sections.iter().find(|s| &s.key == key)
    }

    /// Every document verdict across sections, latest section first.
    pub fn documents(&self) -> impl Iterator<Item = &DocumentVerdict> {
        self.sections.iter().flat_map(|s| s.documents.iter())
    }
}

/// Per-run state threaded through every document comparison.
#[derive(Debug, Default)]
pub struct CompareAccumulator {
    sections: BTreeMap<SectionKey, SectionReport>,
    summary: ChangeSummary,
    excepted_domains: BTreeSet<String>,
}

impl CompareAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn section_mut(&mut self, key: SectionKey) -> &mut SectionReport {
        self.sections
            .entry(key.clone())
            .or_insert_with(|| SectionReport::new(key))
    }

    pub fn record(&mut self, key: SectionKey, verdict: DocumentVerdict) {
        self.summary.merge(&verdict.summary);
        self.section_mut(key).push(verdict);
    }

    pub fn record_identical(&mut self, key: SectionKey, path: &str) {
        self.section_mut(key).mark_identical(path);
    }

    /// Remember domains newly placed in an exceptions list.
    pub fn note_exceptions(&mut self, changes: &[Change]) {
        for change in changes {
            self.excepted_domains.extend(exception_domains(change));
        }
    }

    pub fn finish(self, current_epoch: Option<String>) -> ComparisonReport {
        let verdict = aggregate(self.sections.values());
        ComparisonReport {
            current_epoch,
            sections: self.sections.into_values().collect(),
            verdict,
            summary: self.summary,
            excepted_domains: self.excepted_domains,
            generated_at: Utc::now(),
        }
    }
}

/// Domains carried by an add/replace landing inside an `exceptions` list.
fn exception_domains(change: &Change) -> Vec<String> {
    if !matches!(change.kind, ChangeKind::Add | ChangeKind::Replace) {
        return Vec::new();
    }
    if !split_pointer(&change.location).contains(&"exceptions") {
        return Vec::new();
    }
    let mut domains = Vec::new();
    if let Some(value) = &change.value {
        collect_domains(value, &mut domains);
    }
    domains
}

fn collect_domains(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(domain)) = map.get("domain") {
                out.push(domain.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_domains(item, out);
            }
        }
        _ => {}
    }
}

/// Drives a comparison between two trees.
pub struct DiffOrchestrator<'a, D: DiffProvider = StructuralDiff> {
    table: &'a PermissionTable,
    provider: D,
    options: CompareOptions,
}

impl<'a> DiffOrchestrator<'a, StructuralDiff> {
    pub fn new(table: &'a PermissionTable, options: CompareOptions) -> Self {
        Self::with_provider(table, options, StructuralDiff)
    }
}

impl<'a, D: DiffProvider> DiffOrchestrator<'a, D> {
    pub fn with_provider(table: &'a PermissionTable, options: CompareOptions, provider: D) -> Self {
        Self {
            table,
            provider,
            options,
        }
    }

    pub fn compare(&self, old_root: &Path, new_root: &Path) -> Result<CompareOutcome, CompareError> {
        for root in [old_root, new_root] {
            if !root.is_dir() {
                return Err(CompareError::MissingTree {
                    path: root.to_path_buf(),
                });
            }
        }

        let current_epoch = match &self.options.current_epoch {
            Some(epoch) => Some(epoch.clone()),
            None => detect_epoch(new_root)?,
        };

        if let Some(epoch) = &current_epoch {
            for root in [old_root, new_root] {
                if !root.join(epoch).is_dir() {
                    info!(epoch = %epoch, tree = %root.display(), "epoch missing, skipping comparison");
                    return Ok(CompareOutcome::NewEpoch {
                        epoch: epoch.clone(),
                    });
                }
            }
        }

        let old_files = self.list_documents(old_root)?;
        let mut new_files = self.list_documents(new_root)?;
        let mut acc = CompareAccumulator::new();

        for (rel, old_path) in &old_files {
            let key = section_for(rel, current_epoch.as_deref());
            match new_files.remove(rel) {
                Some(new_path) => self.compare_document(rel, old_path, &new_path, key, &mut acc),
                None => {
                    debug!(path = %rel, "document removed");
                    acc.record(key, DocumentVerdict::removed(rel.as_str()));
                }
            }
        }

        // What is left in the working set only exists in the new tree.
        for rel in new_files.keys() {
            debug!(path = %rel, "document added");
            let key = section_for(rel, current_epoch.as_deref());
            acc.record(key, DocumentVerdict::added(rel.as_str()));
        }

        let report = acc.finish(current_epoch);
        info!(
            approve = report.verdict.should_approve,
            reasons = report.verdict.reasons.len(),
            changes = report.summary.total,
            "comparison finished"
        );
        Ok(CompareOutcome::Compared(report))
    }

    fn compare_document(
        &self,
        rel: &str,
        old_path: &Path,
        new_path: &Path,
        key: SectionKey,
        acc: &mut CompareAccumulator,
    ) {
        let (old, new) = match (load_document(old_path), load_document(new_path)) {
            (Ok(old), Ok(new)) => (old, new),
            (Err(err), _) | (_, Err(err)) => {
                warn!(path = %rel, error = %err, "document could not be loaded");
                acc.record(key, DocumentVerdict::error(rel, err.to_string()));
                return;
            }
        };

        let old = normalize(&old, &self.options.volatile_fields);
        let new = normalize(&new, &self.options.volatile_fields);
        if old == new {
            debug!(path = %rel, "identical after normalization");
            acc.record_identical(key, rel);
            return;
        }

        let changes = self.provider.diff(&old, &new);
        if changes.is_empty() {
            debug!(path = %rel, "diff provider reported no changes");
            acc.record_identical(key, rel);
            return;
        }

        acc.note_exceptions(&changes);
        let verdict = PatchClassifier::new(self.table).classify(&changes);
        let verdict = DocumentVerdict::from_patch(rel, verdict);
        debug!(
            path = %rel,
            status = %verdict.status,
            changes = verdict.changes.len(),
            disallowed = verdict.disallowed.len(),
            "document classified"
        );
        if verdict.status == DocumentStatus::ManualReview {
            for change in &verdict.disallowed {
                debug!(path = %rel, change = %change, "not auto-approvable");
            }
        }
        acc.record(key, verdict);
    }

    /// Documents under `root` keyed by `/`-separated relative path.
    fn list_documents(&self, root: &Path) -> Result<BTreeMap<String, PathBuf>, CompareError> {
        let mut files = BTreeMap::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|source| CompareError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() || !self.wanted(entry.path()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let rel = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(rel, entry.into_path());
        }
        Ok(files)
    }

    fn wanted(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.options.extensions.iter().any(|e| e == ext))
    }
}

/// Read and parse one document; errors carry the document path.
fn load_document(path: &Path) -> Result<Value, CompareError> {
    let content = std::fs::read_to_string(path).map_err(|source| CompareError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CompareError::MalformedDocument {
        path: path.to_path_buf(),
        source,
    })
}
