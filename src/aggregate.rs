//! Per-document verdicts and their aggregation into one run verdict.
//!
//! ## Types
//!
//! - [`DocumentStatus`]: outcome for one compared document
//! - [`DocumentVerdict`]: a document's status plus the changes behind it
//! - [`SectionReport`]: all verdicts of one schema-epoch section
//! - [`AggregateVerdict`]: the run-wide approve/reject decision with reasons
//! - [`ChangeSummary`]: derived change counts
//!
//! Aggregation is a logical AND over every section. Reasons are collected
//! verbatim and never deduplicated, so a reviewer sees every cause.

use crate::classify::{Classification, PatchVerdict};
use crate::patch::{Change, ChangeKind, split_pointer, unescape_token};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome for one compared document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Non-empty change list, every change auto-approvable.
    Approved,
    /// At least one change needs a human.
    ManualReview,
    /// Present only in the new tree.
    Added,
    /// Present only in the old tree.
    Removed,
    /// Could not be read or parsed on at least one side.
    Error,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        Self::Approved,
        Self::ManualReview,
        Self::Added,
        Self::Removed,
        Self::Error,
    ];

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Heading used in rendered reports.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Approved => "Auto-approvable",
            Self::ManualReview => "Manual review",
            Self::Added => "Added",
            Self::Removed => "Removed",
            Self::Error => "Errors",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Approved => "approved",
            Self::ManualReview => "manual_review",
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Verdict for a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVerdict {
    /// Path relative to the tree root.
    pub path: String,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<Change>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disallowed: Vec<Change>,
    #[serde(default)]
    pub summary: ChangeSummary,
    /// Read or parse failure message for `error` documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentVerdict {
    /// Verdict for a document present on both sides with a non-empty diff.
    pub fn from_patch(path: impl Into<String>, verdict: PatchVerdict) -> Self {
        let summary = summarize(&verdict.classifications);
        let status = if verdict.allowed {
            DocumentStatus::Approved
        } else {
            DocumentStatus::ManualReview
        };
        Self {
            path: path.into(),
            status,
            changes: verdict
                .classifications
                .into_iter()
                .map(|c| c.change)
                .collect(),
            disallowed: verdict.disallowed,
            summary,
            error: None,
        }
    }

    pub fn added(path: impl Into<String>) -> Self {
        Self::bare(path, DocumentStatus::Added, None)
    }

    pub fn removed(path: impl Into<String>) -> Self {
        Self::bare(path, DocumentStatus::Removed, None)
    }

    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::bare(path, DocumentStatus::Error, Some(message.into()))
    }

    fn bare(path: impl Into<String>, status: DocumentStatus, error: Option<String>) -> Self {
        Self {
            path: path.into(),
            status,
            changes: Vec::new(),
            disallowed: Vec::new(),
            summary: ChangeSummary::default(),
            error,
        }
    }
}

/// Section a document is bucketed into by its schema epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    /// Documents under the current epoch directory.
    Latest(String),
    /// Everything else (older epochs, unversioned files).
    Legacy,
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest(epoch) => write!(f, "latest ({})", epoch),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// All verdicts for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionReport {
    pub key: SectionKey,
    pub documents: Vec<DocumentVerdict>,
    /// Documents equal after normalization; they carry no verdict.
    #[serde(default)]
    pub identical: Vec<String>,
    #[serde(default)]
    pub summary: ChangeSummary,
}

impl SectionReport {
    pub fn new(key: SectionKey) -> Self {
        Self {
            key,
            documents: Vec::new(),
            identical: Vec::new(),
            summary: ChangeSummary::default(),
        }
    }

    pub fn push(&mut self, verdict: DocumentVerdict) {
        self.summary.merge(&verdict.summary);
        self.documents.push(verdict);
    }

    pub fn mark_identical(&mut self, path: impl Into<String>) {
        self.identical.push(path.into());
    }

    pub fn with_status(&self, status: DocumentStatus) -> impl Iterator<Item = &DocumentVerdict> {
        self.documents.iter().filter(move |d| d.status == status)
    }

    pub fn paths(&self, status: DocumentStatus) -> Vec<&str> {
        self.with_status(status).map(|d| d.path.as_str()).collect()
    }

    pub fn count(&self, status: DocumentStatus) -> usize {
        self.with_status(status).count()
    }
}

/// Run-wide decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateVerdict {
    pub should_approve: bool,
    pub reasons: Vec<String>,
}

impl AggregateVerdict {
    pub fn approve() -> Self {
        Self {
            should_approve: true,
            reasons: Vec::new(),
        }
    }

    pub fn reject(reasons: Vec<String>) -> Self {
        Self {
            should_approve: false,
            reasons,
        }
    }
}

/// Fold every section's documents into one verdict.
///
/// A run approves only when at least one document is `approved` and no
/// document in any section is anything else. Identical documents are not
/// in `documents` and therefore neither block nor count.
pub fn aggregate<'a, I>(sections: I) -> AggregateVerdict
where
    I: IntoIterator<Item = &'a SectionReport>,
{
    let mut reasons = Vec::new();
    let mut approved = 0usize;

    for section in sections {
        for doc in &section.documents {
            match doc.status {
                DocumentStatus::Approved => approved += 1,
                DocumentStatus::ManualReview => {
                    for change in &doc.disallowed {
                        reasons.push(format!(
                            "{}: {}: {} is not auto-approvable",
                            section.key, doc.path, change
                        ));
                    }
                }
                DocumentStatus::Added => {
                    reasons.push(format!("{}: {}: document added", section.key, doc.path));
                }
                DocumentStatus::Removed => {
                    reasons.push(format!("{}: {}: document removed", section.key, doc.path));
                }
                DocumentStatus::Error => {
                    reasons.push(format!(
                        "{}: {}: {}",
                        section.key,
                        doc.path,
                        doc.error.as_deref().unwrap_or("unreadable document")
                    ));
                }
            }
        }
    }

    if approved == 0 && reasons.is_empty() {
        reasons.push("no auto-approvable changes".to_string());
    }

    if reasons.is_empty() {
        AggregateVerdict::approve()
    } else {
        AggregateVerdict::reject(reasons)
    }
}

/// Derived change counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub total: usize,
    pub by_kind: BTreeMap<ChangeKind, usize>,
    /// Keyed by the first pointer segment (`(root)` for whole-document edits).
    pub by_top_level: BTreeMap<String, usize>,
    /// Keyed by feature name for locations under `/features/<name>`.
    pub by_feature: BTreeMap<String, usize>,
    pub auto_approvable: usize,
    pub other: usize,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn merge(&mut self, other: &ChangeSummary) {
        self.total += other.total;
        self.auto_approvable += other.auto_approvable;
        self.other += other.other;
        for (kind, n) in &other.by_kind {
            *self.by_kind.entry(*kind).or_default() += n;
        }
        for (segment, n) in &other.by_top_level {
            *self.by_top_level.entry(segment.clone()).or_default() += n;
        }
        for (feature, n) in &other.by_feature {
            *self.by_feature.entry(feature.clone()).or_default() += n;
        }
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<String> = self
            .by_kind
            .iter()
            .map(|(kind, n)| format!("{}: {}", kind, n))
            .collect();
        write!(
            f,
            "{} change(s) ({}), {} auto-approvable, {} other",
            self.total,
            kinds.join(", "),
            self.auto_approvable,
            self.other
        )
    }
}

/// Count classified changes by kind, top-level segment and feature.
pub fn summarize(classifications: &[Classification]) -> ChangeSummary {
    let mut summary = ChangeSummary::default();
    for c in classifications {
        summary.total += 1;
        if c.allowed {
            summary.auto_approvable += 1;
        } else {
            summary.other += 1;
        }
        *summary.by_kind.entry(c.change.kind).or_default() += 1;

        let segments = split_pointer(&c.change.location);
        let top = segments
            .first()
            .map(|s| unescape_token(s))
            .unwrap_or_else(|| "(root)".to_string());
        *summary.by_top_level.entry(top).or_default() += 1;

        if let [first, feature, ..] = segments.as_slice()
            && *first == "features"
        {
            *summary.by_feature.entry(unescape_token(feature)).or_default() += 1;
        }
    }
    summary
}
