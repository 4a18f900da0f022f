//! Patch classification against the permission table.
//!
//! The classifier is all-or-nothing: a document's change list is
//! auto-approvable only if every change is, and an empty list never is.

use crate::patch::{Change, ChangeKind};
use crate::policy::PermissionTable;
use serde::{Deserialize, Serialize};

/// Outcome for a single change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub change: Change,
    /// Root that governed the target location, `None` when ungoverned.
    pub matched_root: Option<String>,
    pub allowed: bool,
}

/// Outcome for one document's change list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchVerdict {
    pub allowed: bool,
    pub classifications: Vec<Classification>,
    /// Changes that failed, in input order.
    pub disallowed: Vec<Change>,
}

impl PatchVerdict {
    pub fn allowed_count(&self) -> usize {
        self.classifications.iter().filter(|c| c.allowed).count()
    }
}

pub struct PatchClassifier<'a> {
    table: &'a PermissionTable,
}

impl<'a> PatchClassifier<'a> {
    pub fn new(table: &'a PermissionTable) -> Self {
        Self { table }
    }

    /// Classify one change.
    ///
    /// A `move` deletes its source, so the source must be allowed as well.
    pub fn classify_change(&self, change: &Change) -> Classification {
        let matched = self.table.resolve(&change.location);
        let mut allowed = matched
            .as_ref()
            .is_some_and(|m| m.allows(&change.location));

        if allowed && change.kind == ChangeKind::Move {
            allowed = change
                .source
                .as_deref()
                .is_some_and(|source| self.table.location_allowed(source));
        }

        Classification {
            change: change.clone(),
            matched_root: matched.map(|m| m.root),
            allowed,
        }
    }

    pub fn classify(&self, changes: &[Change]) -> PatchVerdict {
        let classifications: Vec<Classification> =
            changes.iter().map(|c| self.classify_change(c)).collect();

        let disallowed: Vec<Change> = classifications
            .iter()
            .filter(|c| !c.allowed)
            .map(|c| c.change.clone())
            .collect();

        PatchVerdict {
            allowed: !classifications.is_empty() && disallowed.is_empty(),
            classifications,
            disallowed,
        }
    }
}
