//! Atomic changes between two JSON documents.
//!
//! A [`Change`] is one JSON Patch (RFC 6902) operation. Changes are produced
//! by a [`DiffProvider`] and never mutated afterwards; everything downstream
//! (classification, aggregation, reporting) only reads them.
//!
//! ## Example
//!
//! ```
//! use config_review::patch::{ChangeKind, DiffProvider, StructuralDiff};
//! use serde_json::json;
//!
//! let old = json!({"features": {"elementHiding": {"exceptions": []}}});
//! let new = json!({"features": {"elementHiding": {"exceptions": [{"domain": "x.com"}]}}});
//!
//! let changes = StructuralDiff.diff(&old, &new);
//! assert_eq!(changes.len(), 1);
//! assert_eq!(changes[0].kind, ChangeKind::Add);
//! assert_eq!(changes[0].location, "/features/elementHiding/exceptions/0");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Edit kind of a single change (the JSON Patch `op` member).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Test => "test",
        };
        write!(f, "{}", s)
    }
}

/// One atomic edit, serialized JSON-Patch-shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Edit kind.
    #[serde(rename = "op")]
    pub kind: ChangeKind,
    /// JSON Pointer the edit applies to.
    #[serde(rename = "path")]
    pub location: String,
    /// Source pointer for `move` and `copy`.
    #[serde(rename = "from", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// New value for `add`, `replace` and `test`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Change {
    pub fn add(location: impl Into<String>, value: Value) -> Self {
        Self {
            kind: ChangeKind::Add,
            location: location.into(),
            source: None,
            value: Some(value),
        }
    }

    pub fn remove(location: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Remove,
            location: location.into(),
            source: None,
            value: None,
        }
    }

    pub fn replace(location: impl Into<String>, value: Value) -> Self {
        Self {
            kind: ChangeKind::Replace,
            location: location.into(),
            source: None,
            value: Some(value),
        }
    }

    pub fn moved(source: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Move,
            location: location.into(),
            source: Some(source.into()),
            value: None,
        }
    }

    pub fn copied(source: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Copy,
            location: location.into(),
            source: Some(source.into()),
            value: None,
        }
    }

    /// The location with `from` prepended for moves and copies, for display.
    pub fn describe(&self) -> String {
        match &self.source {
            Some(source) => format!("{} {} -> {}", self.kind, source, self.location),
            None => format!("{} {}", self.kind, self.location),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Produces the ordered edit list that turns `old` into `new`.
///
/// Implementations must be deterministic. An empty result means the two
/// documents are equivalent.
pub trait DiffProvider {
    fn diff(&self, old: &Value, new: &Value) -> Vec<Change>;
}

/// Default provider: key-wise for objects, index-wise for arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralDiff;

impl DiffProvider for StructuralDiff {
    fn diff(&self, old: &Value, new: &Value) -> Vec<Change> {
        let mut changes = Vec::new();
        diff_values(old, new, String::new(), &mut changes);
        changes
    }
}

fn diff_values(old: &Value, new: &Value, path: String, out: &mut Vec<Change>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_value) in old_map {
                let child = child_pointer(&path, key);
                match new_map.get(key) {
                    Some(new_value) => diff_values(old_value, new_value, child, out),
                    None => out.push(Change::remove(child)),
                }
            }
            for (key, new_value) in new_map {
                if !old_map.contains_key(key) {
                    out.push(Change::add(child_pointer(&path, key), new_value.clone()));
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            let shared = old_items.len().min(new_items.len());
            for i in 0..shared {
                diff_values(&old_items[i], &new_items[i], index_pointer(&path, i), out);
            }
            for (i, item) in new_items.iter().enumerate().skip(shared) {
                out.push(Change::add(index_pointer(&path, i), item.clone()));
            }
            // Highest index first so each pointer is valid when applied in order.
            for i in (shared..old_items.len()).rev() {
                out.push(Change::remove(index_pointer(&path, i)));
            }
        }
        _ => {
            if old != new {
                out.push(Change::replace(path, new.clone()));
            }
        }
    }
}

fn child_pointer(parent: &str, key: &str) -> String {
    format!("{}/{}", parent, escape_token(key))
}

fn index_pointer(parent: &str, index: usize) -> String {
    format!("{}/{}", parent, index)
}

/// Escape a single reference token (RFC 6901 section 3).
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Reverse of [`escape_token`].
pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Split a pointer into its raw (still escaped) reference tokens.
///
/// The empty pointer (whole document) has no tokens. Empty tokens are kept,
/// so `"/a//b"` yields `["a", "", "b"]`.
pub fn split_pointer(pointer: &str) -> Vec<&str> {
    match pointer.strip_prefix('/') {
        Some(rest) => rest.split('/').collect(),
        None => Vec::new(),
    }
}
