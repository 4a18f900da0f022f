//! Schema epoch directories (`v1`, `v2`, ...) and section bucketing.

use crate::aggregate::SectionKey;
use crate::errors::CompareError;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use walkdir::WalkDir;

static EPOCH_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^v(\d+)$").unwrap());

/// Numeric part of an epoch directory name, `None` for anything else.
pub fn epoch_number(name: &str) -> Option<u32> {
    EPOCH_REGEX
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Epoch directories directly under `root`, lowest first.
pub fn list_epochs(root: &Path) -> Result<Vec<String>, CompareError> {
    let mut epochs = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| CompareError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if let Some(number) = epoch_number(&name) {
            epochs.push((number, name.into_owned()));
        }
    }
    epochs.sort();
    Ok(epochs.into_iter().map(|(_, name)| name).collect())
}

/// Highest epoch directory under `root`.
pub fn detect_epoch(root: &Path) -> Result<Option<String>, CompareError> {
    Ok(list_epochs(root)?.pop())
}

/// Section for a `/`-separated relative path.
pub fn section_for(rel_path: &str, current_epoch: Option<&str>) -> SectionKey {
    match (rel_path.split('/').next(), current_epoch) {
        (Some(first), Some(epoch)) if first == epoch && rel_path.contains('/') => {
            SectionKey::Latest(epoch.to_string())
        }
        _ => SectionKey::Legacy,
    }
}
