//! Per-feature permission policy.
//!
//! A [`PermissionTable`] maps *feature roots* to the sub-paths under them that
//! may change without a human looking at the diff. Roots are either exact
//! pointers (`/features/trackerAllowlist`) or the wildcard root
//! [`WILDCARD_ROOT`], which stands for "any single feature".
//!
//! Matching rules:
//!
//! - a location belongs to a root only on a `/` boundary, so `/features/ab`
//!   is not under `/features/a`
//! - a concrete root always governs over the wildcard, even when it is more
//!   restrictive
//! - nothing is normalized: matching is case-sensitive and doubled or
//!   trailing slashes are taken literally
//!
//! ```
//! use config_review::policy::PermissionTable;
//!
//! let table = PermissionTable::new()
//!     .with_root("/features/*", ["/exceptions"])
//!     .with_root("/features/elementHiding", ["/exceptions", "/settings/domains"]);
//!
//! assert!(table.location_allowed("/features/elementHiding/settings/domains/3"));
//! assert!(!table.location_allowed("/features/elementHiding/settings/domain"));
//! assert!(table.location_allowed("/features/fingerprinting/exceptions/0"));
//! assert!(!table.location_allowed("/features/fingerprinting/settings/x"));
//! ```

use std::collections::BTreeMap;

/// Sentinel key for the wildcard feature root.
pub const WILDCARD_ROOT: &str = "/features/*";

/// Prefix every wildcard-governed location must carry.
pub const FEATURES_PREFIX: &str = "/features/";

/// One entry of the permission table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureRoot {
    /// A concrete root pointer with its allowed sub-paths.
    Exact { path: String, allowed: Vec<String> },
    /// Any `/features/<name>` root.
    Wildcard { allowed: Vec<String> },
}

impl FeatureRoot {
    /// Build a root from its table key. The wildcard sentinel is the only key
    /// that yields [`FeatureRoot::Wildcard`].
    pub fn new<I, S>(key: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed = allowed.into_iter().map(Into::into).collect();
        if key == WILDCARD_ROOT {
            Self::Wildcard { allowed }
        } else {
            Self::Exact {
                path: key.to_string(),
                allowed,
            }
        }
    }

    /// Table key this root was built from.
    pub fn key(&self) -> &str {
        match self {
            Self::Exact { path, .. } => path,
            Self::Wildcard { .. } => WILDCARD_ROOT,
        }
    }

    pub fn allowed(&self) -> &[String] {
        match self {
            Self::Exact { allowed, .. } | Self::Wildcard { allowed } => allowed,
        }
    }

    /// Anchor this root at `location`, returning the concrete root pointer
    /// the location falls under, if any.
    pub fn anchor(&self, location: &str) -> Option<String> {
        match self {
            Self::Exact { path, .. } => within_root(location, path).then(|| path.clone()),
            Self::Wildcard { .. } => wildcard_anchor(location).map(str::to_string),
        }
    }
}

/// The root that governs a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootMatch<'a> {
    /// Concrete root pointer (wildcard matches are re-anchored).
    pub root: String,
    /// Whether the match came from the wildcard root.
    pub wildcard: bool,
    pub allowed: &'a [String],
}

impl RootMatch<'_> {
    /// Location relative to the matched root.
    pub fn sub_path<'l>(&self, location: &'l str) -> &'l str {
        &location[self.root.len()..]
    }

    pub fn allows(&self, location: &str) -> bool {
        let sub_path = self.sub_path(location);
        self.allowed
            .iter()
            .any(|allowed| sub_path_allowed(sub_path, allowed))
    }
}

/// Ordered permission table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionTable {
    roots: Vec<FeatureRoot>,
}

impl PermissionTable {
    /// An empty table: every location is ungoverned.
    pub fn new() -> Self {
        Self { roots: Vec::new() }
    }

    /// Stock policy for generated privacy configuration.
    pub fn stock() -> Self {
        Self::new()
            .with_root(WILDCARD_ROOT, ["/exceptions"])
            .with_root("/features/elementHiding", ["/exceptions", "/settings/domains"])
            .with_root(
                "/features/trackerAllowlist",
                ["/exceptions", "/settings/allowlistedTrackers"],
            )
    }

    /// Add a root. Re-adding a key replaces the earlier entry in place.
    pub fn with_root<I, S>(mut self, key: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let root = FeatureRoot::new(key, allowed);
        match self.roots.iter_mut().find(|r| r.key() == key) {
            Some(existing) => *existing = root,
            None => self.roots.push(root),
        }
        self
    }

    /// Build from a key → allowed sub-paths map (configuration form).
    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Self {
        map.iter()
            .fold(Self::new(), |table, (key, allowed)| {
                table.with_root(key, allowed.iter().cloned())
            })
    }

    pub fn roots(&self) -> &[FeatureRoot] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Find the root governing `location`.
    ///
    /// Concrete roots win over the wildcard; among concrete roots the longest
    /// (most specific) one wins.
    pub fn resolve(&self, location: &str) -> Option<RootMatch<'_>> {
        let exact = self
            .roots
            .iter()
            .filter_map(|root| match root {
                FeatureRoot::Exact { path, allowed } if within_root(location, path) => {
                    Some((path, allowed))
                }
                _ => None,
            })
            .max_by_key(|(path, _)| path.len());

        if let Some((path, allowed)) = exact {
            return Some(RootMatch {
                root: path.clone(),
                wildcard: false,
                allowed,
            });
        }

        let wildcard = self.roots.iter().find_map(|root| match root {
            FeatureRoot::Wildcard { allowed } => Some(allowed),
            _ => None,
        })?;
        let anchor = wildcard_anchor(location)?;

        Some(RootMatch {
            root: anchor.to_string(),
            wildcard: true,
            allowed: wildcard,
        })
    }

    /// Whether `location` may change under the given root key.
    ///
    /// `feature_root` is either a registered exact root or [`WILDCARD_ROOT`].
    /// Unknown roots allow nothing.
    pub fn is_allowed(&self, location: &str, feature_root: &str) -> bool {
        let Some(root) = self.roots.iter().find(|r| r.key() == feature_root) else {
            return false;
        };
        let Some(anchor) = root.anchor(location) else {
            return false;
        };
        let sub_path = &location[anchor.len()..];
        root.allowed()
            .iter()
            .any(|allowed| sub_path_allowed(sub_path, allowed))
    }

    /// Resolve then check: the full per-location decision.
    pub fn location_allowed(&self, location: &str) -> bool {
        self.resolve(location)
            .is_some_and(|m| m.allows(location))
    }
}

/// Segment-bounded containment: `location` is `root` or lies below it.
fn within_root(location: &str, root: &str) -> bool {
    match location.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// `/features/<name>` for a location under exactly one concrete feature.
fn wildcard_anchor(location: &str) -> Option<&str> {
    let rest = location.strip_prefix(FEATURES_PREFIX)?;
    let name_len = rest.find('/').unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    Some(&location[..FEATURES_PREFIX.len() + name_len])
}

/// The single boundary rule for sub-paths.
///
/// `sub_path` matches `allowed` when equal to it or when it continues past it
/// with a `/`. An empty `allowed` entry admits the whole root.
pub fn sub_path_allowed(sub_path: &str, allowed: &str) -> bool {
    match sub_path.strip_prefix(allowed) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
