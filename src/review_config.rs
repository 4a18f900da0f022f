//! Unified configuration for config-review.
//!
//! Reads `.config-review/review.toml` (or an explicit `--config` path) and
//! layers environment and CLI values on top:
//! file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [compare]
//! current_epoch = "v4"
//! volatile_fields = ["/version", "/features/*/hash"]
//! extensions = ["json"]
//!
//! [permissions]
//! "/features/*" = ["/exceptions"]
//! "/features/elementHiding" = ["/exceptions", "/settings/domains"]
//!
//! [review]
//! marker = "<!-- config-review:auto-approval -->"
//! approver = "config-bot"
//!
//! [github]
//! api_url = "https://api.github.com"
//! repository = "owner/repo"
//! ```
//!
//! A `[permissions]` table replaces the stock policy entirely.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::lifecycle::DEFAULT_DISMISS_MESSAGE;
use crate::orchestrator::epoch_number;
use crate::policy::{FeatureRoot, PermissionTable, WILDCARD_ROOT};

/// Directory holding the configuration file, relative to the project dir.
pub const CONFIG_DIR: &str = ".config-review";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "review.toml";

/// Marker embedded in every review body this tool submits.
pub const DEFAULT_REVIEW_MARKER: &str = "<!-- config-review:auto-approval -->";

/// Comparison settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareSection {
    /// Epoch treated as current (e.g. "v4"); detected from the new tree when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_epoch: Option<String>,
    /// Pointer patterns removed before diffing; `*` matches one segment.
    #[serde(default = "default_volatile_fields")]
    pub volatile_fields: Vec<String>,
    /// File extensions that are compared.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_volatile_fields() -> Vec<String> {
    vec!["/version".to_string(), "/features/*/hash".to_string()]
}

fn default_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

impl Default for CompareSection {
    fn default() -> Self {
        Self {
            current_epoch: None,
            volatile_fields: default_volatile_fields(),
            extensions: default_extensions(),
        }
    }
}

/// Review lifecycle settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSection {
    /// Marker string identifying this tool's own reviews.
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Only reviews authored by this login count as ours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    /// Message attached when dismissing an approval.
    #[serde(default = "default_dismiss_message")]
    pub dismiss_message: String,
}

fn default_marker() -> String {
    DEFAULT_REVIEW_MARKER.to_string()
}

fn default_dismiss_message() -> String {
    DEFAULT_DISMISS_MESSAGE.to_string()
}

impl Default for ReviewSection {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            approver: None,
            dismiss_message: default_dismiss_message(),
        }
    }
}

/// GitHub review host settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// `owner/repo` slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            repository: None,
        }
    }
}

fn default_permissions() -> BTreeMap<String, Vec<String>> {
    PermissionTable::stock()
        .roots()
        .iter()
        .map(|root| (root.key().to_string(), root.allowed().to_vec()))
        .collect()
}

/// The complete review.toml structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewToml {
    #[serde(default)]
    pub compare: CompareSection,
    /// Feature root → allowed sub-paths.
    #[serde(default = "default_permissions")]
    pub permissions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub review: ReviewSection,
    #[serde(default)]
    pub github: GitHubSection,
}

impl Default for ReviewToml {
    fn default() -> Self {
        Self {
            compare: CompareSection::default(),
            permissions: default_permissions(),
            review: ReviewSection::default(),
            github: GitHubSection::default(),
        }
    }
}

impl ReviewToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse review.toml")
    }

    /// Load from `<config_dir>/review.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize review.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn permission_table(&self) -> PermissionTable {
        PermissionTable::from_map(&self.permissions)
    }

    /// Repository slug, with `GITHUB_REPOSITORY` overriding the file.
    pub fn repository(&self) -> Option<String> {
        std::env::var("GITHUB_REPOSITORY")
            .ok()
            .filter(|r| !r.is_empty())
            .or_else(|| self.github.repository.clone())
    }

    /// API base URL, with `GITHUB_API_URL` overriding the file.
    pub fn api_url(&self) -> String {
        std::env::var("GITHUB_API_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.github.api_url.clone())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.permissions.is_empty() {
            warnings.push("[permissions] is empty: no change will ever be auto-approved".to_string());
        }

        for (key, allowed) in &self.permissions {
            if !key.starts_with('/') {
                warnings.push(format!("Feature root '{}' must start with '/'", key));
            }
            if key.len() > 1 && key.ends_with('/') {
                warnings.push(format!(
                    "Feature root '{}' ends with '/' and will only match doubled slashes",
                    key
                ));
            }
            if key.contains('*') && key != WILDCARD_ROOT {
                warnings.push(format!(
                    "Feature root '{}' contains '*'; only '{}' is a wildcard",
                    key, WILDCARD_ROOT
                ));
            }
            if allowed.is_empty() {
                warnings.push(format!("Feature root '{}' allows nothing", key));
            }
            for sub_path in allowed {
                if sub_path.is_empty() {
                    warnings.push(format!(
                        "Feature root '{}' has an empty sub-path, which allows the whole root",
                        key
                    ));
                } else if !sub_path.starts_with('/') {
                    warnings.push(format!(
                        "Sub-path '{}' under '{}' must start with '/'",
                        sub_path, key
                    ));
                }
            }
        }

        if let Some(epoch) = &self.compare.current_epoch
            && epoch_number(epoch).is_none()
        {
            warnings.push(format!(
                "current_epoch '{}' is not an epoch directory name like 'v4'",
                epoch
            ));
        }

        if self.compare.extensions.is_empty() {
            warnings.push("[compare] extensions is empty: no document will be compared".to_string());
        }

        for pattern in &self.compare.volatile_fields {
            if !pattern.starts_with('/') {
                warnings.push(format!("Volatile field '{}' must start with '/'", pattern));
            }
        }

        if self.review.marker.trim().is_empty() {
            warnings.push("[review] marker is empty: human reviews would be mistaken for ours".to_string());
        }

        warnings
    }
}

/// Unified configuration combining review.toml with runtime settings.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub project_dir: PathBuf,
    /// Resolved path of the configuration file (may not exist).
    pub config_path: PathBuf,
    pub toml: ReviewToml,
    /// CLI override for the repository slug.
    pub cli_repository: Option<String>,
}

impl ReviewConfig {
    /// Create a ReviewConfig from a project directory.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        Self::with_cli_args(project_dir, None)
    }

    /// Create a ReviewConfig with CLI overrides.
    pub fn with_cli_args(project_dir: PathBuf, config_path: Option<PathBuf>) -> Result<Self> {
        let config_dir = project_dir.join(CONFIG_DIR);
        let (config_path, toml) = match config_path {
            Some(path) if path.exists() => {
                let toml = ReviewToml::load(&path)?;
                (path, toml)
            }
            Some(path) => (path, ReviewToml::default()),
            None => (
                config_dir.join(CONFIG_FILE),
                ReviewToml::load_or_default(&config_dir)?,
            ),
        };

        Ok(Self {
            project_dir,
            config_path,
            toml,
            cli_repository: None,
        })
    }

    pub fn with_repository(mut self, repository: Option<String>) -> Self {
        self.cli_repository = repository;
        self
    }

    /// Repository slug (CLI → env → file).
    pub fn repository(&self) -> Option<String> {
        self.cli_repository
            .clone()
            .or_else(|| self.toml.repository())
    }

    /// API token from `GITHUB_TOKEN`.
    pub fn token(&self) -> Option<String> {
        std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())
    }

    pub fn permission_table(&self) -> PermissionTable {
        self.toml.permission_table()
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }

    /// Whether the table built from this config has a wildcard root.
    pub fn has_wildcard(&self) -> bool {
        self.permission_table()
            .roots()
            .iter()
            .any(|r| matches!(r, FeatureRoot::Wildcard { .. }))
    }
}
