//! Typed error hierarchy for config-review.
//!
//! Three top-level enums cover the three boundaries:
//! - `CompareError` — a comparison run that cannot start or continue
//! - `ReviewHostError` — listing, creating or dismissing reviews failed
//! - `ReportError` — a classification report carries no usable verdict line
//!
//! Per-document failures (`Io`, `MalformedDocument`) do not abort a run: the
//! orchestrator renders them into an `error` verdict. A missing policy root is
//! a disallowed change and an epoch mismatch a `NewEpoch` outcome.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole comparison run.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("Config tree not found at {path}")]
    MissingTree { path: PathBuf },

    #[error("Failed to walk config tree at {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    MalformedDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from the review host. Never retried here.
#[derive(Debug, Error)]
pub enum ReviewHostError {
    #[error("Review host unavailable during {operation}: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },

    #[error("No review host token configured (set GITHUB_TOKEN)")]
    MissingToken,

    #[error("No repository configured (use --repo or set GITHUB_REPOSITORY)")]
    MissingRepository,
}

impl ReviewHostError {
    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            message: message.into(),
        }
    }
}

/// Errors reading the verdict sentinel out of a report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("Report has no verdict line")]
    MissingVerdict,

    #[error("Report verdict line is not a known sentinel: {line}")]
    UnknownVerdict { line: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_error_missing_tree_carries_path() {
        let path = PathBuf::from("/tmp/old");
        let err = CompareError::MissingTree { path: path.clone() };
        match &err {
            CompareError::MissingTree { path: p } => assert_eq!(p, &path),
            _ => panic!("Expected MissingTree"),
        }
        assert!(err.to_string().contains("/tmp/old"));
    }

    #[test]
    fn compare_error_malformed_document_keeps_source() {
        use std::error::Error as _;

        let source = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err = CompareError::MalformedDocument {
            path: PathBuf::from("new/v4/config.json"),
            source,
        };
        let message = err.to_string();
        assert!(message.starts_with("Malformed JSON in new/v4/config.json"));
        assert!(err.source().is_some());
    }

    #[test]
    fn compare_error_io_names_path() {
        let err = CompareError::Io {
            path: PathBuf::from("old/v4/config.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("old/v4/config.json"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn review_host_error_unavailable_names_operation() {
        let err = ReviewHostError::unavailable("list_reviews", "connection refused");
        match &err {
            ReviewHostError::Unavailable { operation, message } => {
                assert_eq!(*operation, "list_reviews");
                assert_eq!(message, "connection refused");
            }
            _ => panic!("Expected Unavailable"),
        }
        assert!(err.to_string().contains("list_reviews"));
    }

    #[test]
    fn report_error_unknown_verdict_carries_line() {
        let err = ReportError::UnknownVerdict {
            line: "LGTM".to_string(),
        };
        assert!(err.to_string().contains("LGTM"));
        assert_ne!(err, ReportError::MissingVerdict);
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&CompareError::MissingTree {
            path: PathBuf::from("x"),
        });
        assert_std_error(&ReviewHostError::MissingToken);
        assert_std_error(&ReportError::MissingVerdict);
    }
}
