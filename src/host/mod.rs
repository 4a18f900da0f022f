//! The review host: whatever stores change-request reviews.
//!
//! Real implementation: [`GitHubReviewHost`]. Test double: [`InMemoryReviewHost`].

pub mod github;
pub mod memory;

pub use github::GitHubReviewHost;
pub use memory::{HostCommand, InMemoryReviewHost};

use crate::errors::ReviewHostError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a review record as the host reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewRecordState {
    Approved,
    Dismissed,
    /// Comments, change requests, pending drafts.
    Other,
}

impl fmt::Display for ReviewRecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Approved => "approved",
            Self::Dismissed => "dismissed",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// A review on a change request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    /// Login of the reviewer, when the host exposes it.
    pub author: Option<String>,
    pub state: ReviewRecordState,
    pub body: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Review {
    /// Whether this review was left by us: body carries `marker` and, when an
    /// approver login is configured, the author matches it.
    pub fn is_own(&self, marker: &str, approver: Option<&str>) -> bool {
        if !self.body.contains(marker) {
            return false;
        }
        match approver {
            Some(login) => self.author.as_deref() == Some(login),
            None => true,
        }
    }
}

/// Commands against the host. Implementations never retry.
#[async_trait]
pub trait ReviewHost: Send + Sync {
    async fn list_reviews(&self, change_request: u64) -> Result<Vec<Review>, ReviewHostError>;

    /// Submit an approving review with `body`.
    async fn create_review(&self, change_request: u64, body: &str)
    -> Result<Review, ReviewHostError>;

    async fn dismiss_review(
        &self,
        change_request: u64,
        review_id: u64,
        reason: &str,
    ) -> Result<(), ReviewHostError>;
}
