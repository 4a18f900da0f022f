//! GitHub pull request reviews over the REST API.

use super::{Review, ReviewHost, ReviewRecordState};
use crate::errors::ReviewHostError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

const USER_AGENT: &str = "config-review";
const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

/// A pull request review (subset of fields).
#[derive(Debug, Deserialize)]
struct GitHubReview {
    id: u64,
    user: Option<GitHubUser>,
    #[serde(default)]
    body: Option<String>,
    state: String,
    submitted_at: Option<DateTime<Utc>>,
}

impl From<GitHubReview> for Review {
    fn from(r: GitHubReview) -> Self {
        let state = match r.state.as_str() {
            "APPROVED" => ReviewRecordState::Approved,
            "DISMISSED" => ReviewRecordState::Dismissed,
            _ => ReviewRecordState::Other,
        };
        Review {
            id: r.id,
            author: r.user.map(|u| u.login),
            state,
            body: r.body.unwrap_or_default(),
            submitted_at: r.submitted_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateReviewRequest<'a> {
    body: &'a str,
    event: &'static str,
}

#[derive(Debug, Serialize)]
struct DismissReviewRequest<'a> {
    message: &'a str,
    event: &'static str,
}

/// Reviews on pull requests of one repository.
pub struct GitHubReviewHost {
    client: reqwest::Client,
    api_url: String,
    repository: String,
    token: String,
}

impl GitHubReviewHost {
    pub fn new(
        api_url: impl Into<String>,
        repository: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            repository: repository.into(),
            token: token.into(),
        }
    }

    fn reviews_url(&self, change_request: u64) -> String {
        format!(
            "{}/repos/{}/pulls/{}/reviews",
            self.api_url, self.repository, change_request
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
    }
}

fn unavailable(operation: &'static str) -> impl Fn(reqwest::Error) -> ReviewHostError {
    move |e| ReviewHostError::unavailable(operation, e.to_string())
}

#[async_trait]
impl ReviewHost for GitHubReviewHost {
    async fn list_reviews(&self, change_request: u64) -> Result<Vec<Review>, ReviewHostError> {
        let url = self.reviews_url(change_request);
        let mut all_reviews = Vec::new();
        let mut page = 1u32;

        loop {
            let resp: Vec<GitHubReview> = self
                .request(reqwest::Method::GET, &url)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await
                .map_err(unavailable("list_reviews"))?
                .error_for_status()
                .map_err(unavailable("list_reviews"))?
                .json()
                .await
                .map_err(unavailable("list_reviews"))?;

            let count = resp.len();
            all_reviews.extend(resp.into_iter().map(Review::from));
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(change_request, reviews = all_reviews.len(), "listed reviews");
        Ok(all_reviews)
    }

    async fn create_review(
        &self,
        change_request: u64,
        body: &str,
    ) -> Result<Review, ReviewHostError> {
        let review: GitHubReview = self
            .request(reqwest::Method::POST, &self.reviews_url(change_request))
            .json(&CreateReviewRequest {
                body,
                event: "APPROVE",
            })
            .send()
            .await
            .map_err(unavailable("create_review"))?
            .error_for_status()
            .map_err(unavailable("create_review"))?
            .json()
            .await
            .map_err(unavailable("create_review"))?;
        Ok(review.into())
    }

    async fn dismiss_review(
        &self,
        change_request: u64,
        review_id: u64,
        reason: &str,
    ) -> Result<(), ReviewHostError> {
        let url = format!("{}/{}/dismissals", self.reviews_url(change_request), review_id);
        self.request(reqwest::Method::PUT, &url)
            .json(&DismissReviewRequest {
                message: reason,
                event: "DISMISS",
            })
            .send()
            .await
            .map_err(unavailable("dismiss_review"))?
            .error_for_status()
            .map_err(unavailable("dismiss_review"))?;
        Ok(())
    }
}
