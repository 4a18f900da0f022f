use super::{Review, ReviewHost, ReviewRecordState};
use crate::errors::ReviewHostError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// A command the in-memory host received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    List { change_request: u64 },
    Create { change_request: u64, body: String },
    Dismiss { change_request: u64, review_id: u64, reason: String },
}

#[derive(Debug, Default)]
struct Inner {
    reviews: BTreeMap<u64, Vec<Review>>,
    commands: Vec<HostCommand>,
    next_id: u64,
    fail_on: Option<&'static str>,
}

/// In-process review host that records every command.
#[derive(Debug)]
pub struct InMemoryReviewHost {
    inner: Mutex<Inner>,
    login: String,
}

impl InMemoryReviewHost {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Default::default()
            }),
            login: login.into(),
        }
    }

    /// Seed an existing review.
    pub async fn with_review(self, change_request: u64, review: Review) -> Self {
        {
            let mut inner = self.inner.lock().await;
            inner.next_id = inner.next_id.max(review.id + 1);
            inner.reviews.entry(change_request).or_default().push(review);
        }
        self
    }

    /// Make every later call to `operation` fail as unavailable.
    pub async fn fail_on(&self, operation: &'static str) {
        self.inner.lock().await.fail_on = Some(operation);
    }

    pub async fn commands(&self) -> Vec<HostCommand> {
        self.inner.lock().await.commands.clone()
    }

    /// Commands other than listing.
    pub async fn mutations(&self) -> Vec<HostCommand> {
        self.commands()
            .await
            .into_iter()
            .filter(|c| !matches!(c, HostCommand::List { .. }))
            .collect()
    }

    pub async fn reviews(&self, change_request: u64) -> Vec<Review> {
        self.inner
            .lock()
            .await
            .reviews
            .get(&change_request)
            .cloned()
            .unwrap_or_default()
    }
}

fn check(inner: &Inner, operation: &'static str) -> Result<(), ReviewHostError> {
    if inner.fail_on == Some(operation) {
        return Err(ReviewHostError::unavailable(operation, "injected failure"));
    }
    Ok(())
}

#[async_trait]
impl ReviewHost for InMemoryReviewHost {
    async fn list_reviews(&self, change_request: u64) -> Result<Vec<Review>, ReviewHostError> {
        let mut inner = self.inner.lock().await;
        inner.commands.push(HostCommand::List { change_request });
        check(&inner, "list_reviews")?;
        Ok(inner
            .reviews
            .get(&change_request)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_review(
        &self,
        change_request: u64,
        body: &str,
    ) -> Result<Review, ReviewHostError> {
        let mut inner = self.inner.lock().await;
        inner.commands.push(HostCommand::Create {
            change_request,
            body: body.to_string(),
        });
        check(&inner, "create_review")?;

        let review = Review {
            id: inner.next_id,
            author: Some(self.login.clone()),
            state: ReviewRecordState::Approved,
            body: body.to_string(),
            submitted_at: Some(Utc::now()),
        };
        inner.next_id += 1;
        inner
            .reviews
            .entry(change_request)
            .or_default()
            .push(review.clone());
        Ok(review)
    }

    async fn dismiss_review(
        &self,
        change_request: u64,
        review_id: u64,
        reason: &str,
    ) -> Result<(), ReviewHostError> {
        let mut inner = self.inner.lock().await;
        inner.commands.push(HostCommand::Dismiss {
            change_request,
            review_id,
            reason: reason.to_string(),
        });
        check(&inner, "dismiss_review")?;

        let review = inner
            .reviews
            .get_mut(&change_request)
            .and_then(|reviews| reviews.iter_mut().find(|r| r.id == review_id))
            .ok_or_else(|| {
                ReviewHostError::unavailable("dismiss_review", format!("no review {}", review_id))
            })?;
        review.state = ReviewRecordState::Dismissed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_dismiss() {
        let host = InMemoryReviewHost::new("bot");
        let review = host.create_review(7, "approved").await.unwrap();
        assert_eq!(review.author.as_deref(), Some("bot"));
        host.dismiss_review(7, review.id, "new commits").await.unwrap();

        let reviews = host.list_reviews(7).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].state, ReviewRecordState::Dismissed);
        assert!(host.list_reviews(8).await.unwrap().is_empty());
        assert_eq!(host.mutations().await.len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let host = InMemoryReviewHost::new("bot");
        host.fail_on("list_reviews").await;
        let err = host.list_reviews(1).await.unwrap_err();
        assert!(matches!(
            err,
            ReviewHostError::Unavailable {
                operation: "list_reviews",
                ..
            }
        ));
        assert_eq!(host.commands().await, vec![HostCommand::List { change_request: 1 }]);
    }

    #[tokio::test]
    async fn test_dismiss_unknown_review_fails() {
        let host = InMemoryReviewHost::new("bot");
        assert!(host.dismiss_review(1, 99, "x").await.is_err());
    }
}
