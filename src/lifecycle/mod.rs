//! Review lifecycle: when to submit or dismiss the automatic approval.
//!
//! Nothing is persisted between invocations. Each evaluation lists the host's
//! reviews, infers where our own review stands, and asks the pure [`decide`]
//! table what to do. Commands are idempotent, so redelivered events are safe.

use crate::aggregate::AggregateVerdict;
use crate::errors::ReviewHostError;
use crate::host::{Review, ReviewHost, ReviewRecordState};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Message attached when an approval is revoked.
pub const DEFAULT_DISMISS_MESSAGE: &str =
    "New commits were pushed; auto-approval revoked until verification completes.";

const APPROVAL_TEXT: &str =
    "Configuration changes only touch auto-approvable paths. Approved automatically.";

/// Where our own review stands on the change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    NoReview,
    Active,
    /// Dismissed, waiting for verification to run again.
    Dismissed,
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoReview => "none",
            Self::Active => "active",
            Self::Dismissed => "dismissed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ReviewState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "no-review" => Ok(Self::NoReview),
            "active" => Ok(Self::Active),
            "dismissed" => Ok(Self::Dismissed),
            _ => anyhow::bail!(
                "Invalid review state '{}'. Valid values: none, active, dismissed",
                s
            ),
        }
    }
}

/// What happened on the change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Opened,
    /// New commits pushed to an open change request.
    Amended,
    VerificationCompleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Opened => "opened",
            Self::Amended => "amended",
            Self::VerificationCompleted => "verification-completed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for EventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opened" | "reopened" => Ok(Self::Opened),
            "amended" | "synchronize" => Ok(Self::Amended),
            "verification-completed" | "verification_completed" | "completed" => {
                Ok(Self::VerificationCompleted)
            }
            _ => anyhow::bail!(
                "Invalid event '{}'. Valid values: opened, amended, verification-completed",
                s
            ),
        }
    }
}

/// The run's decision as the lifecycle sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Approvable,
    NotApprovable,
}

impl From<&AggregateVerdict> for Verdict {
    fn from(verdict: &AggregateVerdict) -> Self {
        if verdict.should_approve {
            Self::Approvable
        } else {
            Self::NotApprovable
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Approvable => "approvable",
            Self::NotApprovable => "not-approvable",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Verdict {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approvable" | "approved" => Ok(Self::Approvable),
            "not-approvable" | "not_approvable" | "manual" => Ok(Self::NotApprovable),
            _ => anyhow::bail!(
                "Invalid verdict '{}'. Valid values: approvable, not-approvable",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Submit,
    Dismiss,
    None,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submit => "submit",
            Self::Dismiss => "dismiss",
            Self::None => "none",
        };
        write!(f, "{}", s)
    }
}

/// The transition table.
///
/// A not-approvable verdict always revokes an active review. An amendment
/// always revokes and never resubmits; approval comes back only once
/// verification has completed again.
pub fn decide(state: ReviewState, event: EventKind, verdict: Verdict) -> Action {
    use EventKind::*;
    use ReviewState::*;

    match (state, event, verdict) {
        (Active, _, Verdict::NotApprovable) => Action::Dismiss,
        (NoReview | Dismissed, _, Verdict::NotApprovable) => Action::None,

        (Active, Amended, Verdict::Approvable) => Action::Dismiss,
        (Active, Opened | VerificationCompleted, Verdict::Approvable) => Action::None,

        (NoReview, Opened, Verdict::Approvable) => Action::Submit,
        (NoReview | Dismissed, VerificationCompleted, Verdict::Approvable) => Action::Submit,
        (NoReview | Dismissed, Amended, Verdict::Approvable) => Action::None,
        (Dismissed, Opened, Verdict::Approvable) => Action::None,
    }
}

/// Any live own approval makes the state `Active`; otherwise an own
/// dismissed review makes it `Dismissed`.
pub fn infer_state(reviews: &[Review], marker: &str, approver: Option<&str>) -> ReviewState {
    let own: Vec<&Review> = reviews
        .iter()
        .filter(|r| r.is_own(marker, approver))
        .collect();

    if own.iter().any(|r| r.state == ReviewRecordState::Approved) {
        ReviewState::Active
    } else if own.iter().any(|r| r.state == ReviewRecordState::Dismissed) {
        ReviewState::Dismissed
    } else {
        ReviewState::NoReview
    }
}

/// Result of one controller invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub state: ReviewState,
    pub action: Action,
    /// Whether the action changed anything on the host.
    pub performed: bool,
}

pub struct LifecycleController<H: ReviewHost> {
    host: H,
    marker: String,
    approver: Option<String>,
    dismiss_message: String,
}

impl<H: ReviewHost> LifecycleController<H> {
    pub fn new(host: H, marker: impl Into<String>) -> Self {
        Self {
            host,
            marker: marker.into(),
            approver: None,
            dismiss_message: DEFAULT_DISMISS_MESSAGE.to_string(),
        }
    }

    pub fn with_approver(mut self, approver: Option<String>) -> Self {
        self.approver = approver;
        self
    }

    pub fn with_dismiss_message(mut self, message: impl Into<String>) -> Self {
        self.dismiss_message = message.into();
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn own_active<'r>(&self, reviews: &'r [Review]) -> impl Iterator<Item = &'r Review> {
        let marker = self.marker.clone();
        let approver = self.approver.clone();
        reviews.iter().filter(move |r| {
            r.state == ReviewRecordState::Approved && r.is_own(&marker, approver.as_deref())
        })
    }

    /// List, decide, then act. Host calls run one after another.
    pub async fn evaluate(
        &self,
        change_request: u64,
        event: EventKind,
        verdict: Verdict,
    ) -> Result<Evaluation, ReviewHostError> {
        let reviews = self.host.list_reviews(change_request).await?;
        let state = infer_state(&reviews, &self.marker, self.approver.as_deref());
        let action = decide(state, event, verdict);
        debug!(change_request, %state, %event, %verdict, %action, "lifecycle decision");

        let performed = match action {
            Action::Submit => self.submit(change_request, &reviews).await?,
            Action::Dismiss => self.dismiss(change_request, &reviews).await?,
            Action::None => false,
        };

        info!(change_request, %action, performed, "lifecycle evaluated");
        Ok(Evaluation {
            state,
            action,
            performed,
        })
    }

    async fn submit(&self, change_request: u64, reviews: &[Review]) -> Result<bool, ReviewHostError> {
        if self.own_active(reviews).next().is_some() {
            debug!(change_request, "approval already active");
            return Ok(false);
        }
        let body = format!("{}\n\n{}", APPROVAL_TEXT, self.marker);
        let review = self.host.create_review(change_request, &body).await?;
        info!(change_request, review_id = review.id, "submitted approval");
        Ok(true)
    }

    async fn dismiss(&self, change_request: u64, reviews: &[Review]) -> Result<bool, ReviewHostError> {
        let mut dismissed = false;
        for review in self.own_active(reviews) {
            self.host
                .dismiss_review(change_request, review.id, &self.dismiss_message)
                .await?;
            info!(change_request, review_id = review.id, "dismissed approval");
            dismissed = true;
        }
        Ok(dismissed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCommand, InMemoryReviewHost};
    use chrono::{TimeZone, Utc};

    const MARKER: &str = "<!-- config-review:auto-approval -->";

    const STATES: [ReviewState; 3] = [ReviewState::NoReview, ReviewState::Active, ReviewState::Dismissed];
    const EVENTS: [EventKind; 3] = [
        EventKind::Opened,
        EventKind::Amended,
        EventKind::VerificationCompleted,
    ];
    const VERDICTS: [Verdict; 2] = [Verdict::Approvable, Verdict::NotApprovable];

    fn review(id: u64, state: ReviewRecordState, body: &str, minute: u32) -> Review {
        Review {
            id,
            author: Some("bot".to_string()),
            state,
            body: body.to_string(),
            submitted_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()),
        }
    }

    fn own(id: u64, state: ReviewRecordState, minute: u32) -> Review {
        review(id, state, &format!("ok\n\n{}", MARKER), minute)
    }

    // =========================================
    // Transition table
    // =========================================

    #[test]
    fn test_decide_table_rows() {
        use Action as A;
        use EventKind as E;
        use ReviewState as S;
        use Verdict as V;

        assert_eq!(decide(S::NoReview, E::Opened, V::Approvable), A::Submit);
        assert_eq!(decide(S::NoReview, E::Opened, V::NotApprovable), A::None);
        assert_eq!(decide(S::Active, E::Opened, V::Approvable), A::None);
        assert_eq!(decide(S::NoReview, E::Amended, V::Approvable), A::None);
        assert_eq!(decide(S::NoReview, E::Amended, V::NotApprovable), A::None);
        assert_eq!(decide(S::NoReview, E::VerificationCompleted, V::Approvable), A::Submit);
        assert_eq!(decide(S::Dismissed, E::VerificationCompleted, V::Approvable), A::Submit);
        assert_eq!(decide(S::Active, E::VerificationCompleted, V::Approvable), A::None);
        assert_eq!(decide(S::Dismissed, E::Opened, V::Approvable), A::None);
        assert_eq!(decide(S::Dismissed, E::Amended, V::Approvable), A::None);
    }

    #[test]
    fn test_amendment_always_dismisses_active_review() {
        for verdict in VERDICTS {
            assert_eq!(decide(ReviewState::Active, EventKind::Amended, verdict), Action::Dismiss);
        }
    }

    #[test]
    fn test_not_approvable_never_submits() {
        for state in STATES {
            for event in EVENTS {
                let action = decide(state, event, Verdict::NotApprovable);
                assert_ne!(action, Action::Submit);
                if state == ReviewState::Active {
                    assert_eq!(action, Action::Dismiss);
                }
            }
        }
    }

    #[test]
    fn test_decide_is_deterministic() {
        for state in STATES {
            for event in EVENTS {
                for verdict in VERDICTS {
                    assert_eq!(decide(state, event, verdict), decide(state, event, verdict));
                }
            }
        }
    }

    // =========================================
    // Parsing
    // =========================================

    #[test]
    fn test_event_aliases() {
        assert_eq!("reopened".parse::<EventKind>().unwrap(), EventKind::Opened);
        assert_eq!("synchronize".parse::<EventKind>().unwrap(), EventKind::Amended);
        assert_eq!(
            "Verification-Completed".parse::<EventKind>().unwrap(),
            EventKind::VerificationCompleted
        );
        assert_eq!("completed".parse::<EventKind>().unwrap(), EventKind::VerificationCompleted);
        assert!("closed".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_state_and_verdict_parse_display_agree() {
        for state in STATES {
            assert_eq!(state.to_string().parse::<ReviewState>().unwrap(), state);
        }
        for verdict in VERDICTS {
            assert_eq!(verdict.to_string().parse::<Verdict>().unwrap(), verdict);
        }
        for event in EVENTS {
            assert_eq!(event.to_string().parse::<EventKind>().unwrap(), event);
        }
        assert!("maybe".parse::<Verdict>().is_err());
    }

    #[test]
    fn test_verdict_from_aggregate() {
        assert_eq!(Verdict::from(&AggregateVerdict::approve()), Verdict::Approvable);
        assert_eq!(
            Verdict::from(&AggregateVerdict::reject(vec!["x".to_string()])),
            Verdict::NotApprovable
        );
    }

    // =========================================
    // State inference
    // =========================================

    #[test]
    fn test_infer_state_ignores_foreign_reviews() {
        let reviews = vec![review(1, ReviewRecordState::Approved, "LGTM", 0)];
        assert_eq!(infer_state(&reviews, MARKER, None), ReviewState::NoReview);
    }

    #[test]
    fn test_infer_state_live_approval_wins() {
        let reviews = vec![
            own(2, ReviewRecordState::Approved, 5),
            own(1, ReviewRecordState::Dismissed, 1),
        ];
        assert_eq!(infer_state(&reviews, MARKER, None), ReviewState::Active);

        // An older approval is still live even though a newer one was dismissed.
        let reviews = vec![
            own(1, ReviewRecordState::Approved, 1),
            own(2, ReviewRecordState::Dismissed, 5),
            own(3, ReviewRecordState::Other, 9),
        ];
        assert_eq!(infer_state(&reviews, MARKER, None), ReviewState::Active);

        let reviews = vec![
            own(1, ReviewRecordState::Dismissed, 1),
            own(2, ReviewRecordState::Other, 5),
        ];
        assert_eq!(infer_state(&reviews, MARKER, None), ReviewState::Dismissed);
    }

    #[test]
    fn test_infer_state_checks_approver() {
        let reviews = vec![own(1, ReviewRecordState::Approved, 0)];
        assert_eq!(infer_state(&reviews, MARKER, Some("bot")), ReviewState::Active);
        assert_eq!(infer_state(&reviews, MARKER, Some("someone")), ReviewState::NoReview);
    }

    // =========================================
    // Controller against the in-memory host
    // =========================================

    #[tokio::test]
    async fn test_opened_approvable_submits_once() {
        let controller = LifecycleController::new(InMemoryReviewHost::new("bot"), MARKER);

        let first = controller.evaluate(12, EventKind::Opened, Verdict::Approvable).await.unwrap();
        assert_eq!(first.state, ReviewState::NoReview);
        assert_eq!(first.action, Action::Submit);
        assert!(first.performed);

        let second = controller.evaluate(12, EventKind::Opened, Verdict::Approvable).await.unwrap();
        assert_eq!(second.state, ReviewState::Active);
        assert_eq!(second.action, Action::None);

        let mutations = controller.host().mutations().await;
        assert_eq!(mutations.len(), 1);
        assert!(matches!(&mutations[0], HostCommand::Create { body, .. } if body.contains(MARKER)));
    }

    #[tokio::test]
    async fn test_amended_dismisses_and_does_not_resubmit() {
        let host = InMemoryReviewHost::new("bot")
            .with_review(12, own(40, ReviewRecordState::Approved, 0))
            .await;
        let controller = LifecycleController::new(host, MARKER).with_dismiss_message("revoked");

        let eval = controller.evaluate(12, EventKind::Amended, Verdict::Approvable).await.unwrap();
        assert_eq!(eval.action, Action::Dismiss);
        assert!(eval.performed);
        assert_eq!(
            controller.host().mutations().await,
            vec![HostCommand::Dismiss {
                change_request: 12,
                review_id: 40,
                reason: "revoked".to_string()
            }]
        );

        // Redelivery of the same event is a no-op.
        let again = controller.evaluate(12, EventKind::Amended, Verdict::Approvable).await.unwrap();
        assert_eq!(again.state, ReviewState::Dismissed);
        assert_eq!(again.action, Action::None);
        assert_eq!(controller.host().mutations().await.len(), 1);

        // Verification completing brings the approval back.
        let verified = controller
            .evaluate(12, EventKind::VerificationCompleted, Verdict::Approvable)
            .await
            .unwrap();
        assert_eq!(verified.action, Action::Submit);
        assert!(verified.performed);
        assert_eq!(
            infer_state(&controller.host().reviews(12).await, MARKER, None),
            ReviewState::Active
        );
    }

    #[tokio::test]
    async fn test_not_approvable_dismisses_active_review() {
        let host = InMemoryReviewHost::new("bot")
            .with_review(3, own(1, ReviewRecordState::Approved, 0))
            .await;
        let controller = LifecycleController::new(host, MARKER);
        let eval = controller
            .evaluate(3, EventKind::VerificationCompleted, Verdict::NotApprovable)
            .await
            .unwrap();
        assert_eq!(eval.action, Action::Dismiss);
        assert!(eval.performed);
    }

    async fn host_with_stale_dismissal() -> InMemoryReviewHost {
        InMemoryReviewHost::new("bot")
            .with_review(5, own(1, ReviewRecordState::Approved, 0))
            .await
            .with_review(5, own(2, ReviewRecordState::Dismissed, 3))
            .await
    }

    #[tokio::test]
    async fn test_amended_dismisses_older_live_approval() {
        for verdict in VERDICTS {
            let controller = LifecycleController::new(host_with_stale_dismissal().await, MARKER);
            let eval = controller.evaluate(5, EventKind::Amended, verdict).await.unwrap();
            assert_eq!(eval.state, ReviewState::Active);
            assert_eq!(eval.action, Action::Dismiss);
            assert!(eval.performed);
            assert!(
                controller
                    .host()
                    .reviews(5)
                    .await
                    .iter()
                    .all(|r| r.state == ReviewRecordState::Dismissed)
            );
        }
    }

    #[tokio::test]
    async fn test_not_approvable_dismisses_older_live_approval() {
        for event in EVENTS {
            let controller = LifecycleController::new(host_with_stale_dismissal().await, MARKER);
            let eval = controller.evaluate(5, event, Verdict::NotApprovable).await.unwrap();
            assert_eq!(eval.action, Action::Dismiss);
            assert_eq!(
                controller.host().mutations().await,
                vec![HostCommand::Dismiss {
                    change_request: 5,
                    review_id: 1,
                    reason: DEFAULT_DISMISS_MESSAGE.to_string()
                }]
            );
        }
    }

    #[tokio::test]
    async fn test_live_approval_is_not_resubmitted() {
        let controller = LifecycleController::new(host_with_stale_dismissal().await, MARKER);
        let eval = controller
            .evaluate(5, EventKind::VerificationCompleted, Verdict::Approvable)
            .await
            .unwrap();
        assert_eq!(eval.action, Action::None);
        assert!(!eval.performed);
        assert!(controller.host().mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_host_failure_propagates() {
        let host = InMemoryReviewHost::new("bot");
        host.fail_on("create_review").await;
        let controller = LifecycleController::new(host, MARKER);
        let err = controller
            .evaluate(1, EventKind::Opened, Verdict::Approvable)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReviewHostError::Unavailable {
                operation: "create_review",
                ..
            }
        ));
        assert_eq!(controller.host().commands().await.len(), 2);
    }

    #[tokio::test]
    async fn test_independent_change_requests() {
        let host = InMemoryReviewHost::new("bot")
            .with_review(1, own(10, ReviewRecordState::Approved, 0))
            .await;
        let controller = LifecycleController::new(host, MARKER);
        let eval = controller.evaluate(2, EventKind::Opened, Verdict::Approvable).await.unwrap();
        assert_eq!(eval.state, ReviewState::NoReview);
        assert_eq!(eval.action, Action::Submit);
    }
}
