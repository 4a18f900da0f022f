//! Review lifecycle against GitHub — `config-review review`.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use tracing::warn;

use config_review::errors::ReviewHostError;
use config_review::host::GitHubReviewHost;
use config_review::lifecycle::{Action, EventKind, LifecycleController, Verdict};
use config_review::report::parse_verdict;
use config_review::review_config::ReviewConfig;
use config_review::ui::icons::{CHECK, REVIEW};

pub async fn cmd_review(
    config: &ReviewConfig,
    event: EventKind,
    report: &Path,
    pr: u64,
) -> Result<()> {
    let text = std::fs::read_to_string(report)
        .with_context(|| format!("Failed to read report: {}", report.display()))?;
    let verdict = match parse_verdict(&text) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(report = %report.display(), error = %e, "no usable verdict, treating as not approvable");
            Verdict::NotApprovable
        }
    };

    let repository = config
        .repository()
        .ok_or(ReviewHostError::MissingRepository)?;
    let token = config.token().ok_or(ReviewHostError::MissingToken)?;
    let host = GitHubReviewHost::new(config.toml.api_url(), &repository, token);

    let review = &config.toml.review;
    let controller = LifecycleController::new(host, review.marker.clone())
        .with_approver(review.approver.clone())
        .with_dismiss_message(review.dismiss_message.clone());

    let evaluation = controller
        .evaluate(pr, event, verdict)
        .await
        .with_context(|| format!("Failed to update reviews on {}#{}", repository, pr))?;

    println!(
        "{}{}#{}: review {}, event {}, verdict {}",
        REVIEW, repository, pr, evaluation.state, event, verdict
    );
    match (evaluation.action, evaluation.performed) {
        (Action::None, _) => println!("  No action"),
        (action, true) => println!("  {}", style(format!("Action: {}", action)).bold()),
        (action, false) => println!(
            "  {}Action {} was already in effect",
            CHECK,
            style(action).dim()
        ),
    }

    Ok(())
}
