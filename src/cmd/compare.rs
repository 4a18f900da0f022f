//! Tree comparison — `config-review compare`.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use config_review::aggregate::DocumentStatus;
use config_review::orchestrator::{CompareOptions, CompareOutcome, DiffOrchestrator};
use config_review::report::{render_json, render_markdown};
use config_review::review_config::ReviewConfig;
use config_review::ui::icons::{CHECK, CROSS, FILE_DEL, FILE_MOD, FILE_NEW, WARN};

use super::super::ReportFormat;

pub fn cmd_compare(
    config: &ReviewConfig,
    old: &Path,
    new: &Path,
    format: ReportFormat,
    output: Option<&Path>,
    epoch: Option<&str>,
) -> Result<()> {
    let table = config.permission_table();
    let mut options = CompareOptions::from(&config.toml.compare);
    if let Some(epoch) = epoch {
        options.current_epoch = Some(epoch.to_string());
    }

    let outcome = DiffOrchestrator::new(&table, options)
        .compare(old, new)
        .with_context(|| format!("Failed to compare {} with {}", old.display(), new.display()))?;

    let rendered = match format {
        ReportFormat::Markdown => render_markdown(&outcome),
        ReportFormat::Json => render_json(&outcome).context("Failed to serialize report")?,
    };

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            print_summary(&outcome);
            println!("Report written to {}", path.display());
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

/// Short terminal summary shown when the report goes to a file.
fn print_summary(outcome: &CompareOutcome) {
    let verdict = outcome.verdict();
    match outcome.report() {
        None => println!("{}No output for the current epoch in the old tree", WARN),
        Some(report) => {
            for section in &report.sections {
                println!(
                    "{} {}: {}{} approved, {}{} manual, {}{} added, {}{} removed, {}{} error(s), {} identical",
                    style("▸").dim(),
                    style(&section.key).bold(),
                    CHECK,
                    section.count(DocumentStatus::Approved),
                    FILE_MOD,
                    section.count(DocumentStatus::ManualReview),
                    FILE_NEW,
                    section.count(DocumentStatus::Added),
                    FILE_DEL,
                    section.count(DocumentStatus::Removed),
                    CROSS,
                    section.count(DocumentStatus::Error),
                    section.identical.len(),
                );
            }
        }
    }

    if verdict.should_approve {
        println!("{}{}", CHECK, style("Auto-approvable").green().bold());
    } else {
        println!("{}{}", WARN, style("Manual review required").yellow().bold());
    }
}
