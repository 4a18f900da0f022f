//! Classification report rendering and verdict parsing.
//!
//! The markdown report is what humans read on the change request. Its last
//! line is always one of the two verdict sentinels, and that line is the only
//! thing [`parse_verdict`] looks at.

use crate::aggregate::{DocumentStatus, SectionReport};
use crate::errors::ReportError;
use crate::lifecycle::Verdict;
use crate::orchestrator::{CompareOutcome, ComparisonReport};
use std::fmt::Write;

pub const SENTINEL_APPROVED: &str = "AUTO-APPROVED";
pub const SENTINEL_MANUAL: &str = "MANUAL REVIEW REQUIRED";

const GLYPH_APPROVED: &str = "✅";
const GLYPH_MANUAL: &str = "⚠️";
// Warning sign without the emoji variation selector.
const GLYPH_MANUAL_BARE: &str = "⚠";

/// Sentinel line for a verdict, with its glyph.
pub fn verdict_line(verdict: Verdict) -> String {
    match verdict {
        Verdict::Approvable => format!("{} {}", GLYPH_APPROVED, SENTINEL_APPROVED),
        Verdict::NotApprovable => format!("{} {}", GLYPH_MANUAL, SENTINEL_MANUAL),
    }
}

pub fn render_markdown(outcome: &CompareOutcome) -> String {
    let mut out = String::new();
    out.push_str("# Config change review\n\n");

    match outcome {
        CompareOutcome::NewEpoch { epoch } => {
            let _ = writeln!(
                out,
                "New epoch `{}`: the old tree has no output for it, nothing to compare yet.\n",
                epoch
            );
        }
        CompareOutcome::Compared(report) => render_report(&mut out, report),
    }

    out.push_str(&verdict_line(Verdict::from(&outcome.verdict())));
    out.push('\n');
    out
}

fn render_report(out: &mut String, report: &ComparisonReport) {
    let _ = writeln!(
        out,
        "Current epoch: {}\n",
        report.current_epoch.as_deref().unwrap_or("unversioned")
    );

    for section in &report.sections {
        render_section(out, section);
    }

    let _ = writeln!(out, "## Change summary\n\n{}\n", report.summary);
    if !report.summary.by_feature.is_empty() {
        for (feature, n) in &report.summary.by_feature {
            let _ = writeln!(out, "- `{}`: {}", feature, n);
        }
        out.push('\n');
    }

    if !report.excepted_domains.is_empty() {
        out.push_str("## Newly excepted domains\n\n");
        for domain in &report.excepted_domains {
            let _ = writeln!(out, "- {}", domain);
        }
        out.push('\n');
    }

    if !report.verdict.reasons.is_empty() {
        out.push_str("## Reasons\n\n");
        for reason in &report.verdict.reasons {
            let _ = writeln!(out, "- {}", reason);
        }
        out.push('\n');
    }
}

fn render_section(out: &mut String, section: &SectionReport) {
    let _ = writeln!(out, "## {}\n", section.key);

    for status in DocumentStatus::ALL {
        let docs: Vec<_> = section.with_status(status).collect();
        if docs.is_empty() {
            continue;
        }
        let _ = writeln!(out, "### {} ({})\n", status.heading(), docs.len());
        for doc in docs {
            match status {
                DocumentStatus::Approved => {
                    let _ = writeln!(out, "- `{}` ({} change(s))", doc.path, doc.changes.len());
                }
                DocumentStatus::ManualReview => {
                    let _ = writeln!(out, "- `{}`", doc.path);
                    for change in &doc.disallowed {
                        let _ = writeln!(out, "  - `{}`", change);
                    }
                }
                DocumentStatus::Error => {
                    let _ = writeln!(
                        out,
                        "- `{}`: {}",
                        doc.path,
                        doc.error.as_deref().unwrap_or("unreadable")
                    );
                }
                DocumentStatus::Added | DocumentStatus::Removed => {
                    let _ = writeln!(out, "- `{}`", doc.path);
                }
            }
        }
        out.push('\n');
    }

    if !section.identical.is_empty() {
        let _ = writeln!(
            out,
            "Identical after normalization: {}\n",
            section.identical.len()
        );
    }
}

pub fn render_json(outcome: &CompareOutcome) -> serde_json::Result<String> {
    serde_json::to_string_pretty(outcome)
}

/// Read the verdict from the last non-empty line of a rendered report.
///
/// A leading verdict glyph and markdown emphasis around the sentinel are
/// ignored; anything else on the line makes it unknown.
pub fn parse_verdict(text: &str) -> Result<Verdict, ReportError> {
    let line = text
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or(ReportError::MissingVerdict)?;

    let sentinel = [GLYPH_APPROVED, GLYPH_MANUAL, GLYPH_MANUAL_BARE]
        .iter()
        .find_map(|glyph| line.strip_prefix(*glyph))
        .unwrap_or(line)
        .trim()
        .trim_matches(|c: char| c == '*' || c == '_');

    match sentinel {
        SENTINEL_APPROVED => Ok(Verdict::Approvable),
        SENTINEL_MANUAL => Ok(Verdict::NotApprovable),
        _ => Err(ReportError::UnknownVerdict {
            line: line.to_string(),
        }),
    }
}
