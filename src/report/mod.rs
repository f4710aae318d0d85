pub mod types;

pub use types::{Outcome, Report, ResourceSummary};

use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Build a Report from per-resource summaries.
pub fn build(resources: Vec<ResourceSummary>) -> Report {
    let total_records = resources.iter().map(|r| r.records).sum();
    let success = resources.iter().all(|r| r.outcome == Outcome::Completed);

    Report {
        resources,
        total_records,
        success,
    }
}

/// Output the report to the terminal (default) or to a markdown file.
#[instrument(skip(report), fields(resources = report.resources.len(), success = report.success))]
pub fn output(report: &Report, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(report, path)
        }
    }
}

/// Print the summary to stderr; stdout carries the batches.
///
/// ═══ repository ═══
/// Organizations: acme, initech
/// Status: COMPLETED | 4 batches | 312 records | 2.31s
fn print_terminal_report(report: &Report) {
    eprintln!();
    for resource in &report.resources {
        eprintln!("═══ {} ═══", resource.kind);
        eprintln!("Organizations: {}", organizations_label(resource));
        eprintln!(
            "Status: {} | {} batches | {} records | {:.2}s",
            colorize_outcome(&resource.outcome),
            resource.batches,
            resource.records,
            resource.elapsed.as_secs_f64()
        );
        if let Outcome::Failed(reason) = &resource.outcome {
            eprintln!("  • {}", reason);
        }
        eprintln!();
    }

    let overall = if report.success {
        "OK".green().bold()
    } else {
        "FAILED".red().bold()
    };
    eprintln!("═══ Total: {} records | {} ═══", report.total_records, overall);
    eprintln!();
}

fn write_markdown_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    md.push_str("# Resync report\n\n");

    for resource in &report.resources {
        md.push_str(&format!("## {}\n\n", resource.kind));
        md.push_str(&format!("**Organizations:** {}\n\n", organizations_label(resource)));
        md.push_str(&format!(
            "**Status: {}** | {} batches | {} records | {:.2}s\n\n",
            resource.outcome,
            resource.batches,
            resource.records,
            resource.elapsed.as_secs_f64()
        ));
        if let Outcome::Failed(reason) = &resource.outcome {
            md.push_str(&format!("- {}\n\n", reason));
        }
    }

    md.push_str(&format!(
        "## Total: {} records ({})\n",
        report.total_records,
        if report.success { "OK" } else { "FAILED" }
    ));

    std::fs::write(path, md)?;
    Ok(())
}

fn organizations_label(resource: &ResourceSummary) -> String {
    if resource.organizations.is_empty() {
        "(none)".to_string()
    } else {
        resource.organizations.join(", ")
    }
}

fn colorize_outcome(outcome: &Outcome) -> colored::ColoredString {
    match outcome {
        Outcome::Completed => "COMPLETED".green().bold(),
        Outcome::Cancelled => "CANCELLED".yellow().bold(),
        Outcome::Failed(_) => "FAILED".red().bold(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resync::ResourceKind;
    use std::time::Duration;

    fn summary(kind: ResourceKind, records: usize, outcome: Outcome) -> ResourceSummary {
        ResourceSummary {
            kind,
            organizations: vec!["acme".to_string()],
            batches: 2,
            records,
            elapsed: Duration::from_millis(1500),
            outcome,
        }
    }

    #[test]
    fn test_build_report_totals() {
        let report = build(vec![
            summary(ResourceKind::Repository, 3, Outcome::Completed),
            summary(ResourceKind::PullRequest, 5, Outcome::Completed),
        ]);
        assert_eq!(report.total_records, 8);
        assert!(report.success);
    }

    #[test]
    fn test_build_report_failure_or_cancel_is_unsuccessful() {
        let failed = build(vec![
            summary(ResourceKind::Repository, 3, Outcome::Completed),
            summary(ResourceKind::PullRequest, 0, Outcome::Failed("403".into())),
        ]);
        assert!(!failed.success);

        let cancelled = build(vec![summary(ResourceKind::Organization, 1, Outcome::Cancelled)]);
        assert!(!cancelled.success);
    }

    #[test]
    fn test_build_report_no_resources() {
        let report = build(vec![]);
        assert_eq!(report.total_records, 0);
        assert!(report.success);
    }

    #[test]
    fn test_write_markdown_report() {
        let report = build(vec![
            summary(ResourceKind::Repository, 3, Outcome::Completed),
            summary(
                ResourceKind::PullRequest,
                0,
                Outcome::Failed("GitHub API returned 403 Forbidden".into()),
            ),
        ]);

        let path = std::env::temp_dir().join("github_resync_test_report.md");
        write_markdown_report(&report, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("## repository"));
        assert!(content.contains("**Organizations:** acme"));
        assert!(content.contains("**Status: COMPLETED** | 2 batches | 3 records | 1.50s"));
        assert!(content.contains("- GitHub API returned 403 Forbidden"));
        assert!(content.contains("## Total: 3 records (FAILED)"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_output_to_terminal() {
        let report = build(vec![summary(ResourceKind::Repository, 1, Outcome::Completed)]);
        output(&report, None).unwrap();
    }
}
