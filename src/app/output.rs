//! Plan and summary rendering on stdout.

use std::path::Path;

use anyhow::Result;
use course_sync::{SyncPlan, SyncReport};
use serde::Serialize;

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub(crate) fn truncate_to_width(text: &str, width: usize) -> String {
    let text_len = text.chars().count();
    if text_len <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    if width == 1 {
        return "…".to_string();
    }

    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Lines describing what a plan will do, grouped by course.
pub(crate) fn plan_lines(plan: &SyncPlan, root: &Path, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for course_plan in &plan.courses {
        lines.push(format!(
            "{} ({} file{}):",
            course_plan.course.name,
            course_plan.tasks.len(),
            plural(course_plan.tasks.len())
        ));
        for task in &course_plan.tasks {
            lines.push(truncate_to_width(
                &format!("  {}", display_relative(&task.local_path, root)),
                width,
            ));
        }
    }
    for course in &plan.up_to_date {
        lines.push(format!("{}: up to date", course.name));
    }
    if !plan.skipped.is_empty() {
        lines.push(format!("Blacklisted: {} file{}", plan.skipped.len(), plural(plan.skipped.len())));
    }
    for failure in &plan.branch_failures {
        lines.push(truncate_to_width(
            &format!(
                "  warning: {} folder {} could not be listed: {}",
                failure.course, failure.failure.url, failure.failure.message
            ),
            width,
        ));
    }
    for failure in &plan.course_failures {
        lines.push(format!("{}: FAILED ({})", failure.course.name, failure.reason));
    }
    lines
}

/// Lines summarizing a finished sync: totals, then one block per course
/// listing the files written, blacklisted and failed.
pub(crate) fn summary_lines(report: &SyncReport, root: &Path, width: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "Downloaded {} file{} ({} KB), {} failed, {} skipped{}",
        report.downloaded_count(),
        plural(report.downloaded_count()),
        report.downloaded_bytes() / 1024,
        report.failed_count(),
        report.skipped.len(),
        if report.interrupted {
            format!(", {} not started (interrupted)", report.cancelled_count())
        } else {
            String::new()
        }
    )];

    let mut course_names: Vec<&str> = report.courses.iter().map(|c| c.course.name.as_str()).collect();
    for skipped in &report.skipped {
        if !course_names.contains(&skipped.course.as_str()) {
            course_names.push(&skipped.course);
        }
    }

    for name in course_names {
        lines.push(format!("{name}:"));
        let course = report.courses.iter().find(|c| c.course.name == name);
        if let Some(course) = course {
            for done in &course.downloaded {
                lines.push(truncate_to_width(
                    &format!("  downloaded {}", display_relative(&done.path, root)),
                    width,
                ));
            }
        }
        for skipped in report.skipped.iter().filter(|s| s.course == name) {
            lines.push(truncate_to_width(
                &format!("  blacklisted {}", display_relative(&skipped.task.local_path, root)),
                width,
            ));
        }
        if let Some(course) = course {
            for failed in &course.failed {
                lines.push(truncate_to_width(
                    &format!(
                        "  failed [{}] {}: {}",
                        failed.kind,
                        display_relative(&failed.path, root),
                        failed.reason
                    ),
                    width,
                ));
            }
            if !course.cancelled.is_empty() {
                lines.push(format!("  {} not started", course.cancelled.len()));
            }
        }
    }

    for failure in &report.course_failures {
        lines.push(format!(
            "Course {} could not be synchronized: {}",
            failure.course.name, failure.reason
        ));
    }
    if !report.branch_failures.is_empty() {
        lines.push(format!(
            "{} folder{} could not be listed; run again to retry",
            report.branch_failures.len(),
            plural(report.branch_failures.len())
        ));
    }
    lines
}

pub(crate) fn print_plan(plan: &SyncPlan, root: &Path) {
    let width = terminal_width();
    for line in plan_lines(plan, root, width) {
        println!("{line}");
    }
}

pub(crate) fn print_summary(report: &SyncReport, root: &Path) {
    let width = terminal_width();
    for line in summary_lines(report, root, width) {
        println!("{line}");
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}
