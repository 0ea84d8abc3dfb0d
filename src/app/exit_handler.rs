//! Exit code logic for the course-sync process.
//!
//! Single responsibility: map a sync result to the process exit outcome.
//! Per-file failures are reported in the summary but never fail the
//! process; only a course that could not be crawled at all does.

use course_sync::{SyncPlan, SyncReport};

use crate::ProcessExit;

/// Determines the process exit outcome from a finished sync.
pub(crate) fn determine_exit_outcome(report: &SyncReport) -> ProcessExit {
    if report.has_total_failure() {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}

/// Determines the process exit outcome when only a plan was produced.
pub(crate) fn determine_plan_outcome(plan: &SyncPlan) -> ProcessExit {
    if plan.course_failures.is_empty() {
        ProcessExit::Success
    } else {
        ProcessExit::Failure
    }
}
