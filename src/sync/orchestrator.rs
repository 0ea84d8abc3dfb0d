//! Multi-course orchestration.
//!
//! Synchronization runs in two phases:
//!
//! 1. [`SyncOrchestrator::plan`] crawls, diffs and filters every course.
//!    Courses are planned concurrently, at most `crawl_concurrency` at a
//!    time; this pool is separate from the download pool so crawl work can
//!    never starve transfers.
//! 2. [`SyncOrchestrator::execute`] concatenates every course's task list and
//!    hands it to one [`DownloadScheduler`], which enforces the global
//!    transfer bound across all courses. Results are split back per course.
//!
//! The split lets a caller show the plan and ask for confirmation before
//! any byte is written. [`SyncOrchestrator::sync_all`] runs both phases.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use super::{Blacklist, Course, DownloadTask, SyncError, diff};
use crate::crawl::{CrawlFailure, Crawler, DEFAULT_REQUESTS_PER_CRAWL};
use crate::download::{DownloadScheduler, HttpClient, ProgressSink, TaskOutcome};

/// Default number of courses crawled at once.
pub const DEFAULT_CRAWL_CONCURRENCY: usize = 4;

const MAX_CRAWL_CONCURRENCY: usize = 100;

/// The tasks planned for one course.
#[derive(Debug, Clone, Serialize)]
pub struct CoursePlan {
    /// The course.
    pub course: Course,
    /// Files to download, in diff order.
    pub tasks: Vec<DownloadTask>,
}

/// A task removed by the blacklist.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedTask {
    /// Course name.
    pub course: String,
    /// The blocked task.
    pub task: DownloadTask,
}

/// A sub-tree that could not be crawled.
#[derive(Debug, Clone, Serialize)]
pub struct BranchFailure {
    /// Course name.
    pub course: String,
    /// Failure marker from the tree.
    pub failure: CrawlFailure,
}

/// A course whose root listing could not be crawled at all.
#[derive(Debug, Clone, Serialize)]
pub struct CourseFailure {
    /// The course.
    pub course: Course,
    /// Rendered error.
    pub reason: String,
}

/// Everything [`SyncOrchestrator::plan`] found, before any download.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPlan {
    /// Courses with at least one task, in input order.
    pub courses: Vec<CoursePlan>,
    /// Courses that crawled fine but need nothing.
    pub up_to_date: Vec<Course>,
    /// Blacklisted tasks.
    pub skipped: Vec<SkippedTask>,
    /// Sub-trees that could not be crawled.
    pub branch_failures: Vec<BranchFailure>,
    /// Courses that could not be crawled at all.
    pub course_failures: Vec<CourseFailure>,
}

impl SyncPlan {
    /// Total number of planned downloads.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.courses.iter().map(|c| c.tasks.len()).sum()
    }

    /// True when nothing needs downloading.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    /// Tasks planned for the course called `name`.
    #[must_use]
    pub fn tasks_for(&self, name: &str) -> Option<&[DownloadTask]> {
        self.courses
            .iter()
            .find(|c| c.course.name == name)
            .map(|c| c.tasks.as_slice())
    }
}

/// A file written successfully.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadedFile {
    /// Remote URL.
    pub url: String,
    /// Local path.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// A file that failed to download.
#[derive(Debug, Clone, Serialize)]
pub struct FailedDownload {
    /// Remote URL.
    pub url: String,
    /// Intended local path.
    pub path: PathBuf,
    /// Short error label (`network`, `http_status`, ...).
    pub kind: String,
    /// Rendered error.
    pub reason: String,
}

/// Execution result for one course.
#[derive(Debug, Clone, Serialize)]
pub struct CourseReport {
    /// The course.
    pub course: Course,
    /// Files written.
    pub downloaded: Vec<DownloadedFile>,
    /// Files that failed.
    pub failed: Vec<FailedDownload>,
    /// Tasks never started because of an interrupt.
    pub cancelled: Vec<DownloadTask>,
}

impl CourseReport {
    fn new(course: Course) -> Self {
        Self {
            course,
            downloaded: Vec::new(),
            failed: Vec::new(),
            cancelled: Vec::new(),
        }
    }
}

/// Final result of a synchronization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Per-course results, for courses that had work.
    pub courses: Vec<CourseReport>,
    /// Courses that needed nothing.
    pub up_to_date: Vec<Course>,
    /// Blacklisted tasks.
    pub skipped: Vec<SkippedTask>,
    /// Sub-trees that could not be crawled.
    pub branch_failures: Vec<BranchFailure>,
    /// Courses that could not be crawled at all.
    pub course_failures: Vec<CourseFailure>,
    /// True when an interrupt stopped the run early.
    pub interrupted: bool,
}

impl SyncReport {
    /// True when at least one course could not be crawled at all.
    #[must_use]
    pub fn has_total_failure(&self) -> bool {
        !self.course_failures.is_empty()
    }

    /// Number of files written across all courses.
    #[must_use]
    pub fn downloaded_count(&self) -> usize {
        self.courses.iter().map(|c| c.downloaded.len()).sum()
    }

    /// Number of failed files across all courses.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.courses.iter().map(|c| c.failed.len()).sum()
    }

    /// Number of tasks never started.
    #[must_use]
    pub fn cancelled_count(&self) -> usize {
        self.courses.iter().map(|c| c.cancelled.len()).sum()
    }

    /// Bytes written across all courses.
    #[must_use]
    pub fn downloaded_bytes(&self) -> u64 {
        self.courses
            .iter()
            .flat_map(|c| &c.downloaded)
            .map(|f| f.bytes)
            .sum()
    }
}

/// Result of planning one course.
enum CourseOutcome {
    Planned {
        course: Course,
        tasks: Vec<DownloadTask>,
        skipped: Vec<DownloadTask>,
        branch_failures: Vec<CrawlFailure>,
    },
    Failed(CourseFailure),
}

/// Plans and executes multi-course synchronization.
#[derive(Debug, Clone)]
pub struct SyncOrchestrator {
    client: HttpClient,
    crawl_slots: Arc<Semaphore>,
    requests_per_crawl: usize,
    scheduler: DownloadScheduler,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with `download_concurrency` transfer workers
    /// and `crawl_concurrency` course planners.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Scheduler`] or
    /// [`SyncError::InvalidCrawlConcurrency`] when a worker count is outside
    /// 1-100.
    pub fn new(
        client: HttpClient,
        download_concurrency: usize,
        crawl_concurrency: usize,
    ) -> Result<Self, SyncError> {
        if !(1..=MAX_CRAWL_CONCURRENCY).contains(&crawl_concurrency) {
            return Err(SyncError::InvalidCrawlConcurrency {
                value: crawl_concurrency,
            });
        }
        Ok(Self {
            client,
            crawl_slots: Arc::new(Semaphore::new(crawl_concurrency)),
            requests_per_crawl: DEFAULT_REQUESTS_PER_CRAWL,
            scheduler: DownloadScheduler::new(download_concurrency)?,
        })
    }

    /// Sets how many requests one course crawl may have in flight.
    #[must_use]
    pub fn with_requests_per_crawl(mut self, requests: usize) -> Self {
        self.requests_per_crawl = requests.max(1);
        self
    }

    /// Crawls, diffs and filters every course.
    ///
    /// A course whose root listing fails is recorded in
    /// [`SyncPlan::course_failures`]; the other courses are unaffected.
    /// Courses with no remaining tasks appear only in
    /// [`SyncPlan::up_to_date`].
    #[instrument(skip_all, fields(courses = courses.len(), root = %local_root.display()))]
    pub async fn plan(&self, courses: &[Course], local_root: &Path, blacklist: &Blacklist) -> SyncPlan {
        let outcomes = join_all(
            courses
                .iter()
                .map(|course| self.plan_course(course, local_root, blacklist)),
        )
        .await;

        let mut plan = SyncPlan::default();
        for outcome in outcomes {
            match outcome {
                CourseOutcome::Planned {
                    course,
                    tasks,
                    skipped,
                    branch_failures,
                } => {
                    plan.skipped.extend(skipped.into_iter().map(|task| SkippedTask {
                        course: course.name.clone(),
                        task,
                    }));
                    plan.branch_failures
                        .extend(branch_failures.into_iter().map(|failure| BranchFailure {
                            course: course.name.clone(),
                            failure,
                        }));
                    if tasks.is_empty() {
                        plan.up_to_date.push(course);
                    } else {
                        plan.courses.push(CoursePlan { course, tasks });
                    }
                }
                CourseOutcome::Failed(failure) => plan.course_failures.push(failure),
            }
        }

        info!(
            tasks = plan.task_count(),
            courses_with_work = plan.courses.len(),
            up_to_date = plan.up_to_date.len(),
            skipped = plan.skipped.len(),
            failed_courses = plan.course_failures.len(),
            "plan complete"
        );
        plan
    }

    async fn plan_course(&self, course: &Course, local_root: &Path, blacklist: &Blacklist) -> CourseOutcome {
        let _permit = self.crawl_slots.acquire().await.ok();

        let crawler = Crawler::new(self.client.clone(), self.requests_per_crawl);
        let tree = match crawler.crawl(&course.listing_url, &course.name).await {
            Ok(tree) => tree,
            Err(e) => {
                warn!(course = %course.name, error = %e, "course could not be crawled");
                return CourseOutcome::Failed(CourseFailure {
                    course: course.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let branch_failures = tree.failures();
        let root = local_root.to_path_buf();
        let tasks = match tokio::task::spawn_blocking(move || diff(&tree, &root)).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(course = %course.name, error = %e, "diff task aborted");
                return CourseOutcome::Failed(CourseFailure {
                    course: course.clone(),
                    reason: format!("diff aborted: {e}"),
                });
            }
        };
        let (tasks, skipped) = blacklist.partition(tasks);

        info!(
            course = %course.name,
            tasks = tasks.len(),
            skipped = skipped.len(),
            failed_branches = branch_failures.len(),
            "course planned"
        );
        CourseOutcome::Planned {
            course: course.clone(),
            tasks,
            skipped,
            branch_failures,
        }
    }

    /// Downloads every planned task through one scheduler and splits the
    /// results back per course.
    #[instrument(skip_all, fields(tasks = plan.task_count()))]
    pub async fn execute(
        &self,
        plan: SyncPlan,
        progress: Arc<dyn ProgressSink>,
        interrupted: Arc<AtomicBool>,
    ) -> SyncReport {
        let SyncPlan {
            courses,
            up_to_date,
            skipped,
            branch_failures,
            course_failures,
        } = plan;

        let mut reports = Vec::with_capacity(courses.len());
        let mut counts = Vec::with_capacity(courses.len());
        let mut tasks = Vec::new();
        for CoursePlan { course, tasks: course_tasks } in courses {
            counts.push(course_tasks.len());
            tasks.extend(course_tasks);
            reports.push(CourseReport::new(course));
        }

        let run = self
            .scheduler
            .run(&self.client, tasks, progress, interrupted)
            .await;
        let interrupted = run.was_interrupted();

        let mut results = run.results.into_iter();
        for (report, count) in reports.iter_mut().zip(counts) {
            for result in results.by_ref().take(count) {
                let task = result.task;
                match result.outcome {
                    TaskOutcome::Completed { bytes } => report.downloaded.push(DownloadedFile {
                        url: task.remote_url,
                        path: task.local_path,
                        bytes,
                    }),
                    TaskOutcome::Failed(e) => report.failed.push(FailedDownload {
                        url: task.remote_url,
                        path: task.local_path,
                        kind: e.kind().to_string(),
                        reason: e.to_string(),
                    }),
                    TaskOutcome::Cancelled => report.cancelled.push(task),
                }
            }
        }

        SyncReport {
            courses: reports,
            up_to_date,
            skipped,
            branch_failures,
            course_failures,
            interrupted,
        }
    }

    /// Compiles `patterns`, plans every course and executes the plan.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Blacklist`] before any I/O when a pattern does
    /// not compile. Download and crawl failures are reported in the
    /// returned [`SyncReport`], never as errors.
    pub async fn sync_all<S: AsRef<str>>(
        &self,
        courses: &[Course],
        local_root: &Path,
        patterns: &[S],
        progress: Arc<dyn ProgressSink>,
        interrupted: Arc<AtomicBool>,
    ) -> Result<SyncReport, SyncError> {
        let blacklist = Blacklist::new(patterns)?;
        let plan = self.plan(courses, local_root, &blacklist).await;
        Ok(self.execute(plan, progress, interrupted).await)
    }
}
