//! End-to-end synchronization tests: crawl, diff, filter and download
//! against a mock course server and a temporary directory.

mod support;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use course_sync::{
    Blacklist, Course, HttpClient, NoopProgress, ProgressEvent, SyncOrchestrator, SyncPlan,
};
use support::course_server::{listing_url, mount_file, mount_listing, mount_status};
use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROOT: &str = "/access/content/group/1/";

/// Root with `a.pdf` (100 bytes) and `sub/b.pdf` (200 bytes).
async fn mount_two_file_course(server: &MockServer) {
    mount_listing(server, ROOT, &[("a.pdf", "a.pdf"), ("sub/", "sub")]).await;
    mount_listing(server, &format!("{ROOT}sub/"), &[("b.pdf", "b.pdf")]).await;
    mount_file(server, &format!("{ROOT}a.pdf"), &[b'a'; 100]).await;
    mount_file(server, &format!("{ROOT}sub/b.pdf"), &[b'b'; 200]).await;
}

fn course(server: &MockServer, name: &str, listing_path: &str) -> Course {
    Course::new(name, &listing_url(server, listing_path)).unwrap()
}

fn orchestrator() -> SyncOrchestrator {
    SyncOrchestrator::new(HttpClient::new(), 2, 2).unwrap()
}

fn not_interrupted() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

fn task_urls(plan: &SyncPlan) -> HashSet<String> {
    plan.courses
        .iter()
        .flat_map(|c| &c.tasks)
        .map(|t| t.remote_url.clone())
        .collect()
}

#[tokio::test]
async fn test_sync_downloads_only_missing_files_and_is_idempotent() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_two_file_course(&mock_server).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let course_dir = temp_dir.path().join("Algebra");
    std::fs::create_dir_all(&course_dir).unwrap();
    std::fs::write(course_dir.join("a.pdf"), [b'x'; 100]).unwrap();

    let courses = vec![course(&mock_server, "Algebra", ROOT)];
    let orchestrator = orchestrator();
    let blacklist = Blacklist::new::<&str>(&[]).unwrap();

    let plan = orchestrator.plan(&courses, temp_dir.path(), &blacklist).await;
    let tasks = plan.tasks_for("Algebra").unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].local_path, course_dir.join("sub").join("b.pdf"));

    let report = orchestrator
        .execute(plan, Arc::new(NoopProgress), not_interrupted())
        .await;
    assert_eq!(report.downloaded_count(), 1);
    assert_eq!(report.downloaded_bytes(), 200);
    assert_eq!(report.failed_count(), 0);
    assert!(!report.has_total_failure());
    assert_eq!(std::fs::read(course_dir.join("sub/b.pdf")).unwrap(), vec![b'b'; 200]);
    // Same size, different content: left alone.
    assert_eq!(std::fs::read(course_dir.join("a.pdf")).unwrap(), vec![b'x'; 100]);

    let second = orchestrator.plan(&courses, temp_dir.path(), &blacklist).await;
    assert!(second.is_empty());
    assert_eq!(second.up_to_date.len(), 1);
    assert_eq!(second.up_to_date[0].name, "Algebra");
}

#[tokio::test]
async fn test_sync_replaces_file_whose_size_changed() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_two_file_course(&mock_server).await;
    let temp_dir = TempDir::new().unwrap();
    let course_dir = temp_dir.path().join("Algebra");
    std::fs::create_dir_all(course_dir.join("sub")).unwrap();
    std::fs::write(course_dir.join("a.pdf"), [b'x'; 99]).unwrap();
    std::fs::write(course_dir.join("sub/b.pdf"), [b'b'; 200]).unwrap();

    let report = orchestrator()
        .sync_all(
            &[course(&mock_server, "Algebra", ROOT)],
            temp_dir.path(),
            &[] as &[&str],
            Arc::new(NoopProgress),
            not_interrupted(),
        )
        .await
        .unwrap();

    assert_eq!(report.downloaded_count(), 1);
    assert_eq!(report.courses[0].downloaded[0].path, course_dir.join("a.pdf"));
    assert_eq!(std::fs::read(course_dir.join("a.pdf")).unwrap(), vec![b'a'; 100]);
}

#[tokio::test]
async fn test_unknown_remote_size_is_always_downloaded() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_listing(&mock_server, ROOT, &[("c.txt", "c.txt")]).await;
    Mock::given(method("HEAD"))
        .and(path(format!("{ROOT}c.txt")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ROOT}c.txt")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let course_dir = temp_dir.path().join("Algebra");
    std::fs::create_dir_all(&course_dir).unwrap();
    std::fs::write(course_dir.join("c.txt"), b"hello").unwrap();

    let courses = vec![course(&mock_server, "Algebra", ROOT)];
    let blacklist = Blacklist::new::<&str>(&[]).unwrap();
    let plan = orchestrator().plan(&courses, temp_dir.path(), &blacklist).await;

    assert_eq!(plan.task_count(), 1);
    assert_eq!(plan.tasks_for("Algebra").unwrap()[0].file_name(), "c.txt");
}

#[tokio::test]
async fn test_more_blacklist_patterns_never_add_tasks() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_listing(
        &mock_server,
        ROOT,
        &[
            ("lecture.mp4", "lecture.mp4"),
            ("draft-notes.pdf", "draft-notes.pdf"),
            ("final.pdf", "final.pdf"),
        ],
    )
    .await;
    for name in ["lecture.mp4", "draft-notes.pdf", "final.pdf"] {
        mount_file(&mock_server, &format!("{ROOT}{name}"), b"content").await;
    }

    let temp_dir = TempDir::new().unwrap();
    let courses = vec![course(&mock_server, "Algebra", ROOT)];
    let orchestrator = orchestrator();

    let mut previous: Option<HashSet<String>> = None;
    for patterns in [vec![], vec![r"\.mp4$"], vec![r"\.mp4$", "^draft"]] {
        let blacklist = Blacklist::new(patterns.as_slice()).unwrap();
        let plan = orchestrator.plan(&courses, temp_dir.path(), &blacklist).await;
        let urls = task_urls(&plan);
        assert_eq!(urls.len() + plan.skipped.len(), 3);
        if let Some(previous) = &previous {
            assert!(urls.is_subset(previous));
        }
        previous = Some(urls);
    }

    let remaining = previous.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|url| url.ends_with("final.pdf")));
}

#[tokio::test]
async fn test_failed_course_does_not_affect_others() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_two_file_course(&mock_server).await;
    mount_status(&mock_server, "/access/content/group/2/", 500).await;

    let temp_dir = TempDir::new().unwrap();
    let courses = vec![
        course(&mock_server, "Broken", "/access/content/group/2/"),
        course(&mock_server, "Algebra", ROOT),
    ];

    let finals = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finals);
    let sink = move |event: &ProgressEvent| {
        if event.is_final() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    };

    let report = orchestrator()
        .sync_all(
            &courses,
            temp_dir.path(),
            &[] as &[&str],
            Arc::new(sink),
            not_interrupted(),
        )
        .await
        .unwrap();

    assert!(report.has_total_failure());
    assert_eq!(report.course_failures.len(), 1);
    assert_eq!(report.course_failures[0].course.name, "Broken");
    assert_eq!(report.downloaded_count(), 2);
    assert_eq!(finals.load(Ordering::SeqCst), 2);
    assert!(temp_dir.path().join("Algebra/a.pdf").is_file());
    assert!(temp_dir.path().join("Algebra/sub/b.pdf").is_file());
    assert!(!temp_dir.path().join("Broken").exists());
}

#[tokio::test]
async fn test_failed_branch_is_reported_and_siblings_sync() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_listing(&mock_server, ROOT, &[("gone/", "gone"), ("a.pdf", "a.pdf")]).await;
    mount_status(&mock_server, &format!("{ROOT}gone/"), 403).await;
    mount_file(&mock_server, &format!("{ROOT}a.pdf"), b"pdf").await;

    let temp_dir = TempDir::new().unwrap();
    let courses = vec![course(&mock_server, "Algebra", ROOT)];
    let blacklist = Blacklist::new::<&str>(&[]).unwrap();
    let plan = orchestrator().plan(&courses, temp_dir.path(), &blacklist).await;

    assert!(plan.course_failures.is_empty());
    assert_eq!(plan.branch_failures.len(), 1);
    assert_eq!(plan.branch_failures[0].course, "Algebra");
    assert_eq!(plan.task_count(), 1);
}
