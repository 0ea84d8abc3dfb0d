//! End-to-end CLI tests for the course-sync binary.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

mod support;

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use support::course_server::{listing_url, mount_file, mount_listing, mount_status};
use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use wiremock::MockServer;

const ROOT: &str = "/access/content/group/1/";
const OFFLINE_COURSE: &str = "Algebra=https://course.example.edu/portal/site/1";

/// Binary isolated from the user's config file.
fn course_sync(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("course-sync").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(config_home: &Path, contents: &str) {
    let config_dir = config_home.join("course-sync");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), contents).unwrap();
}

async fn mount_course(server: &MockServer) {
    mount_listing(server, ROOT, &[("a.pdf", "a.pdf"), ("clip.mp4", "clip.mp4")]).await;
    mount_file(server, &format!("{ROOT}a.pdf"), b"PDF-1.7").await;
    mount_file(server, &format!("{ROOT}clip.mp4"), b"MP4").await;
}

#[test]
fn test_binary_help_displays_usage() {
    let tempdir = TempDir::new().unwrap();
    course_sync(tempdir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--blacklist"))
        .stdout(predicate::str::contains("NAME=URL"));
}

#[test]
fn test_binary_version_displays_version() {
    let tempdir = TempDir::new().unwrap();
    course_sync(tempdir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("course-sync"));
}

#[test]
fn test_binary_without_courses_is_usage_error() {
    let tempdir = TempDir::new().unwrap();
    course_sync(tempdir.path()).assert().code(2);
}

#[test]
fn test_binary_malformed_course_is_usage_error() {
    let tempdir = TempDir::new().unwrap();
    course_sync(tempdir.path())
        .arg("Algebra")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid course"));
}

#[test]
fn test_binary_invalid_blacklist_pattern_exits_two() {
    let tempdir = TempDir::new().unwrap();
    course_sync(tempdir.path())
        .args(["-b", "(unclosed", "--dry-run", OFFLINE_COURSE])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid blacklist pattern"));
}

#[test]
fn test_binary_unknown_config_key_exits_two() {
    let tempdir = TempDir::new().unwrap();
    write_config(tempdir.path(), "bogus = 1\n");
    course_sync(tempdir.path())
        .args(["--dry-run", OFFLINE_COURSE])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[tokio::test]
async fn test_binary_dry_run_prints_plan_without_downloading() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_course(&mock_server).await;

    let tempdir = TempDir::new().unwrap();
    let output_dir = tempdir.path().join("sync");
    course_sync(tempdir.path())
        .arg("--dry-run")
        .arg("-d")
        .arg(&output_dir)
        .arg(format!("Algebra={}", listing_url(&mock_server, ROOT)))
        .assert()
        .success()
        .stdout(predicate::str::contains("Algebra (2 files):"))
        .stdout(predicate::str::contains("a.pdf"))
        .stdout(predicate::str::contains("clip.mp4"));

    assert!(!output_dir.exists());
}

#[tokio::test]
async fn test_binary_config_blacklist_applies() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_course(&mock_server).await;

    let tempdir = TempDir::new().unwrap();
    write_config(tempdir.path(), "blacklist = [\"mp4$\"]\n");
    course_sync(tempdir.path())
        .arg("--dry-run")
        .arg("-d")
        .arg(tempdir.path().join("sync"))
        .arg(format!("Algebra={}", listing_url(&mock_server, ROOT)))
        .assert()
        .success()
        .stdout(predicate::str::contains("Algebra (1 file):"))
        .stdout(predicate::str::contains("Blacklisted: 1 file"));
}

#[tokio::test]
async fn test_binary_sync_downloads_and_summarizes() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_course(&mock_server).await;

    let tempdir = TempDir::new().unwrap();
    let output_dir = tempdir.path().join("sync");
    let course = format!("Algebra={}", listing_url(&mock_server, ROOT));
    course_sync(tempdir.path())
        .args(["-y", "-q", "-b", r"\.mp4$", "-d"])
        .arg(&output_dir)
        .arg(&course)
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloaded 1 file"));

    assert_eq!(
        std::fs::read(output_dir.join("Algebra/a.pdf")).unwrap(),
        b"PDF-1.7"
    );
    assert!(!output_dir.join("Algebra/clip.mp4").exists());

    // A second run finds nothing new.
    course_sync(tempdir.path())
        .args(["-y", "-q", "-b", r"\.mp4$", "-d"])
        .arg(&output_dir)
        .arg(&course)
        .assert()
        .success()
        .stdout(predicate::str::contains("Algebra: up to date"));
}

#[tokio::test]
async fn test_binary_json_dry_run_is_machine_readable() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_course(&mock_server).await;

    let tempdir = TempDir::new().unwrap();
    let assert = course_sync(tempdir.path())
        .args(["--dry-run", "--json", "-q", "-d"])
        .arg(tempdir.path().join("sync"))
        .arg(format!("Algebra={}", listing_url(&mock_server, ROOT)))
        .assert()
        .success();

    let plan: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let tasks = plan["courses"][0]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(plan["courses"][0]["course"]["name"], "Algebra");
}

#[tokio::test]
async fn test_binary_unreachable_course_exits_one() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_course(&mock_server).await;
    mount_status(&mock_server, "/access/content/group/2/", 500).await;

    let tempdir = TempDir::new().unwrap();
    let assert = course_sync(tempdir.path())
        .args(["-y", "-q", "-d"])
        .arg(tempdir.path().join("sync"))
        .arg(format!("Broken={}", listing_url(&mock_server, "/access/content/group/2/")))
        .arg(format!("Algebra={}", listing_url(&mock_server, ROOT)))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Broken: FAILED"))
        .stdout(predicate::str::contains("Downloaded 2 files"));
    assert_eq!(assert.get_output().status.code(), Some(1));
    assert!(tempdir.path().join("sync/Algebra/a.pdf").is_file());
}
