//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use course_sync::Course;

/// Mirror course resource folders onto the local disk.
///
/// Each COURSE is `NAME=URL`, where URL is either a resource listing URL
/// (`.../access/content/group/<id>/`) or a course site URL
/// (`.../portal/site/<id>`). Files are stored under `<DIR>/<NAME>/`; only
/// files that are missing or whose size changed are downloaded.
#[derive(Parser, Debug)]
#[command(name = "course-sync")]
#[command(author, version, about)]
pub struct Args {
    /// Courses to synchronize, as NAME=URL
    #[arg(required = true, value_name = "COURSE", value_parser = parse_course)]
    pub courses: Vec<Course>,

    /// Directory the course folders are created in [default: .]
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Skip files whose name matches this regular expression (repeatable)
    #[arg(short = 'b', long = "blacklist", value_name = "PATTERN")]
    pub blacklist: Vec<String>,

    /// Maximum concurrent downloads across all courses (1-100) [default: 4]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Maximum courses crawled at once (1-100) [default: 4]
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub crawl_concurrency: Option<u8>,

    /// Session cookie sent with every request, as NAME=VALUE (repeatable)
    #[arg(long = "cookie", value_name = "NAME=VALUE", value_parser = parse_cookie)]
    pub cookies: Vec<(String, String)>,

    /// HTTP connect timeout in seconds (1-3600) [default: 30]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// HTTP read timeout in seconds (1-3600) [default: 300]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Download without asking for confirmation
    #[arg(short = 'y', long = "yes")]
    pub assume_yes: bool,

    /// Show what would be downloaded, then exit
    #[arg(long)]
    pub dry_run: bool,

    /// Print the plan or final report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Read defaults from this config file instead of the standard location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

fn parse_course(raw: &str) -> Result<Course, String> {
    raw.parse::<Course>().map_err(|e| e.to_string())
}

fn parse_cookie(raw: &str) -> Result<(String, String), String> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(format!("expected NAME=VALUE, got '{raw}'"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("cookie name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}
