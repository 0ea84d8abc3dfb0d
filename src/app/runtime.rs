use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use course_sync::{
    Blacklist, Course, HttpClient, NoopProgress, ProgressSink, SyncOrchestrator, SyncReport,
};
use reqwest::cookie::Jar;
use tracing::{debug, info, warn};
use url::Url;

use crate::ProcessExit;
use crate::app::{config, exit_handler, output, progress, terminal};
use crate::cli::Args;

pub(crate) async fn run_course_sync() -> Result<ProcessExit> {
    let args = Args::parse();

    // Tracing depends on the config file, so config errors go straight to stderr.
    let settings = match config::resolve_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Ok(ProcessExit::ConfigError);
        }
    };
    let blacklist = match Blacklist::new(&settings.blacklist) {
        Ok(blacklist) => blacklist,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(ProcessExit::ConfigError);
        }
    };

    terminal::init_tracing(settings.default_log_level);
    debug!(?args, ?settings, "CLI arguments parsed");
    info!(courses = args.courses.len(), "course-sync starting");

    let client = build_client(&args.courses, &args.cookies, &settings)?;
    let orchestrator =
        match SyncOrchestrator::new(client, settings.concurrency, settings.crawl_concurrency) {
            Ok(orchestrator) => orchestrator,
            Err(e) => {
                eprintln!("error: {e}");
                return Ok(ProcessExit::ConfigError);
            }
        };

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let plan = orchestrator
        .plan(&args.courses, &settings.output_dir, &blacklist)
        .await;

    if args.dry_run {
        if args.json {
            output::print_json(&plan)?;
        } else {
            output::print_plan(&plan, &settings.output_dir);
        }
        return Ok(exit_handler::determine_plan_outcome(&plan));
    }

    if !args.json {
        output::print_plan(&plan, &settings.output_dir);
    }

    if !plan.is_empty() && !settings.assume_yes {
        let question = format!("Download {} file(s)?", plan.task_count());
        if !terminal::confirm(&question).context("Failed to read confirmation")? {
            info!("Aborted; nothing was downloaded");
            return Ok(exit_handler::determine_plan_outcome(&plan));
        }
    }

    let sink: Arc<dyn ProgressSink> = if plan.is_empty() {
        Arc::new(NoopProgress)
    } else {
        progress::build_sink(progress::select_mode(
            io::stderr().is_terminal(),
            args.quiet,
            terminal::is_dumb_terminal(),
        ))
    };
    let report = orchestrator.execute(plan, sink, interrupted).await;

    finish(&args, &settings.output_dir, &report)?;
    Ok(exit_handler::determine_exit_outcome(&report))
}

fn finish(args: &Args, output_dir: &Path, report: &SyncReport) -> Result<()> {
    if args.json {
        output::print_json(report)?;
    } else {
        output::print_summary(report, output_dir);
    }

    info!(
        downloaded = report.downloaded_count(),
        failed = report.failed_count(),
        skipped = report.skipped.len(),
        failed_courses = report.course_failures.len(),
        "Sync complete"
    );
    if report.interrupted {
        warn!(
            not_started = report.cancelled_count(),
            "Interrupted. Run again to fetch the remaining files."
        );
    }
    Ok(())
}

/// Builds the shared client, attaching every `--cookie` to each course's
/// origin.
fn build_client(
    courses: &[Course],
    cookies: &[(String, String)],
    settings: &config::Settings,
) -> Result<HttpClient> {
    let jar = Arc::new(Jar::default());
    for course in courses {
        let url = Url::parse(&course.listing_url)
            .with_context(|| format!("Invalid listing URL '{}'", course.listing_url))?;
        for (name, value) in cookies {
            jar.add_cookie_str(&format!("{name}={value}; Path=/"), &url);
        }
    }
    if !cookies.is_empty() {
        debug!(cookies = cookies.len(), courses = courses.len(), "session cookies attached");
    }
    Ok(HttpClient::with_session(
        jar,
        settings.connect_timeout_secs,
        settings.read_timeout_secs,
    ))
}
