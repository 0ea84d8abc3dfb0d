//! Progress rendering for transfers.
//!
//! On a terminal every active transfer gets an `indicatif` bar inside one
//! `MultiProgress`. Elsewhere (pipes, CI logs, dumb terminals) each event is
//! printed as a `name(pct%): xKB/yKB zKB/s` line, at most once per second per
//! file plus the final line.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use course_sync::download::{NoopProgress, ProgressEvent, ProgressSink, format_progress_line};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const LINE_INTERVAL: Duration = Duration::from_secs(1);

const BAR_TEMPLATE: &str =
    "{msg:30!} [{bar:30}] {bytes:>10}/{total_bytes:<10} {binary_bytes_per_sec:>12}";

const SPINNER_TEMPLATE: &str = "{spinner} {msg:30!} {bytes:>10} {binary_bytes_per_sec:>12}";

/// Which renderer to use for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProgressMode {
    Bars,
    Lines,
    Off,
}

pub(crate) fn select_mode(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> ProgressMode {
    if quiet {
        ProgressMode::Off
    } else if stderr_is_terminal && !dumb_terminal {
        ProgressMode::Bars
    } else {
        ProgressMode::Lines
    }
}

pub(crate) fn build_sink(mode: ProgressMode) -> Arc<dyn ProgressSink> {
    match mode {
        ProgressMode::Bars => Arc::new(BarProgress::new()),
        ProgressMode::Lines => Arc::new(LineProgress::new(io::stderr())),
        ProgressMode::Off => Arc::new(NoopProgress),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// One `indicatif` bar per in-flight file.
pub(crate) struct BarProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<PathBuf, ProgressBar>>,
}

impl BarProgress {
    pub(crate) fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn new_bar(&self, event: &ProgressEvent) -> ProgressBar {
        let bar = match event.total_bytes {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        bar.set_message(file_label(&event.local_path));
        self.multi.add(bar)
    }
}

impl ProgressSink for BarProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        if event.is_final() {
            if let Some(bar) = bars.remove(&event.local_path) {
                bar.finish_and_clear();
                self.multi.remove(&bar);
            }
            return;
        }
        let bar = bars
            .entry(event.local_path.clone())
            .or_insert_with(|| self.new_bar(event));
        bar.set_position(event.bytes_so_far);
    }

    fn on_failed(&self, local_path: &Path) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        if let Some(bar) = bars.remove(local_path) {
            bar.abandon_with_message(format!("{} (failed)", file_label(local_path)));
        }
    }
}

/// Throttled plain-text progress lines.
pub(crate) struct LineProgress<W: Write + Send> {
    state: Mutex<LineState<W>>,
}

struct LineState<W> {
    out: W,
    last_emitted: HashMap<PathBuf, Instant>,
}

impl<W: Write + Send> LineProgress<W> {
    pub(crate) fn new(out: W) -> Self {
        Self {
            state: Mutex::new(LineState {
                out,
                last_emitted: HashMap::new(),
            }),
        }
    }

    fn on_progress_at(&self, event: &ProgressEvent, now: Instant) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let due = event.is_final()
            || state
                .last_emitted
                .get(&event.local_path)
                .is_none_or(|last| now.saturating_duration_since(*last) >= LINE_INTERVAL);
        if !due {
            return;
        }
        if event.is_final() {
            state.last_emitted.remove(&event.local_path);
        } else {
            state.last_emitted.insert(event.local_path.clone(), now);
        }
        let line = format_progress_line(event);
        // Best effort: write errors are ignored.
        let _ = writeln!(state.out, "{line}");
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        match self.state.into_inner() {
            Ok(state) => state.out,
            Err(poisoned) => poisoned.into_inner().out,
        }
    }
}

impl<W: Write + Send> ProgressSink for LineProgress<W> {
    fn on_progress(&self, event: &ProgressEvent) {
        self.on_progress_at(event, Instant::now());
    }

    fn on_failed(&self, local_path: &Path) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.last_emitted.remove(local_path);
        let _ = writeln!(state.out, "{}: failed", file_label(local_path));
    }
}
