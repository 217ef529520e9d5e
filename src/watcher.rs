//! The run loop: list the watched directory, scan files that changed, sleep,
//! repeat until a stop is requested.
//!
//! A failed pass never ends the loop. Directory errors and unexpected file
//! errors are logged and followed by a longer backoff; unreadable files are
//! skipped for the pass and retried on the next one.

use crate::config::Settings;
use crate::error::WatchError;
use crate::report::{Match, ReportSink};
use crate::scanner;
use crate::signals::StopFlag;
use crate::tracker::{ScanAction, ScanTracker};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// Counts from a single pass over the directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub files_seen: usize,
    pub files_scanned: usize,
    pub matches: usize,
    pub file_errors: usize,
}

/// Totals for a whole run, reported on shutdown.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub passes: u64,
    pub matches: u64,
    pub errors: u64,
}

/// Forwards to the real sink while counting matches.
struct CountingSink<'a> {
    inner: &'a mut dyn ReportSink,
    matches: usize,
}

impl ReportSink for CountingSink<'_> {
    fn tracking_started(&mut self, path: &Path) {
        self.inner.tracking_started(path);
    }

    fn rescanning(&mut self, path: &Path, previous: usize, current: usize) {
        self.inner.rescanning(path, previous, current);
    }

    fn matched(&mut self, m: &Match) -> Result<(), WatchError> {
        self.inner.matched(m)?;
        self.matches += 1;
        Ok(())
    }
}

/// Absolute paths of entries in `dir` whose names end with `extension`,
/// sorted by name. Subdirectories are skipped; not recursive.
///
/// `dir` is canonicalized so a file keeps one tracker key however the
/// directory was spelled.
fn list_candidates(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, WatchError> {
    let dir = std::fs::canonicalize(dir).map_err(|e| WatchError::Directory {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let entries = std::fs::read_dir(&dir).map_err(|e| WatchError::Directory {
        path: dir.clone(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| WatchError::Directory {
            path: dir.clone(),
            source: e,
        })?;
        if !entry.file_name().to_string_lossy().ends_with(extension) {
            continue;
        }
        let path = entry.path();
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            tracing::debug!(path = %path.display(), "skipping directory");
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// One pass over the watched directory.
///
/// Each candidate is read once to count its lines and decide on an action,
/// then handed to [`scanner::scan`]. Unreadable files are logged and
/// skipped; a directory listing failure or an unexpected per-file error
/// aborts the pass.
pub fn scan_directory(
    tracker: &mut ScanTracker,
    settings: &Settings,
    sink: &mut dyn ReportSink,
) -> Result<PassSummary, WatchError> {
    let files = list_candidates(&settings.directory, &settings.extension)?;
    let mut sink = CountingSink {
        inner: sink,
        matches: 0,
    };
    let mut summary = PassSummary {
        files_seen: files.len(),
        ..Default::default()
    };

    for path in &files {
        let total = match scanner::read_file(path) {
            Ok(content) => scanner::count_lines(&content),
            Err(e) if e.is_file_local() => {
                tracing::warn!(error = %e, "skipping file for this pass");
                summary.file_errors += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        let start = match tracker.action_for(path, total) {
            ScanAction::BeginTracking => {
                sink.tracking_started(path);
                tracker.set(path, 0);
                0
            }
            ScanAction::Rescan { from } => {
                sink.rescanning(path, from, total);
                from
            }
            ScanAction::Skip => continue,
        };

        match scanner::scan(path, &settings.magic_word, start, &mut sink) {
            Ok(scanned) => {
                tracker.set(path, scanned);
                summary.files_scanned += 1;
            }
            Err(e) => {
                // Lines already reported must not be reported again.
                if let Some(scanned) = e.scanned() {
                    tracker.set(path, scanned);
                }
                if !e.is_file_local() {
                    return Err(e);
                }
                tracing::warn!(error = %e, "skipping file for this pass");
                summary.file_errors += 1;
            }
        }
    }

    if settings.prune_missing {
        let listed: HashSet<PathBuf> = files.into_iter().collect();
        for path in tracker.prune_unlisted(&listed) {
            tracing::debug!(path = %path.display(), "stopped tracking missing file");
        }
    }

    summary.matches = sink.matches;
    Ok(summary)
}

/// Owns the scan state and report sink for one watched directory.
pub struct Watcher<S: ReportSink> {
    settings: Settings,
    tracker: ScanTracker,
    sink: S,
}

impl<S: ReportSink> Watcher<S> {
    pub fn new(settings: Settings, sink: S) -> Self {
        Self {
            settings,
            tracker: ScanTracker::new(),
            sink,
        }
    }

    #[allow(dead_code)]
    pub fn tracker(&self) -> &ScanTracker {
        &self.tracker
    }

    #[allow(dead_code)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run a single pass.
    pub fn pass(&mut self) -> Result<PassSummary, WatchError> {
        scan_directory(&mut self.tracker, &self.settings, &mut self.sink)
    }

    /// Loop until `stop` is set. The flag is only checked between passes.
    pub async fn run(&mut self, stop: &StopFlag) -> RunSummary {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut passes = 0u64;
        let mut matches = 0u64;
        let mut errors = 0u64;

        while !stop.is_set() {
            passes += 1;
            match self.pass() {
                Ok(summary) => {
                    tracing::debug!(
                        pass = passes,
                        files_seen = summary.files_seen,
                        files_scanned = summary.files_scanned,
                        matches = summary.matches,
                        "pass complete"
                    );
                    matches += summary.matches as u64;
                    errors += summary.file_errors as u64;
                    tokio::time::sleep(self.settings.interval).await;
                }
                Err(e) => {
                    errors += 1;
                    let backoff_secs = self.settings.error_backoff.as_secs_f64();
                    if e.is_directory() {
                        tracing::warn!(
                            error = %e,
                            backoff_secs,
                            "directory pass failed, backing off"
                        );
                    } else {
                        tracing::error!(error = ?e, backoff_secs, "pass aborted, backing off");
                    }
                    tokio::time::sleep(self.settings.error_backoff).await;
                }
            }
        }

        RunSummary {
            started_at,
            elapsed: start.elapsed(),
            passes,
            matches,
            errors,
        }
    }
}
