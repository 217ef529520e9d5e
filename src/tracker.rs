//! Per-file scan progress for the lifetime of one watch process.
//!
//! Maps each watched path to the number of lines already checked. Nothing
//! here touches the filesystem; the supervisor feeds it line counts.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Listings a file may be absent from before pruning drops it.
const PRUNE_AFTER_MISSED: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct WatchedFile {
    lines_scanned: usize,
    missed_listings: u32,
}

/// What the supervisor should do with a file on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAction {
    /// First time this path has been seen: scan everything.
    BeginTracking,
    /// Line count changed to a non-zero value: scan from `from` (the scanner
    /// falls back to 0 if the file shrank below it).
    Rescan { from: usize },
    /// Unchanged, or emptied.
    Skip,
}

#[derive(Debug, Default)]
pub struct ScanTracker {
    files: HashMap<PathBuf, WatchedFile>,
}

impl ScanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines already scanned for `path`, or `None` if it has never been seen.
    pub fn get(&self, path: &Path) -> Option<usize> {
        self.files.get(path).map(|f| f.lines_scanned)
    }

    /// Record the scanned line count for `path`, creating the entry if needed.
    pub fn set(&mut self, path: &Path, lines_scanned: usize) {
        self.files.entry(path.to_path_buf()).or_default().lines_scanned = lines_scanned;
    }

    #[allow(dead_code)]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Decide the action for `path` given its current total line count.
    ///
    /// A transition to zero lines is skipped and the stored count is kept,
    /// so the file is only rescanned once it has content again.
    pub fn action_for(&self, path: &Path, current_total: usize) -> ScanAction {
        match self.get(path) {
            None => ScanAction::BeginTracking,
            Some(scanned) if scanned != current_total && current_total != 0 => {
                ScanAction::Rescan { from: scanned }
            }
            Some(_) => ScanAction::Skip,
        }
    }

    /// Drop entries that were missing from the last two listings.
    ///
    /// `listed` holds every path that matched the extension filter on this
    /// pass. Returns the pruned paths.
    pub fn prune_unlisted(&mut self, listed: &HashSet<PathBuf>) -> Vec<PathBuf> {
        let mut pruned = Vec::new();
        self.files.retain(|path, file| {
            if listed.contains(path) {
                file.missed_listings = 0;
                return true;
            }
            file.missed_listings += 1;
            if file.missed_listings >= PRUNE_AFTER_MISSED {
                pruned.push(path.clone());
                false
            } else {
                true
            }
        });
        pruned.sort();
        pruned
    }
}
