//! Report sinks: where tracking, rescan and match events go.
//!
//! The default sink logs through `tracing`. The JSON-lines sink writes one
//! object per match to any writer (stdout in production) for piping into
//! other tools; lifecycle events still go to the log.

use crate::error::WatchError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A line containing the magic word.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub path: PathBuf,
    pub magic_word: String,
    /// 1-based line number.
    pub line: usize,
    pub text: String,
    pub found_at: DateTime<Utc>,
}

pub trait ReportSink {
    /// A file was seen for the first time.
    fn tracking_started(&mut self, path: &Path) {
        tracing::info!(path = %path.display(), "began tracking file");
    }

    /// A tracked file's line count changed and it is being scanned again.
    fn rescanning(&mut self, path: &Path, previous: usize, current: usize) {
        tracing::info!(
            path = %path.display(),
            previous_lines = previous,
            current_lines = current,
            "file changed, rescanning"
        );
    }

    /// A newly scanned line contains the magic word.
    fn matched(&mut self, m: &Match) -> Result<(), WatchError>;
}

/// Logs every event through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn matched(&mut self, m: &Match) -> Result<(), WatchError> {
        tracing::info!(
            path = %m.path.display(),
            line = m.line,
            "match for {:?} at line {} in {}",
            m.magic_word,
            m.line,
            m.path.display()
        );
        Ok(())
    }
}

/// Writes matches as JSON lines.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn matched(&mut self, m: &Match) -> Result<(), WatchError> {
        serde_json::to_writer(&mut self.out, m)
            .map_err(|e| WatchError::Report { source: e.into() })?;
        self.out
            .write_all(b"\n")
            .and_then(|()| self.out.flush())
            .map_err(|e| WatchError::Report { source: e })
    }
}

/// Collects events in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub tracked: Vec<PathBuf>,
    pub rescans: Vec<(PathBuf, usize, usize)>,
    pub matches: Vec<Match>,
}

#[cfg(test)]
impl MemorySink {
    /// (file name, line) pairs for every recorded match.
    pub fn match_lines(&self) -> Vec<(String, usize)> {
        self.matches
            .iter()
            .map(|m| {
                let name = m
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (name, m.line)
            })
            .collect()
    }
}

#[cfg(test)]
impl ReportSink for MemorySink {
    fn tracking_started(&mut self, path: &Path) {
        self.tracked.push(path.to_path_buf());
    }

    fn rescanning(&mut self, path: &Path, previous: usize, current: usize) {
        self.rescans.push((path.to_path_buf(), previous, current));
    }

    fn matched(&mut self, m: &Match) -> Result<(), WatchError> {
        self.matches.push(m.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Match {
        Match {
            path: PathBuf::from("/w/a.txt"),
            magic_word: "FOO".to_string(),
            line: 2,
            text: "FOO here".to_string(),
            found_at: Utc::now(),
        }
    }

    #[test]
    fn json_sink_writes_one_object_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.matched(&sample()).unwrap();
        sink.matched(&sample()).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["path"], "/w/a.txt");
        assert_eq!(value["magic_word"], "FOO");
        assert_eq!(value["line"], 2);
        assert_eq!(value["text"], "FOO here");
        assert!(value["found_at"].is_string());
    }

    #[test]
    fn json_sink_keeps_lifecycle_events_out_of_the_stream() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.tracking_started(Path::new("/w/a.txt"));
        sink.rescanning(Path::new("/w/a.txt"), 1, 3);
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn json_sink_surfaces_write_failures() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut sink = JsonLinesSink::new(Broken);
        let err = sink.matched(&sample()).unwrap_err();
        assert!(matches!(err, WatchError::Report { .. }));
    }

    #[test]
    fn tracing_sink_never_fails() {
        let mut sink = TracingSink;
        sink.tracking_started(Path::new("/w/a.txt"));
        sink.rescanning(Path::new("/w/a.txt"), 1, 2);
        assert!(sink.matched(&sample()).is_ok());
    }
}
