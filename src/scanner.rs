//! Magic-word scanning over the unread tail of a file.
//!
//! Lines end at `\n`, `\r\n` or a lone `\r`. A trailing terminator does not
//! start another line.

use crate::error::WatchError;
use crate::report::{Match, ReportSink};
use chrono::Utc;
use std::path::Path;

/// Iterator over the lines of a text, without their terminators.
pub struct Lines<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let Some(end) = self.rest.find(['\r', '\n']) else {
            return Some(std::mem::take(&mut self.rest));
        };
        let line = &self.rest[..end];
        let width = if self.rest[end..].starts_with("\r\n") { 2 } else { 1 };
        self.rest = &self.rest[end + width..];
        Some(line)
    }
}

pub fn lines(content: &str) -> Lines<'_> {
    Lines { rest: content }
}

/// Number of lines in `content`; empty content has none.
pub fn count_lines(content: &str) -> usize {
    lines(content).count()
}

/// Read a watched file in full as UTF-8.
///
/// The handle is opened and closed within this call.
pub fn read_file(path: &Path) -> Result<String, WatchError> {
    std::fs::read_to_string(path).map_err(|e| WatchError::for_file(path, e))
}

/// Open `path` and report every line from `start_line` on that contains
/// `magic_word`. Returns the file's total line count at the time of reading.
pub fn scan(
    path: &Path,
    magic_word: &str,
    start_line: usize,
    sink: &mut dyn ReportSink,
) -> Result<usize, WatchError> {
    let content = read_file(path)?;
    scan_content(path, &content, magic_word, start_line, sink)
}

/// Scan already-read `content` for `path`.
///
/// If `start_line` is past the end the file was truncated or rotated, and the
/// whole current content is scanned again from line 0. When the sink fails,
/// the error is `ScanInterrupted` carrying the index of the line that was
/// not delivered, so the caller can resume there.
pub fn scan_content(
    path: &Path,
    content: &str,
    magic_word: &str,
    start_line: usize,
    sink: &mut dyn ReportSink,
) -> Result<usize, WatchError> {
    let total = count_lines(content);
    let start = if start_line > total {
        tracing::debug!(
            path = %path.display(),
            start_line,
            total,
            "file shrank, scanning from the beginning"
        );
        0
    } else {
        start_line
    };

    tracing::debug!(path = %path.display(), start, total, magic_word, "scanning");

    for (idx, line) in lines(content).enumerate().skip(start) {
        if !line.contains(magic_word) {
            continue;
        }
        let found = Match {
            path: path.to_path_buf(),
            magic_word: magic_word.to_string(),
            line: idx + 1,
            text: line.to_string(),
            found_at: Utc::now(),
        };
        sink.matched(&found).map_err(|e| WatchError::ScanInterrupted {
            path: path.to_path_buf(),
            scanned: idx,
            source: Box::new(e),
        })?;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemorySink;
    use tempfile::TempDir;

    #[test]
    fn count_lines_matches_readline_semantics() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("one"), 1);
        assert_eq!(count_lines("one\n"), 1);
        assert_eq!(count_lines("one\ntwo"), 2);
        assert_eq!(count_lines("one\n\nthree\n"), 3);
        assert_eq!(count_lines("\n"), 1);
        assert_eq!(count_lines("a\r\nb\r\n"), 2);
    }

    #[test]
    fn lone_carriage_return_ends_a_line() {
        assert_eq!(count_lines("x\rFOO\r"), 2);
        assert_eq!(lines("a\rb\r\nc\n\nd").collect::<Vec<_>>(), vec!["a", "b", "c", "", "d"]);

        let mut sink = MemorySink::default();
        let total = scan_content(Path::new("a.txt"), "x\rFOO\r", "FOO", 0, &mut sink).unwrap();
        assert_eq!(total, 2);
        assert_eq!(sink.match_lines(), vec![("a.txt".to_string(), 2)]);
        assert_eq!(sink.matches[0].text, "FOO");
    }

    #[test]
    fn sink_failure_reports_resume_line() {
        struct FailOnSecond(usize);
        impl ReportSink for FailOnSecond {
            fn matched(&mut self, _: &Match) -> Result<(), WatchError> {
                self.0 += 1;
                if self.0 == 2 {
                    return Err(WatchError::Report {
                        source: std::io::Error::other("closed"),
                    });
                }
                Ok(())
            }
        }

        let mut sink = FailOnSecond(0);
        let err = scan_content(Path::new("a.txt"), "FOO\nx\nFOO\nFOO\n", "FOO", 0, &mut sink)
            .unwrap_err();
        assert_eq!(err.scanned(), Some(2));
    }

    #[test]
    fn reports_matching_line_once() {
        let mut sink = MemorySink::default();
        let total = scan_content(
            Path::new("/w/a.txt"),
            "hello\nFOO here\nbye\n",
            "FOO",
            0,
            &mut sink,
        )
        .unwrap();

        assert_eq!(total, 3);
        assert_eq!(sink.match_lines(), vec![("a.txt".to_string(), 2)]);
        assert_eq!(sink.matches[0].text, "FOO here");
        assert_eq!(sink.matches[0].magic_word, "FOO");
    }

    #[test]
    fn one_report_per_line_not_per_occurrence() {
        let mut sink = MemorySink::default();
        scan_content(Path::new("a.txt"), "FOO FOO FOO\n", "FOO", 0, &mut sink).unwrap();
        assert_eq!(sink.matches.len(), 1);
    }

    #[test]
    fn match_is_case_sensitive_substring() {
        let mut sink = MemorySink::default();
        scan_content(
            Path::new("a.txt"),
            "foo\nFoo\nxxFOOxx\nFOOBAR\n",
            "FOO",
            0,
            &mut sink,
        )
        .unwrap();
        assert_eq!(
            sink.match_lines(),
            vec![("a.txt".to_string(), 3), ("a.txt".to_string(), 4)]
        );
    }

    #[test]
    fn skips_lines_before_start() {
        let mut sink = MemorySink::default();
        let total = scan_content(
            Path::new("a.txt"),
            "hello\nFOO here\nbye\nFOO again\n",
            "FOO",
            3,
            &mut sink,
        )
        .unwrap();
        assert_eq!(total, 4);
        assert_eq!(sink.match_lines(), vec![("a.txt".to_string(), 4)]);
    }

    #[test]
    fn start_past_end_rescans_from_zero() {
        let mut sink = MemorySink::default();
        let total = scan_content(Path::new("a.txt"), "FOO\nbar\n", "FOO", 10, &mut sink).unwrap();
        assert_eq!(total, 2);
        assert_eq!(sink.match_lines(), vec![("a.txt".to_string(), 1)]);
    }

    #[test]
    fn start_equal_to_total_reports_nothing() {
        let mut sink = MemorySink::default();
        let total = scan_content(Path::new("a.txt"), "FOO\n", "FOO", 1, &mut sink).unwrap();
        assert_eq!(total, 1);
        assert!(sink.matches.is_empty());
    }

    #[test]
    fn empty_file_yields_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();

        let mut sink = MemorySink::default();
        assert_eq!(scan(&path, "FOO", 0, &mut sink).unwrap(), 0);
        assert!(sink.matches.is_empty());
    }

    #[test]
    fn scan_reads_file_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "x\nmagic\n").unwrap();

        let mut sink = MemorySink::default();
        assert_eq!(scan(&path, "magic", 0, &mut sink).unwrap(), 2);
        assert_eq!(sink.matches[0].path, path);
        assert_eq!(sink.matches[0].line, 2);
    }

    #[test]
    fn missing_file_is_file_access_error() {
        let dir = TempDir::new().unwrap();
        let mut sink = MemorySink::default();
        let err = scan(&dir.path().join("gone.txt"), "FOO", 0, &mut sink).unwrap_err();
        assert!(matches!(err, WatchError::FileAccess { .. }));
    }

    #[test]
    fn non_utf8_content_is_unexpected_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bin.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let mut sink = MemorySink::default();
        let err = scan(&path, "FOO", 0, &mut sink).unwrap_err();
        assert!(matches!(err, WatchError::Unexpected { .. }));
    }
}
