//! Errors surfaced by a directory pass and by configuration loading.

use std::path::PathBuf;

/// Errors that can occur while watching a directory.
#[derive(Debug)]
pub enum WatchError {
    /// The watched directory does not exist or cannot be listed.
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A single file vanished or became unreadable between listing and open.
    FileAccess {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Anything else while processing a file (e.g. content that is not UTF-8).
    Unexpected {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A report sink failed to write a match.
    Report { source: std::io::Error },
    /// Reporting failed partway through a file. Lines before `scanned` were
    /// delivered; the rest were not.
    ScanInterrupted {
        path: PathBuf,
        scanned: usize,
        source: Box<WatchError>,
    },
}

impl WatchError {
    /// Build the right variant for an I/O failure on a single file.
    ///
    /// Decoding failures abort the pass; every other I/O failure is local
    /// to the file that produced it.
    pub fn for_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::InvalidData => WatchError::Unexpected { path, source },
            _ => WatchError::FileAccess { path, source },
        }
    }

    /// Lines already delivered when a scan was cut short by its sink.
    pub fn scanned(&self) -> Option<usize> {
        match self {
            WatchError::ScanInterrupted { scanned, .. } => Some(*scanned),
            _ => None,
        }
    }

    /// Whether the pass may skip this file and carry on with the rest.
    pub fn is_file_local(&self) -> bool {
        matches!(self, WatchError::FileAccess { .. })
    }

    /// Whether this is a directory listing failure (a configuration problem).
    pub fn is_directory(&self) -> bool {
        matches!(self, WatchError::Directory { .. })
    }
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::Directory { path, source } => {
                write!(f, "cannot list directory {}: {}", path.display(), source)
            }
            WatchError::FileAccess { path, source } => {
                write!(f, "cannot read file {}: {}", path.display(), source)
            }
            WatchError::Unexpected { path, source } => {
                write!(f, "unexpected error processing {}: {}", path.display(), source)
            }
            WatchError::Report { source } => {
                write!(f, "failed to write match report: {}", source)
            }
            WatchError::ScanInterrupted {
                path,
                scanned,
                source,
            } => {
                write!(
                    f,
                    "scan of {} stopped after {} lines: {}",
                    path.display(),
                    scanned,
                    source
                )
            }
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WatchError::Directory { source, .. } => Some(source),
            WatchError::FileAccess { source, .. } => Some(source),
            WatchError::Unexpected { source, .. } => Some(source),
            WatchError::Report { source } => Some(source),
            WatchError::ScanInterrupted { source, .. } => Some(&**source),
        }
    }
}

/// Errors raised while resolving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// A resolved value is out of range or missing.
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::Invalid { field, reason } => {
                write!(f, "invalid {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { .. } => None,
        }
    }
}
