use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration, optionally loaded from a TOML file.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct WatchConfig {
    pub watch: WatchSection,
    pub timing: TimingConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    pub directory: Option<PathBuf>,
    pub magic_word: Option<String>,
    /// Literal filename suffix, e.g. `.txt`.
    pub extension: String,
    /// Drop tracker entries for files missing from two consecutive listings.
    pub prune_missing: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Seconds between passes; fractions allowed.
    pub interval_secs: f64,
    /// Seconds to wait after a failed pass before trying again.
    pub error_backoff_secs: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ReportConfig {
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Matches are logged like every other event.
    #[default]
    Log,
    /// Matches are written to stdout as JSON lines.
    Json,
}

/// Values given on the command line. `None` leaves the file value alone.
#[derive(Debug, Default)]
pub struct Overrides {
    pub directory: Option<PathBuf>,
    pub magic_word: Option<String>,
    pub interval_secs: Option<f64>,
    pub extension: Option<String>,
    pub error_backoff_secs: Option<f64>,
    pub prune_missing: bool,
    pub json: bool,
}

/// Fully resolved and validated settings for one watch process.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub directory: PathBuf,
    pub magic_word: String,
    pub extension: String,
    pub interval: Duration,
    pub error_backoff: Duration,
    pub prune_missing: bool,
    pub report_format: ReportFormat,
}

// --- Default implementations ---

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            directory: None,
            magic_word: None,
            extension: ".txt".to_string(),
            prune_missing: false,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1.0,
            error_backoff_secs: 10.0,
        }
    }
}

impl WatchConfig {
    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(path, &contents)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Apply command-line overrides on top of file values.
    pub fn merge(mut self, overrides: Overrides) -> Self {
        if overrides.directory.is_some() {
            self.watch.directory = overrides.directory;
        }
        if overrides.magic_word.is_some() {
            self.watch.magic_word = overrides.magic_word;
        }
        if let Some(ext) = overrides.extension {
            self.watch.extension = ext;
        }
        if let Some(secs) = overrides.interval_secs {
            self.timing.interval_secs = secs;
        }
        if let Some(secs) = overrides.error_backoff_secs {
            self.timing.error_backoff_secs = secs;
        }
        if overrides.prune_missing {
            self.watch.prune_missing = true;
        }
        if overrides.json {
            self.report.format = ReportFormat::Json;
        }
        self
    }

    /// Check every value and produce the settings the watcher runs with.
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let directory = match self.watch.directory {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => return Err(invalid("directory", "a directory to watch is required")),
        };
        let magic_word = match self.watch.magic_word {
            Some(w) if !w.is_empty() => w,
            _ => return Err(invalid("magic_word", "a non-empty magic word is required")),
        };
        if self.watch.extension.is_empty() {
            return Err(invalid("extension", "must not be empty"));
        }
        let interval = seconds("interval", self.timing.interval_secs, false)?;
        let error_backoff = seconds("error_backoff", self.timing.error_backoff_secs, true)?;

        Ok(Settings {
            directory,
            magic_word,
            extension: self.watch.extension,
            interval,
            error_backoff,
            prune_missing: self.watch.prune_missing,
            report_format: self.report.format,
        })
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn seconds(field: &'static str, value: f64, allow_zero: bool) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < 0.0 || (!allow_zero && value == 0.0) {
        let bound = if allow_zero { "zero or more" } else { "greater than zero" };
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{value} seconds; must be {bound}"),
        });
    }
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })
}
