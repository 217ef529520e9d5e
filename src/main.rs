mod config;
mod error;
mod report;
mod scanner;
mod signals;
mod tracker;
mod watcher;

use clap::Parser;
use config::{Overrides, ReportFormat, Settings, WatchConfig};
use report::{JsonLinesSink, ReportSink, TracingSink};
use signals::StopFlag;
use std::path::PathBuf;
use watcher::{RunSummary, Watcher};

/// Poll a directory and report each line that contains a magic word,
/// once, as files grow.
#[derive(Parser, Debug)]
#[command(name = "dirwatcher", version, about)]
pub struct Cli {
    /// Directory to monitor (default: from config)
    #[arg(value_name = "DIRECTORY")]
    directory: Option<PathBuf>,

    /// The magic word to watch for (default: from config)
    #[arg(value_name = "MAGIC_WORD")]
    magic_word: Option<String>,

    /// Seconds between directory passes; fractions allowed [default: 1.0]
    #[arg(short, long)]
    interval: Option<f64>,

    /// Filename suffix of files to watch [default: .txt]
    #[arg(short = 'x', long)]
    extension: Option<String>,

    /// Seconds to back off after a failed pass [default: 10]
    #[arg(long)]
    backoff: Option<f64>,

    /// Forget files missing from two consecutive listings
    #[arg(long)]
    prune_missing: bool,

    /// Write matches to stdout as JSON lines
    #[arg(long)]
    json: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-pass counts, scan ranges)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings, errors and the shutdown summary
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            directory: self.directory.clone(),
            magic_word: self.magic_word.clone(),
            interval_secs: self.interval,
            extension: self.extension.clone(),
            error_backoff_secs: self.backoff,
            prune_missing: self.prune_missing,
            json: self.json,
        }
    }

    fn default_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn resolve_settings(cli: &Cli) -> Result<Settings, error::ConfigError> {
    WatchConfig::load(cli.config.as_deref())?
        .merge(cli.overrides())
        .validate()
}

async fn watch<S: ReportSink>(settings: Settings, sink: S, stop: &StopFlag) -> RunSummary {
    Watcher::new(settings, sink).run(stop).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.default_log_level())),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let settings = match resolve_settings(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    if cli.dry_run {
        println!("Dry run mode, not running.");
        println!("Directory:   {}", settings.directory.display());
        println!("Magic word:  {}", settings.magic_word);
        println!("Extension:   {}", settings.extension);
        println!("Interval:    {}s", settings.interval.as_secs_f64());
        println!("Backoff:     {}s", settings.error_backoff.as_secs_f64());
        println!("Prune:       {}", settings.prune_missing);
        println!("Report:      {:?}", settings.report_format);
        return;
    }

    tracing::info!(pid = nix::unistd::getpid().as_raw(), "dirwatcher starting");
    tracing::info!(
        directory = %settings.directory.display(),
        magic_word = %settings.magic_word,
        extension = %settings.extension,
        interval_secs = settings.interval.as_secs_f64(),
        "watching"
    );

    let stop = StopFlag::new();
    if let Err(e) = signals::install(&stop) {
        tracing::warn!(error = %e, "failed to install signal handlers");
    }

    let summary = match settings.report_format {
        ReportFormat::Log => watch(settings, TracingSink, &stop).await,
        ReportFormat::Json => watch(settings, JsonLinesSink::new(std::io::stdout()), &stop).await,
    };

    tracing::warn!(
        started_at = %summary.started_at.to_rfc3339(),
        passes = summary.passes,
        matches = summary.matches,
        errors = summary.errors,
        "exiting, process ran for {:.3} seconds",
        summary.elapsed.as_secs_f64()
    );
}
