use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::time_utils::DEFAULT_YEAR;

/// Accepted `--format` values.
const OUTPUT_FORMATS: [&str; 2] = ["tsv", "json"];

/// Accepted `--year` range, matching the CLI parser.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1970..=2100;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Parse weekly sleep logs into a day table and summary statistics
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sleeplog",
    about = "Parse weekly sleep logs into a day table and summary statistics",
    version
)]
pub struct Settings {
    /// Sleep log text file, or a directory of .txt logs
    #[arg(long, default_value = "input/log.txt")]
    pub logfile: PathBuf,

    /// Spreadsheet CSV export (implies --input-format csv)
    #[arg(long)]
    pub csv_file: Option<PathBuf>,

    /// One-week text log analysed on its own into <output-dir>/single-week
    #[arg(long, default_value = "input/log-single-week.txt")]
    pub single_week_logfile: PathBuf,

    /// Input format
    #[arg(long, default_value = "txt", value_parser = ["txt", "csv"])]
    pub input_format: String,

    /// Directory for output files
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Metric table JSON (defaults to ~/.sleeplog/metrics.json when present)
    #[arg(long)]
    pub metrics: Option<PathBuf>,

    /// Year assumed for week headers
    #[arg(long, default_value_t = DEFAULT_YEAR, value_parser = clap::value_parser!(i32).range(1970..=2100))]
    pub year: i32,

    /// Output format
    #[arg(long, default_value = "tsv", value_parser = OUTPUT_FORMATS)]
    pub format: String,

    /// Include the data's date range in output file names
    #[arg(long)]
    pub label_files: bool,

    /// Also write the anomaly report
    #[arg(long)]
    pub anomalies: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.sleeplog/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".sleeplog").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation with an explicit config path so tests can redirect
    /// to a temporary directory.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return settings.resolved();
        }

        let last = LastUsedParams::load_from(config_path);
        let settings = settings.merge_last_used(last, &matches).resolved();

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Fill fields that were not given on the command line from `last`.
    ///
    /// Persisted values the CLI would reject are ignored.
    fn merge_last_used(mut self, last: LastUsedParams, matches: &clap::ArgMatches) -> Self {
        if !is_arg_explicitly_set(matches, "output_dir") {
            if let Some(v) = last.output_dir {
                self.output_dir = v;
            }
        }
        if !is_arg_explicitly_set(matches, "metrics") && self.metrics.is_none() {
            self.metrics = last.metrics;
        }
        if !is_arg_explicitly_set(matches, "year") {
            match last.year {
                Some(v) if YEAR_RANGE.contains(&v) => self.year = v,
                Some(v) => warn!("Ignoring saved year {} outside {:?}", v, YEAR_RANGE),
                None => {}
            }
        }
        if !is_arg_explicitly_set(matches, "format") {
            match last.format {
                Some(v) if OUTPUT_FORMATS.contains(&v.as_str()) => self.format = v,
                Some(v) => warn!("Ignoring saved output format {:?}", v),
                None => {}
            }
        }
        self
    }

    /// Apply implied flags: `--csv-file` selects CSV input, `--debug` forces
    /// the debug log level.
    fn resolved(mut self) -> Self {
        if self.csv_file.is_some() {
            self.input_format = "csv".to_string();
        }
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    /// The file or directory to read.
    pub fn input_path(&self) -> &Path {
        self.csv_file.as_deref().unwrap_or(&self.logfile)
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            output_dir: Some(s.output_dir.clone()),
            metrics: s.metrics.clone(),
            year: Some(s.year),
            format: Some(s.format.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line.
///
/// clap keys arguments by field name (underscores), not by flag spelling.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
