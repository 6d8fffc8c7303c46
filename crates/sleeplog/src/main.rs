mod bootstrap;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sleeplog_core::metrics::MetricTable;
use sleeplog_core::models::Anomaly;
use sleeplog_core::settings::Settings;
use sleeplog_data::aggregator::StatsAggregator;
use sleeplog_data::diagnostics::summarize;
use sleeplog_data::export::{export_all, ExportOptions, OutputFormat};
use sleeplog_data::{reader, sheets, LogParser, ParseOptions};

/// Subdirectory of the output directory for the single-week analysis.
const SINGLE_WEEK_DIR: &str = "single-week";

/// What one run produced.
#[derive(Debug)]
struct RunSummary {
    rows: usize,
    weeks: usize,
    anomalies: usize,
    written: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("sleeplog v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Input: {} ({}), output: {} ({})",
        settings.input_path().display(),
        settings.input_format,
        settings.output_dir.display(),
        settings.format
    );

    let summary = run(&settings)?;
    tracing::info!(
        "Done: {} rows over {} weeks, {} anomalies, {} file(s) written",
        summary.rows,
        summary.weeks,
        summary.anomalies,
        summary.written.len()
    );

    if let Some(single) = run_single_week(&settings)? {
        tracing::info!(
            "Single week: {} rows, {} file(s) written",
            single.rows,
            single.written.len()
        );
    }
    Ok(())
}

/// One input analysed into one output directory.
struct Job<'a> {
    input: &'a Path,
    csv: bool,
    output_dir: PathBuf,
    label_files: bool,
}

/// Analyse the main input according to `settings`.
fn run(settings: &Settings) -> Result<RunSummary> {
    analyze(
        settings,
        &Job {
            input: settings.input_path(),
            csv: settings.input_format == "csv",
            output_dir: settings.output_dir.clone(),
            label_files: settings.label_files,
        },
    )
}

/// Analyse the single-week log on its own, when it exists, into
/// `<output_dir>/single-week` with labelled file names.
fn run_single_week(settings: &Settings) -> Result<Option<RunSummary>> {
    let input = settings.single_week_logfile.as_path();
    if !input.is_file() {
        tracing::debug!("No single-week log at {}", input.display());
        return Ok(None);
    }
    tracing::info!("Single-week log: {}", input.display());
    analyze(
        settings,
        &Job {
            input,
            csv: false,
            output_dir: settings.output_dir.join(SINGLE_WEEK_DIR),
            label_files: true,
        },
    )
    .map(Some)
}

/// Load, parse, summarize and export one input.
fn analyze(settings: &Settings, job: &Job<'_>) -> Result<RunSummary> {
    let metrics = MetricTable::resolve(settings.metrics.as_deref())
        .context("loading metric table")?;
    let format: OutputFormat = settings.format.parse()?;
    let parser = LogParser::new(
        metrics,
        ParseOptions {
            year: settings.year,
        },
    );

    let mut anomalies: Vec<Anomaly> = Vec::new();
    let input = job.input;
    let table = if job.csv {
        sheets::load_sheet(input, parser.metrics(), &mut anomalies)
    } else {
        reader::load_logs(input, &parser, &mut anomalies)
    }
    .with_context(|| format!("reading {}", input.display()))?;

    if table.is_empty() {
        tracing::warn!("No day rows found in {}", input.display());
    }

    for (kind, count) in summarize(&anomalies) {
        tracing::info!("{} anomaly: {}", kind, count);
    }

    let report = StatsAggregator::report(&table, parser.metrics());
    let written = export_all(
        &job.output_dir,
        &table,
        &report,
        settings.anomalies.then_some(anomalies.as_slice()),
        ExportOptions {
            format,
            label_files: job.label_files,
        },
    )
    .with_context(|| format!("writing to {}", job.output_dir.display()))?;

    Ok(RunSummary {
        rows: table.len(),
        weeks: table.week_count(),
        anomalies: anomalies.len(),
        written,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const LOG: &str = "\
Sleep log
    6/19-6/25
        2. What time did you get into bed? 11pm 1am . . . . .
        9. In TOTAL, how many hours of sleep did you get? 7:30 6.5 whoops
    6/26-7/2
        2. What time did you get into bed? 12:30am
";

    /// Settings pointing at files under `dir`, with the built-in metrics
    /// written out explicitly so a user table in `~/.sleeplog` is never read.
    fn settings_for(dir: &Path, extra: &[&str]) -> Settings {
        let metrics = dir.join("metrics.json");
        fs::write(
            &metrics,
            serde_json::to_string(&MetricTable::default()).expect("serialize metrics"),
        )
        .expect("write metrics");

        let metrics = metrics.to_string_lossy().to_string();
        let out = dir.join("out").to_string_lossy().to_string();
        let mut args = vec!["sleeplog", "--metrics", &metrics, "--output-dir", &out];
        args.extend_from_slice(extra);
        Settings::parse_from(args)
    }

    #[test]
    fn test_run_text_log_writes_tsv_outputs() {
        let tmp = TempDir::new().expect("tempdir");
        let log = tmp.path().join("log.txt");
        fs::write(&log, LOG).unwrap();
        let log = log.to_string_lossy().to_string();

        let settings = settings_for(tmp.path(), &["--logfile", &log, "--anomalies"]);
        let summary = run(&settings).expect("run");

        assert_eq!(summary.rows, 14);
        assert_eq!(summary.weeks, 2);
        assert!(summary.anomalies >= 1, "the stray token is reported");

        let names: Vec<String> = summary
            .written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names[..6],
            [
                "data.tsv",
                "data-with-questions.tsv",
                "stats-by-log-week.tsv",
                "stats-by-week.tsv",
                "stats.tsv",
                "anomalies.tsv"
            ]
        );
        // Two log weeks and three calendar weeks, a data and a stats file each.
        assert_eq!(summary.written.len(), 16);
        assert!(tmp
            .path()
            .join("out/by-week/data-2025--06-29--07-05.tsv")
            .is_file());

        let data = fs::read_to_string(tmp.path().join("out/data.tsv")).unwrap();
        assert_eq!(data.lines().count(), 15, "header plus one line per day");
        assert!(data.lines().next().unwrap().starts_with("week_label\t"));
    }

    #[test]
    fn test_run_json_with_labels() {
        let tmp = TempDir::new().expect("tempdir");
        let log = tmp.path().join("log.txt");
        fs::write(&log, LOG).unwrap();
        let log = log.to_string_lossy().to_string();

        let settings = settings_for(
            tmp.path(),
            &["--logfile", &log, "--format", "json", "--label-files"],
        );
        let summary = run(&settings).expect("run");

        assert_eq!(summary.written.len(), 12);
        assert!(tmp
            .path()
            .join("out/data-2025--06-19--07-02.json")
            .is_file());
        assert!(tmp
            .path()
            .join("out/stats-2025--06-19--07-02.json")
            .is_file());
    }

    #[test]
    fn test_run_missing_input_fails() {
        let tmp = TempDir::new().expect("tempdir");
        let missing = tmp.path().join("nope.txt").to_string_lossy().to_string();
        let settings = settings_for(tmp.path(), &["--logfile", &missing]);
        assert!(run(&settings).is_err());
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn test_run_csv_input() {
        let tmp = TempDir::new().expect("tempdir");
        let csv = tmp.path().join("answers.csv");
        fs::write(
            &csv,
            "Timestamp,What time did you get into bed?\n6/22/2025 8:00:00,11pm\n",
        )
        .unwrap();
        let csv = csv.to_string_lossy().to_string();

        let mut settings = settings_for(tmp.path(), &["--csv-file", &csv]);
        settings.input_format = "csv".to_string();
        let summary = run(&settings).expect("run");

        assert_eq!(summary.rows, 7);
        assert_eq!(summary.weeks, 1);
    }

    // ── Single-week log ───────────────────────────────────────────────────────

    #[test]
    fn test_single_week_log_writes_labelled_subdirectory() {
        let tmp = TempDir::new().expect("tempdir");
        let single = tmp.path().join("log-single-week.txt");
        fs::write(
            &single,
            "    Thu6/19-Wed25\n        2. What time did you get into bed? 11pm\n",
        )
        .unwrap();
        let single = single.to_string_lossy().to_string();

        let settings = settings_for(tmp.path(), &["--single-week-logfile", &single]);
        let summary = run_single_week(&settings)
            .expect("run")
            .expect("single-week log exists");

        assert_eq!(summary.rows, 7);
        let dir = tmp.path().join("out").join(SINGLE_WEEK_DIR);
        assert!(dir.join("data-2025--06-19--06-25.tsv").is_file());
        assert!(dir.join("data-with-questions-2025--06-19--06-25.tsv").is_file());
        assert!(dir.join("stats-2025--06-19--06-25.tsv").is_file());
        assert!(!tmp.path().join("out/data.tsv").exists());
    }

    #[test]
    fn test_single_week_log_skipped_when_absent() {
        let tmp = TempDir::new().expect("tempdir");
        let missing = tmp.path().join("none.txt").to_string_lossy().to_string();
        let settings = settings_for(tmp.path(), &["--single-week-logfile", &missing]);
        assert!(run_single_week(&settings).expect("run").is_none());
        assert!(!tmp.path().join("out").exists());
    }
}
