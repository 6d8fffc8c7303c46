//! Writing the day table, statistics and anomalies to disk.
//!
//! TSV output uses `\n` line endings and quotes a field only when it
//! contains a tab, quote or newline. NA cells are empty.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use sleeplog_core::formatting::format_value;
use sleeplog_core::models::{Anomaly, Column, Table};
use sleeplog_core::time_utils::{calendar_week_range, format_range};
use sleeplog_core::{Result, SleepLogError};
use tracing::{debug, info};

use crate::aggregator::{PeriodStats, Stat, StatsReport};

const SEP: char = '\t';

/// Per-log-week split files, named by each week's actual date range.
pub const LOG_WEEK_DIR: &str = "single-weeks-by-log-range";
/// Per-calendar-week split files, named by the Sunday to Saturday range.
pub const CALENDAR_WEEK_DIR: &str = "by-week";

// ── Options ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Tsv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SleepLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tsv" => Ok(OutputFormat::Tsv),
            "json" => Ok(OutputFormat::Json),
            other => Err(SleepLogError::Config(format!("unknown output format {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportOptions {
    pub format: OutputFormat,
    /// Append the data's date range to every file name.
    pub label_files: bool,
}

// ── Rows ──────────────────────────────────────────────────────────────────────

/// A header plus data rows.
pub type Rows = (Vec<String>, Vec<Vec<String>>);

/// Header and rows of the day table.
pub fn data_rows(table: &Table) -> Rows {
    day_rows(table, |c| c.id.clone())
}

/// The day table headed by each column's source question text, falling back
/// to the metric id for columns without one.
pub fn question_rows(table: &Table) -> Rows {
    day_rows(table, |c| c.question.clone().unwrap_or_else(|| c.id.clone()))
}

fn day_rows(table: &Table, heading: impl Fn(&Column) -> String) -> Rows {
    let mut header: Vec<String> = ["week_label", "date", "effective_date", "day"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(table.columns.iter().map(heading));

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut out = vec![
                row.week_label.clone(),
                row.date.format("%Y-%m-%d").to_string(),
                row.effective_date.format("%Y-%m-%d").to_string(),
                row.date.format("%a").to_string(),
            ];
            out.extend(row.values.iter().map(format_value));
            out
        })
        .collect();

    (header, rows)
}

/// Header and rows for per-period statistics. `key_name` heads the first
/// column; stat columns are the union of names in first-seen order.
pub fn period_rows(periods: &[PeriodStats], key_name: &str) -> Rows {
    let mut names: Vec<String> = Vec::new();
    for period in periods {
        for stat in &period.stats {
            if !names.contains(&stat.name) {
                names.push(stat.name.clone());
            }
        }
    }

    let mut header = vec![key_name.to_string(), "range".to_string(), "days".to_string()];
    header.extend(names.iter().cloned());

    let rows = periods
        .iter()
        .map(|p| {
            let mut out = vec![p.period_key.clone(), p.range.clone(), p.days.to_string()];
            out.extend(
                names
                    .iter()
                    .map(|n| p.get(n).map(|v| v.to_string()).unwrap_or_default()),
            );
            out
        })
        .collect();

    (header, rows)
}

/// One-row table of overall statistics.
pub fn overall_rows(stats: &[Stat]) -> Rows {
    let header = stats.iter().map(|s| s.name.clone()).collect();
    let row = stats.iter().map(|s| s.value.to_string()).collect();
    (header, vec![row])
}

pub fn anomaly_rows(anomalies: &[Anomaly]) -> Rows {
    let header = ["kind", "line", "week", "metric", "day", "token"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let opt = |v: Option<usize>| v.map(|n| n.to_string()).unwrap_or_default();
    let rows = anomalies
        .iter()
        .map(|a| {
            vec![
                a.kind.to_string(),
                opt(a.line),
                a.week.clone().unwrap_or_default(),
                a.metric.clone().unwrap_or_default(),
                opt(a.day),
                a.token.clone().unwrap_or_default(),
            ]
        })
        .collect();
    (header, rows)
}

// ── Writing ───────────────────────────────────────────────────────────────────

fn needs_quotes(field: &str) -> bool {
    field.contains(SEP) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write one delimited row.
pub fn write_row<W: Write>(mut w: W, row: &[String]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{}", SEP)?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| SleepLogError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
}

/// Write a header and rows as a TSV file.
pub fn write_tsv(path: &Path, (header, rows): &Rows) -> Result<()> {
    let wrap = |source| SleepLogError::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut w = create(path)?;
    write_row(&mut w, header).map_err(wrap)?;
    for row in rows {
        write_row(&mut w, row).map_err(wrap)?;
    }
    w.flush().map_err(wrap)?;
    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut w = create(path)?;
    serde_json::to_writer_pretty(&mut w, value)?;
    writeln!(w)
        .and_then(|_| w.flush())
        .map_err(|source| SleepLogError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Output file name, e.g. `data.tsv` or `data-2025--06-19--07-02.tsv`.
pub fn output_name(base: &str, format: OutputFormat, range: Option<&str>) -> String {
    match range {
        Some(r) => format!("{}-{}.{}", base, r, format.extension()),
        None => format!("{}.{}", base, format.extension()),
    }
}

// ── Week splits ───────────────────────────────────────────────────────────────

/// One slice of the day table with its statistics and file-name range.
#[derive(Debug, Clone)]
pub struct WeekSplit<'a> {
    pub range: String,
    pub table: Table,
    pub period: &'a PeriodStats,
}

/// Split the table by log week. Each split is named by the dates its rows
/// actually cover.
pub fn log_week_splits<'a>(table: &Table, report: &'a StatsReport) -> Vec<WeekSplit<'a>> {
    let mut weeks: Vec<usize> = Vec::new();
    for row in &table.rows {
        if weeks.last() != Some(&row.week_index) {
            weeks.push(row.week_index);
        }
    }
    weeks
        .into_iter()
        .zip(&report.by_log_week)
        .map(|(week, period)| WeekSplit {
            range: period.range.clone(),
            table: table.filter_rows(|r| r.week_index == week),
            period,
        })
        .collect()
}

/// Split the table by Sunday to Saturday calendar week.
pub fn calendar_week_splits<'a>(table: &Table, report: &'a StatsReport) -> Vec<WeekSplit<'a>> {
    report
        .by_calendar_week
        .iter()
        .map(|period| WeekSplit {
            range: period.period_key.clone(),
            table: table.filter_rows(|r| calendar_week_range(r.date).0 == period.start),
            period,
        })
        .collect()
}

/// Write a data and a stats file per split into `dir`.
///
/// Two log weeks can cover the same dates; later ones get a numeric suffix.
pub fn write_splits(
    dir: &Path,
    splits: &[WeekSplit<'_>],
    key_name: &str,
    format: OutputFormat,
) -> Result<Vec<PathBuf>> {
    create_dir(dir)?;
    let mut seen: HashSet<String> = HashSet::new();
    let mut written = Vec::new();
    for split in splits {
        let mut range = split.range.clone();
        let mut n = 2;
        while !seen.insert(range.clone()) {
            range = format!("{}-{}", split.range, n);
            n += 1;
        }

        let data = dir.join(output_name("data", format, Some(&range)));
        let stats = dir.join(output_name("stats", format, Some(&range)));
        match format {
            OutputFormat::Tsv => {
                write_tsv(&data, &data_rows(&split.table))?;
                write_tsv(&stats, &period_rows(std::slice::from_ref(split.period), key_name))?;
            }
            OutputFormat::Json => {
                write_json(&data, &split.table)?;
                write_json(&stats, split.period)?;
            }
        }
        written.push(data);
        written.push(stats);
    }
    debug!("Wrote {} split file(s) to {}", written.len(), dir.display());
    Ok(written)
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| SleepLogError::FileWrite {
        path: dir.to_path_buf(),
        source,
    })
}

// ── Export ────────────────────────────────────────────────────────────────────

/// Write every output file into `dir`, returning the paths written.
///
/// `anomalies` is written only when given. Per-week splits go to
/// [`LOG_WEEK_DIR`] and [`CALENDAR_WEEK_DIR`] under `dir`.
pub fn export_all(
    dir: &Path,
    table: &Table,
    report: &StatsReport,
    anomalies: Option<&[Anomaly]>,
    options: ExportOptions,
) -> Result<Vec<PathBuf>> {
    create_dir(dir)?;

    let range = if options.label_files {
        table.date_range().map(|(start, end)| format_range(start, end))
    } else {
        None
    };
    let path_for = |base: &str| dir.join(output_name(base, options.format, range.as_deref()));

    let mut written = Vec::new();
    match options.format {
        OutputFormat::Tsv => {
            let files = [
                ("data", data_rows(table)),
                ("data-with-questions", question_rows(table)),
                ("stats-by-log-week", period_rows(&report.by_log_week, "week_label")),
                ("stats-by-week", period_rows(&report.by_calendar_week, "week")),
                ("stats", overall_rows(&report.overall)),
            ];
            for (base, rows) in &files {
                let path = path_for(*base);
                write_tsv(&path, rows)?;
                written.push(path);
            }
            if let Some(anomalies) = anomalies {
                let path = path_for("anomalies");
                write_tsv(&path, &anomaly_rows(anomalies))?;
                written.push(path);
            }
        }
        OutputFormat::Json => {
            let path = path_for("data");
            write_json(&path, table)?;
            written.push(path);
            let path = path_for("stats");
            write_json(&path, report)?;
            written.push(path);
            if let Some(anomalies) = anomalies {
                let path = path_for("anomalies");
                write_json(&path, &anomalies)?;
                written.push(path);
            }
        }
    }

    written.extend(write_splits(
        &dir.join(LOG_WEEK_DIR),
        &log_week_splits(table, report),
        "week_label",
        options.format,
    )?);
    written.extend(write_splits(
        &dir.join(CALENDAR_WEEK_DIR),
        &calendar_week_splits(table, report),
        "week",
        options.format,
    )?);

    info!("Wrote {} file(s) to {}", written.len(), dir.display());
    Ok(written)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::StatsAggregator;
    use crate::parser::LogParser;
    use sleeplog_core::metrics::MetricTable;
    use sleeplog_core::models::AnomalyKind;
    use std::fs;
    use tempfile::TempDir;

    const LOG: &str = "\
Sleep log
    Thu6/19-Wed25
        2. What time did you get into bed? 11pm 1am . . . . .
        9. In TOTAL, how many hours of sleep did you get? 7:30 6.5
        14. If alcohol, how many standard drinks? 0 1.3
";

    fn fixture() -> (Table, StatsReport) {
        let table = LogParser::default().parse_text(LOG);
        let report = StatsAggregator::report(&table, &MetricTable::default());
        (table, report)
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("TSV".parse::<OutputFormat>().unwrap(), OutputFormat::Tsv);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("data", OutputFormat::Tsv, None), "data.tsv");
        assert_eq!(
            output_name("stats", OutputFormat::Json, Some("2025--06-19--06-25")),
            "stats-2025--06-19--06-25.json"
        );
    }

    #[test]
    fn test_write_row_quotes_only_when_needed() {
        let mut buf: Vec<u8> = Vec::new();
        write_row(
            &mut buf,
            &["a".to_string(), "b\tc".to_string(), "say \"hi\"".to_string(), String::new()],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "a\t\"b\tc\"\t\"say \"\"hi\"\"\"\t\n"
        );
    }

    #[test]
    fn test_data_rows_format_values() {
        let (table, _) = fixture();
        let (header, rows) = data_rows(&table);
        assert_eq!(
            header,
            vec![
                "week_label",
                "date",
                "effective_date",
                "day",
                "bed_time",
                "sleep_hours",
                "alcohol_drinks"
            ]
        );
        assert_eq!(rows.len(), 7);
        assert_eq!(
            rows[0],
            vec!["6/19-6/25", "2025-06-19", "2025-06-19", "Thu", "23:00", "7:30", "0"]
        );
        assert_eq!(
            rows[1],
            vec!["6/19-6/25", "2025-06-20", "2025-06-21", "Fri", "01:00", "6:30", "1.3"]
        );
        assert_eq!(rows[2][4..], ["", "", ""]);
    }

    #[test]
    fn test_period_rows_union_of_names() {
        let (_, report) = fixture();
        let (header, rows) = period_rows(&report.by_calendar_week, "week");
        assert_eq!(header[..3], ["week", "range", "days"]);
        assert!(header.contains(&"avg_bed_time".to_string()));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "2025--06-15--06-21");
        assert_eq!(rows[0][2], "3");
    }

    #[test]
    fn test_export_tsv_writes_all_files() {
        let tmp = TempDir::new().expect("tempdir");
        let (table, report) = fixture();
        let anomalies = vec![Anomaly::new(AnomalyKind::MultiValue)
            .at_line(3)
            .in_week("6/19-6/25")
            .for_metric("bed_time")
            .on_day(2)
            .with_token("12:40am|1:18am")];

        let out = tmp.path().join("out");
        let written = export_all(&out, &table, &report, Some(&anomalies), ExportOptions::default())
            .unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
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
        assert_eq!(written.len(), 12, "top-level files plus two per split");

        let stats = fs::read_to_string(out.join("stats.tsv")).unwrap();
        let mut lines = stats.lines();
        let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
        let values: Vec<&str> = lines.next().unwrap().split('\t').collect();
        let idx = header.iter().position(|h| *h == "total_alcohol_drinks").unwrap();
        assert_eq!(values[idx], "1.3");
        assert!(!stats.contains('\r'));

        let anomalies_tsv = fs::read_to_string(out.join("anomalies.tsv")).unwrap();
        assert_eq!(
            anomalies_tsv,
            "kind\tline\tweek\tmetric\tday\ttoken\nmulti_value\t3\t6/19-6/25\tbed_time\t2\t12:40am|1:18am\n"
        );
    }

    #[test]
    fn test_export_label_files_and_json() {
        let tmp = TempDir::new().expect("tempdir");
        let (table, report) = fixture();
        let options = ExportOptions {
            format: OutputFormat::Json,
            label_files: true,
        };
        let written = export_all(tmp.path(), &table, &report, None, options).unwrap();
        assert_eq!(written.len(), 8);
        assert!(tmp
            .path()
            .join(LOG_WEEK_DIR)
            .join("stats-2025--06-19--06-25.json")
            .is_file());
        let data_path = tmp.path().join("data-2025--06-19--06-25.json");
        assert!(data_path.exists());

        let parsed: Table = serde_json::from_str(&fs::read_to_string(data_path).unwrap()).unwrap();
        assert_eq!(parsed, table);
        let stats: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(tmp.path().join("stats-2025--06-19--06-25.json")).unwrap(),
        )
        .unwrap();
        assert!(stats["overall"].is_array());
    }

    // ── question_rows ─────────────────────────────────────────────────────────

    #[test]
    fn test_question_rows_use_source_text() {
        let (mut table, _) = fixture();
        table.columns[2].question = None;
        let (header, rows) = question_rows(&table);
        assert_eq!(
            header[4..],
            [
                "What time did you get into bed?",
                "In TOTAL, how many hours of sleep did you get?",
                "alcohol_drinks"
            ]
        );
        assert_eq!(rows, data_rows(&table).1);
    }

    // ── Week splits ───────────────────────────────────────────────────────────

    #[test]
    fn test_calendar_week_splits_partition_rows() {
        let (table, report) = fixture();
        let splits = calendar_week_splits(&table, &report);
        let ranges: Vec<&str> = splits.iter().map(|s| s.range.as_str()).collect();
        assert_eq!(ranges, ["2025--06-15--06-21", "2025--06-22--06-28"]);
        assert_eq!(splits[0].table.len(), 3);
        assert_eq!(splits[1].table.len(), 4);
        assert_eq!(splits[0].table.columns, table.columns);
    }

    #[test]
    fn test_log_week_splits_follow_week_blocks() {
        let log = format!(
            "{}    Thu6/26-Wed7/2\n        14. If alcohol, how many standard drinks? 2\n",
            LOG
        );
        let table = LogParser::default().parse_text(&log);
        let report = StatsAggregator::report(&table, &MetricTable::default());

        let splits = log_week_splits(&table, &report);
        assert_eq!(splits.len(), 2);
        assert_eq!(splits[0].range, "2025--06-19--06-25");
        assert_eq!(splits[1].range, "2025--06-26--07-02");
        assert!(splits.iter().all(|s| s.table.len() == 7));
        assert_eq!(splits[1].period.period_key, "6/26-7/2");
    }

    #[test]
    fn test_write_splits_suffixes_repeated_ranges() {
        let tmp = TempDir::new().expect("tempdir");
        let log = format!(
            "{}    Thu6/19-Wed25\n        14. If alcohol, how many standard drinks? 4\n",
            LOG
        );
        let table = LogParser::default().parse_text(&log);
        let report = StatsAggregator::report(&table, &MetricTable::default());

        let dir = tmp.path().join(LOG_WEEK_DIR);
        let written = write_splits(
            &dir,
            &log_week_splits(&table, &report),
            "week_label",
            OutputFormat::Tsv,
        )
        .unwrap();
        assert_eq!(written.len(), 4);
        assert!(dir.join("data-2025--06-19--06-25.tsv").is_file());
        assert!(dir.join("data-2025--06-19--06-25-2.tsv").is_file());

        let stats = fs::read_to_string(dir.join("stats-2025--06-19--06-25-2.tsv")).unwrap();
        let mut lines = stats.lines();
        let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
        let values: Vec<&str> = lines.next().unwrap().split('\t').collect();
        assert_eq!(header[0], "week_label");
        let idx = header.iter().position(|h| *h == "total_alcohol_drinks").unwrap();
        assert_eq!(values[idx], "4");
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_export_writes_split_directories() {
        let tmp = TempDir::new().expect("tempdir");
        let (table, report) = fixture();
        export_all(tmp.path(), &table, &report, None, ExportOptions::default()).unwrap();

        let by_log = tmp.path().join(LOG_WEEK_DIR);
        assert!(by_log.join("data-2025--06-19--06-25.tsv").is_file());
        let by_week = tmp.path().join(CALENDAR_WEEK_DIR);
        let data = fs::read_to_string(by_week.join("data-2025--06-22--06-28.tsv")).unwrap();
        assert_eq!(data.lines().count(), 5, "header plus four days");
        assert!(by_week.join("stats-2025--06-15--06-21.tsv").is_file());

        let questions = fs::read_to_string(tmp.path().join("data-with-questions.tsv")).unwrap();
        assert!(questions
            .lines()
            .next()
            .unwrap()
            .contains("What time did you get into bed?"));
    }
}
