//! Spreadsheet (form response) CSV ingestion.
//!
//! Each data row is one day's answers with a `Timestamp` column. Question
//! headers go through the same phrase matcher as log questions, and rows are
//! folded into Sunday-start week blocks so the result has the same shape as
//! a parsed text log.

use std::mem::take;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use sleeplog_core::metrics::MetricTable;
use sleeplog_core::models::{
    Anomaly, AnomalyKind, NormalizedValue, Table, ValueKind, WeekLabel, DAYS_PER_WEEK,
};
use sleeplog_core::normalize::normalize_token;
use sleeplog_core::time_utils::calendar_week_range;
use sleeplog_core::{Result, SleepLogError};
use tracing::{debug, info};

use crate::assemble::RecordAssembler;
use crate::diagnostics::{report, value_anomaly_kind, AnomalySink};
use crate::extract::MetricSeries;
use crate::reader::read_text;

const TIMESTAMP_HEADER: &str = "timestamp";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

// ── CSV ───────────────────────────────────────────────────────────────────────

/// Split CSV text into rows of fields. Tolerates quotes, `""` escapes and
/// CRLF; an unterminated quote runs to the end of input.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                if row.len() == 1 && row[0].is_empty() {
                    row.clear();
                } else {
                    rows.push(take(&mut row));
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Parse a form timestamp into its calendar date.
///
/// Accepts RFC 3339, ISO date-times with or without `Z`, `YYYY-MM-DD
/// HH:MM:SS`, US `M/D/YYYY HH:MM:SS`, and bare dates.
pub fn parse_timestamp(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    let naive = text.strip_suffix('Z').unwrap_or(text);
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(naive, fmt).ok())
        })
}

// ── Import ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SheetColumn {
    index: usize,
    metric: String,
    kind: ValueKind,
    question: String,
}

#[derive(Debug)]
struct SheetWeek {
    start: NaiveDate,
    end: NaiveDate,
    /// One value array per matched column, in column order.
    values: Vec<[NormalizedValue; DAYS_PER_WEEK]>,
}

/// Convert CSV text into a day table.
///
/// Fails only when there is no header row or no `Timestamp` column. Rows
/// without a usable timestamp are skipped and reported.
pub fn parse_sheet(text: &str, metrics: &MetricTable, sink: &mut dyn AnomalySink) -> Result<Table> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = parse_rows(text).into_iter();
    let header = rows
        .next()
        .ok_or_else(|| SleepLogError::CsvFormat("missing header row".to_string()))?;
    let ts_index = header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(TIMESTAMP_HEADER))
        .ok_or_else(|| SleepLogError::CsvFormat("missing Timestamp column".to_string()))?;

    let mut columns: Vec<SheetColumn> = Vec::new();
    for (index, question) in header.iter().enumerate() {
        if index == ts_index {
            continue;
        }
        match metrics.match_question(question) {
            Some(spec) if !columns.iter().any(|c| c.metric == spec.id) => columns.push(SheetColumn {
                index,
                metric: spec.id.clone(),
                kind: spec.kind,
                question: question.trim().to_string(),
            }),
            Some(spec) => debug!("Column {:?} repeats metric {}, ignored", question, spec.id),
            None => debug!("Column {:?} matches no metric, ignored", question),
        }
    }

    let mut weeks: Vec<SheetWeek> = Vec::new();
    for (offset, row) in rows.enumerate() {
        // Header is line 1.
        let line = offset + 2;
        let stamp = row.get(ts_index).map(String::as_str).unwrap_or("");
        let Some(date) = parse_timestamp(stamp) else {
            report(
                sink,
                Anomaly::new(AnomalyKind::MissingTimestamp)
                    .at_line(line)
                    .with_token(stamp),
            );
            continue;
        };

        let (start, end) = calendar_week_range(date);
        let day = (date - start).num_days() as usize;
        let week_pos = match weeks.iter().position(|w| w.start == start) {
            Some(pos) => pos,
            None => {
                weeks.push(SheetWeek {
                    start,
                    end,
                    values: vec![[NormalizedValue::Na; DAYS_PER_WEEK]; columns.len()],
                });
                weeks.len() - 1
            }
        };
        let week = &mut weeks[week_pos];
        let label = week_label(start, end).to_string();

        for (col_pos, col) in columns.iter().enumerate() {
            let cell = row.get(col.index).map(String::as_str).unwrap_or("");
            match normalize_token(cell, col.kind) {
                Ok(NormalizedValue::Na) => {}
                Ok(value) => week.values[col_pos][day] = value,
                Err(issue) => {
                    report(
                        sink,
                        Anomaly::new(value_anomaly_kind(issue))
                            .at_line(line)
                            .in_week(label.as_str())
                            .for_metric(col.metric.as_str())
                            .on_day(day)
                            .with_token(cell),
                    );
                }
            }
        }
    }

    let mut assembler = RecordAssembler::new(metrics);
    for week in weeks {
        let series = columns
            .iter()
            .zip(week.values)
            .map(|(col, values)| MetricSeries {
                metric: col.metric.clone(),
                kind: col.kind,
                recognized: true,
                question: Some(col.question.clone()),
                values,
            })
            .collect();
        assembler.push_week(week_label(week.start, week.end).to_string(), week.start, series);
    }
    Ok(assembler.finish())
}

/// Read and convert a CSV export.
pub fn load_sheet(path: &Path, metrics: &MetricTable, sink: &mut dyn AnomalySink) -> Result<Table> {
    let table = parse_sheet(&read_text(path)?, metrics, sink)?;
    info!(
        "Loaded {} rows over {} weeks from {}",
        table.len(),
        table.week_count(),
        path.display()
    );
    Ok(table)
}

fn week_label(start: NaiveDate, end: NaiveDate) -> WeekLabel {
    WeekLabel {
        start_month: start.month(),
        start_day: start.day(),
        end_month: end.month(),
        end_day: end.day(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
