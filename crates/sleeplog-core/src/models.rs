use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of day-slots in every week block.
pub const DAYS_PER_WEEK: usize = 7;

/// The value type a metric expects its tokens to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Clock time such as `2:20am`.
    Time,
    /// Elapsed time written as `H:MM` or decimal hours.
    Duration,
    /// Plain decimal number (ratings, drink counts, minutes).
    Decimal,
    /// Whole-number count; decimals still parse, as decimals.
    Count,
}

impl ValueKind {
    /// Whether values of this kind can be averaged arithmetically.
    pub fn is_numeric(self) -> bool {
        !matches!(self, ValueKind::Time)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Time => "time",
            ValueKind::Duration => "duration",
            ValueKind::Decimal => "decimal",
            ValueKind::Count => "count",
        };
        f.write_str(s)
    }
}

/// One typed cell of the day table.
///
/// `Na` is an explicit "no value" marker and is never conflated with zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum NormalizedValue {
    /// Time of day, meridiem already resolved to 24h.
    Time(NaiveTime),
    /// Total minutes of a duration.
    DurationMinutes(i64),
    DecimalNumber(f64),
    Count(i64),
    Na,
}

impl NormalizedValue {
    pub fn is_na(&self) -> bool {
        matches!(self, NormalizedValue::Na)
    }

    /// Minutes since midnight in `[0, 1440)` for time values.
    pub fn minutes_since_midnight(&self) -> Option<u32> {
        match self {
            NormalizedValue::Time(t) => Some(t.hour() * 60 + t.minute()),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            NormalizedValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Numeric view of the value; times map to minutes since midnight.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NormalizedValue::Time(_) => self.minutes_since_midnight().map(f64::from),
            NormalizedValue::DurationMinutes(m) => Some(*m as f64),
            NormalizedValue::DecimalNumber(v) => Some(*v),
            NormalizedValue::Count(n) => Some(*n as f64),
            NormalizedValue::Na => None,
        }
    }
}

/// Month/day pairs taken from a week header line such as `Thu6/19-Wed25`.
///
/// The end pair is advisory: day-slot dates are always derived from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekLabel {
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
}

impl fmt::Display for WeekLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}-{}/{}",
            self.start_month, self.start_day, self.end_month, self.end_day
        )
    }
}

/// A column of the assembled table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Canonical metric identifier, or a slug of the question text for
    /// opaque columns.
    pub id: String,
    pub kind: ValueKind,
    /// `false` for pass-through columns of unrecognized questions.
    pub recognized: bool,
    /// Question wording the column was first seen with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

/// One output row: a single day of a single week block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    /// `M/D-M/D` label of the week block the row came from.
    pub week_label: String,
    /// Position of the week block in source order.
    pub week_index: usize,
    /// Day-slot within the week, `0..7`.
    pub day_index: usize,
    /// Calendar date of the day-slot.
    pub date: NaiveDate,
    /// Night the row belongs to: the next day when bed time fell after
    /// midnight.
    pub effective_date: NaiveDate,
    /// One value per table column, in column order.
    pub values: Vec<NormalizedValue>,
}

/// The ordered day table handed to statistics and export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<DayRecord>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of the column named `id`.
    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Value of `id` in row `row`; `Na` when the column or row is absent.
    pub fn value(&self, row: usize, id: &str) -> NormalizedValue {
        match (self.rows.get(row), self.column_index(id)) {
            (Some(r), Some(col)) => r.values.get(col).copied().unwrap_or(NormalizedValue::Na),
            _ => NormalizedValue::Na,
        }
    }

    /// All values of one column in row order (empty when the column is absent).
    pub fn column_values(&self, id: &str) -> Vec<NormalizedValue> {
        match self.column_index(id) {
            Some(col) => self
                .rows
                .iter()
                .map(|r| r.values.get(col).copied().unwrap_or(NormalizedValue::Na))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of distinct week blocks contributing rows.
    pub fn week_count(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for row in &self.rows {
            if last != Some(row.week_index) {
                count += 1;
                last = Some(row.week_index);
            }
        }
        count
    }

    /// A table with the same columns and only the rows `keep` accepts.
    pub fn filter_rows(&self, keep: impl Fn(&DayRecord) -> bool) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Earliest and latest day-slot dates in the table.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.rows.iter().map(|r| r.date).min()?;
        let max = self.rows.iter().map(|r| r.date).max()?;
        Some((min, max))
    }
}

// ── Anomalies ─────────────────────────────────────────────────────────────────

/// Category of a recoverable parse anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Depth-1 line that does not look like a date-range header.
    UnrecognizedHeader,
    /// Header whose start month/day is not a real calendar date.
    InvalidHeaderDate,
    /// Question line that appears before any usable week header.
    OrphanedQuestion,
    /// Same metric asked twice in one week; the first occurrence wins.
    DuplicateQuestion,
    /// Unrecognized question whose tokens are not all plain numbers.
    DroppedQuestion,
    /// More than seven value tokens on one question line.
    TooManyTokens,
    /// Token that does not match its metric's expected shape.
    InvalidValue,
    /// `|`-joined multiple answers for a single-valued metric.
    MultiValue,
    /// Two week blocks share the same label.
    DuplicateWeekLabel,
    /// Spreadsheet row without a parsable timestamp.
    MissingTimestamp,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnomalyKind::UnrecognizedHeader => "unrecognized_header",
            AnomalyKind::InvalidHeaderDate => "invalid_header_date",
            AnomalyKind::OrphanedQuestion => "orphaned_question",
            AnomalyKind::DuplicateQuestion => "duplicate_question",
            AnomalyKind::DroppedQuestion => "dropped_question",
            AnomalyKind::TooManyTokens => "too_many_tokens",
            AnomalyKind::InvalidValue => "invalid_value",
            AnomalyKind::MultiValue => "multi_value",
            AnomalyKind::DuplicateWeekLabel => "duplicate_week_label",
            AnomalyKind::MissingTimestamp => "missing_timestamp",
        };
        f.write_str(s)
    }
}

/// A diagnostic about input the parser absorbed instead of failing on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// 1-based source line number, when the anomaly is tied to a line.
    pub line: Option<usize>,
    pub week: Option<String>,
    pub metric: Option<String>,
    /// Day-slot index `0..7`.
    pub day: Option<usize>,
    pub token: Option<String>,
}

impl Anomaly {
    pub fn new(kind: AnomalyKind) -> Self {
        Self {
            kind,
            line: None,
            week: None,
            metric: None,
            day: None,
            token: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn in_week(mut self, week: impl Into<String>) -> Self {
        self.week = Some(week.into());
        self
    }

    pub fn for_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn on_day(mut self, day: usize) -> Self {
        self.day = Some(day);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(line) = self.line {
            write!(f, " line={}", line)?;
        }
        if let Some(week) = &self.week {
            write!(f, " week={}", week)?;
        }
        if let Some(metric) = &self.metric {
            write!(f, " metric={}", metric)?;
        }
        if let Some(day) = self.day {
            write!(f, " day={}", day)?;
        }
        if let Some(token) = &self.token {
            write!(f, " token={:?}", token)?;
        }
        Ok(())
    }
}
