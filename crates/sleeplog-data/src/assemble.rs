//! Folding week series into the ordered day table.

use chrono::NaiveDate;
use sleeplog_core::metrics::MetricTable;
use sleeplog_core::models::{Column, DayRecord, NormalizedValue, Table, DAYS_PER_WEEK};
use sleeplog_core::time_utils::{day_slot_date, effective_date};
use tracing::debug;

use crate::extract::MetricSeries;

/// Metric whose time decides a row's effective date.
const BED_TIME: &str = "bed_time";

// ── RecordAssembler ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PendingWeek {
    label: String,
    start: NaiveDate,
    series: Vec<MetricSeries>,
    /// `false` for a header with no question lines under it.
    has_questions: bool,
}

/// Single writer of the day table.
///
/// Weeks are pushed in log order; [`finish`](Self::finish) lays them out as
/// seven rows each, with the union of all metrics as columns.
#[derive(Debug)]
pub struct RecordAssembler<'m> {
    metrics: &'m MetricTable,
    seen: Vec<Column>,
    weeks: Vec<PendingWeek>,
}

impl<'m> RecordAssembler<'m> {
    pub fn new(metrics: &'m MetricTable) -> Self {
        Self {
            metrics,
            seen: Vec::new(),
            weeks: Vec::new(),
        }
    }

    /// Add one week block with its seven day-slots. Metrics the week lacks,
    /// including every metric when `series` is empty, are NA.
    pub fn push_week(&mut self, label: impl Into<String>, start: NaiveDate, series: Vec<MetricSeries>) {
        for s in &series {
            if !self.seen.iter().any(|c| c.id == s.metric) {
                self.seen.push(Column {
                    id: s.metric.clone(),
                    kind: s.kind,
                    recognized: s.recognized,
                    question: s.question.clone(),
                });
            }
        }
        self.weeks.push(PendingWeek {
            label: label.into(),
            start,
            series,
            has_questions: true,
        });
    }

    /// Add a header with no question lines. It keeps its week index but
    /// produces no rows.
    pub fn push_blank_week(&mut self, label: impl Into<String>, start: NaiveDate) {
        self.weeks.push(PendingWeek {
            label: label.into(),
            start,
            series: Vec::new(),
            has_questions: false,
        });
    }

    pub fn week_count(&self) -> usize {
        self.weeks.len()
    }

    /// Build the table: week order, then day 0..7, never re-sorted by date.
    pub fn finish(self) -> Table {
        let columns = order_columns(self.seen, self.metrics);
        let mut rows = Vec::with_capacity(self.weeks.len() * DAYS_PER_WEEK);

        for (week_index, week) in self.weeks.iter().enumerate() {
            if !week.has_questions {
                debug!("Week {} has no questions, no rows emitted", week.label);
                continue;
            }
            for day_index in 0..DAYS_PER_WEEK {
                let Some(date) = day_slot_date(week.start, day_index) else {
                    continue;
                };
                let values: Vec<NormalizedValue> = columns
                    .iter()
                    .map(|col| {
                        week.series
                            .iter()
                            .find(|s| s.metric == col.id)
                            .map_or(NormalizedValue::Na, |s| s.values[day_index])
                    })
                    .collect();
                let bed_time = columns
                    .iter()
                    .position(|c| c.id == BED_TIME)
                    .and_then(|i| values[i].as_time());
                rows.push(DayRecord {
                    week_label: week.label.clone(),
                    week_index,
                    day_index,
                    date,
                    effective_date: effective_date(date, bed_time, self.metrics.evening_start),
                    values,
                });
            }
        }

        Table { columns, rows }
    }
}

// ── Column order and concatenation ────────────────────────────────────────────

/// Priority metrics first, in priority order and only when present, then
/// everything else in first-seen order.
pub fn order_columns(seen: Vec<Column>, metrics: &MetricTable) -> Vec<Column> {
    let (mut priority, rest): (Vec<Column>, Vec<Column>) = seen
        .into_iter()
        .partition(|c| c.recognized && metrics.priority_rank(&c.id).is_some());
    priority.sort_by_key(|c| metrics.priority_rank(&c.id));
    priority.extend(rest);
    priority
}

/// Concatenate independently parsed tables in the given order.
///
/// Columns are the union of all inputs, re-ordered by [`order_columns`];
/// week indices are offset so they stay unique across inputs.
pub fn concat_tables(tables: Vec<Table>, metrics: &MetricTable) -> Table {
    let mut seen: Vec<Column> = Vec::new();
    for table in &tables {
        for col in &table.columns {
            if !seen.iter().any(|c| c.id == col.id) {
                seen.push(col.clone());
            }
        }
    }
    let columns = order_columns(seen, metrics);

    let mut rows = Vec::new();
    let mut offset = 0;
    for table in tables {
        let next_offset = offset + table.rows.iter().map(|r| r.week_index + 1).max().unwrap_or(0);
        let lookup: Vec<Option<usize>> = columns
            .iter()
            .map(|c| table.column_index(&c.id))
            .collect();
        for row in table.rows {
            let values: Vec<NormalizedValue> = lookup
                .iter()
                .map(|&idx| {
                    idx.and_then(|i| row.values.get(i).copied())
                        .unwrap_or(NormalizedValue::Na)
                })
                .collect();
            rows.push(DayRecord {
                week_index: row.week_index + offset,
                values,
                ..row
            });
        }
        offset = next_offset;
    }

    Table { columns, rows }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
