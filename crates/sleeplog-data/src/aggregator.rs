//! Weekly and overall summary statistics over the day table.
//!
//! Time metrics are averaged on the 24h circle anchored at the table's
//! evening start, so bed times either side of midnight average sensibly.
//! Metrics whose absence means zero are totalled; every other numeric
//! metric is averaged over its non-NA days.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sleeplog_core::formatting::{format_clock, format_decimal};
use sleeplog_core::metrics::MetricTable;
use sleeplog_core::models::{Column, DayRecord, NormalizedValue, Table, ValueKind};
use sleeplog_core::time_utils::{
    calendar_week_range, circular_mean_time, circular_offset_minutes, format_range,
};

// ── StatValue ─────────────────────────────────────────────────────────────────

/// One computed statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StatValue {
    Number(f64),
    Time(NaiveTime),
}

impl StatValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            StatValue::Number(n) => Some(*n),
            StatValue::Time(_) => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            StatValue::Time(t) => Some(*t),
            StatValue::Number(_) => None,
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Number(n) => f.write_str(&format_decimal(*n)),
            StatValue::Time(t) => f.write_str(&format_clock(*t)),
        }
    }
}

/// A named statistic, e.g. `avg_bed_time` or `total_alcohol_drinks`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stat {
    pub name: String,
    pub value: StatValue,
}

// ── PeriodStats ───────────────────────────────────────────────────────────────

/// How rows are grouped into periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// One period per week block, in log order.
    LogWeek,
    /// One period per Sunday–Saturday calendar week, in date order.
    CalendarWeek,
}

/// Statistics for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    /// Week label for log weeks, range label for calendar weeks.
    pub period_key: String,
    /// `YYYY--MM-DD--MM-DD` span of the period.
    pub range: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: usize,
    pub stats: Vec<Stat>,
}

impl PeriodStats {
    pub fn get(&self, name: &str) -> Option<StatValue> {
        self.stats.iter().find(|s| s.name == name).map(|s| s.value)
    }
}

/// Everything the export stage writes besides the day table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub by_log_week: Vec<PeriodStats>,
    pub by_calendar_week: Vec<PeriodStats>,
    pub overall: Vec<Stat>,
}

// ── StatsAggregator ───────────────────────────────────────────────────────────

/// Stateless helper that groups day rows and summarizes them.
pub struct StatsAggregator;

impl StatsAggregator {
    /// Statistics per week block, in log order.
    pub fn by_log_week(table: &Table, metrics: &MetricTable) -> Vec<PeriodStats> {
        let mut groups: Vec<(String, Vec<&DayRecord>)> = Vec::new();
        let mut last_week = None;
        for row in &table.rows {
            if last_week != Some(row.week_index) {
                groups.push((row.week_label.clone(), Vec::new()));
                last_week = Some(row.week_index);
            }
            if let Some((_, rows)) = groups.last_mut() {
                rows.push(row);
            }
        }

        groups
            .into_iter()
            .filter_map(|(key, rows)| Self::summarize(key, &rows, table, metrics))
            .collect()
    }

    /// Statistics per Sunday–Saturday calendar week, in date order.
    pub fn by_calendar_week(table: &Table, metrics: &MetricTable) -> Vec<PeriodStats> {
        // BTreeMap keeps weeks in date order.
        let mut map: BTreeMap<NaiveDate, Vec<&DayRecord>> = BTreeMap::new();
        for row in &table.rows {
            let (start, _) = calendar_week_range(row.date);
            map.entry(start).or_default().push(row);
        }

        map.into_iter()
            .filter_map(|(start, rows)| {
                let (_, end) = calendar_week_range(start);
                Self::summarize(format_range(start, end), &rows, table, metrics)
            })
            .collect()
    }

    /// Group by `grouping`.
    pub fn aggregate(table: &Table, metrics: &MetricTable, grouping: Grouping) -> Vec<PeriodStats> {
        match grouping {
            Grouping::LogWeek => Self::by_log_week(table, metrics),
            Grouping::CalendarWeek => Self::by_calendar_week(table, metrics),
        }
    }

    /// Combine period statistics: numbers are averaged across the periods
    /// that have them, times are circular-averaged around `anchor`.
    pub fn overall(periods: &[PeriodStats], anchor: NaiveTime) -> Vec<Stat> {
        let mut names: Vec<&str> = Vec::new();
        for period in periods {
            for stat in &period.stats {
                if !names.contains(&stat.name.as_str()) {
                    names.push(&stat.name);
                }
            }
        }

        names
            .into_iter()
            .filter_map(|name| {
                let values: Vec<StatValue> = periods.iter().filter_map(|p| p.get(name)).collect();
                let value = match values.first()? {
                    StatValue::Number(_) => {
                        let numbers: Vec<f64> = values.iter().filter_map(StatValue::as_number).collect();
                        StatValue::Number(mean(&numbers)?)
                    }
                    StatValue::Time(_) => {
                        let times: Vec<NaiveTime> = values.iter().filter_map(StatValue::as_time).collect();
                        StatValue::Time(circular_mean_time(&times, anchor)?)
                    }
                };
                Some(Stat {
                    name: name.to_string(),
                    value,
                })
            })
            .collect()
    }

    /// Both groupings plus the overall summary of the log weeks.
    pub fn report(table: &Table, metrics: &MetricTable) -> StatsReport {
        let by_log_week = Self::by_log_week(table, metrics);
        let by_calendar_week = Self::by_calendar_week(table, metrics);
        let overall = Self::overall(&by_log_week, metrics.evening_start);
        StatsReport {
            by_log_week,
            by_calendar_week,
            overall,
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn summarize(
        period_key: String,
        rows: &[&DayRecord],
        table: &Table,
        metrics: &MetricTable,
    ) -> Option<PeriodStats> {
        let start = rows.iter().map(|r| r.date).min()?;
        let end = rows.iter().map(|r| r.date).max()?;

        let mut stats = Vec::new();
        for (col_index, column) in table.columns.iter().enumerate() {
            let values: Vec<NormalizedValue> = rows
                .iter()
                .map(|r| r.values.get(col_index).copied().unwrap_or(NormalizedValue::Na))
                .collect();
            Self::column_stats(column, &values, metrics, &mut stats);
        }

        Some(PeriodStats {
            period_key,
            range: format_range(start, end),
            start,
            end,
            days: rows.len(),
            stats,
        })
    }

    fn column_stats(
        column: &Column,
        values: &[NormalizedValue],
        metrics: &MetricTable,
        out: &mut Vec<Stat>,
    ) {
        let spec = metrics.get(&column.id).filter(|_| column.recognized);
        let id = &column.id;

        if spec.is_some_and(|s| s.missing_as_zero) {
            let total: f64 = values.iter().map(|v| v.as_f64().unwrap_or(0.0)).sum();
            out.push(Stat {
                name: format!("total_{}", id),
                value: StatValue::Number(total),
            });
            return;
        }

        match column.kind {
            ValueKind::Time => {
                let times: Vec<NaiveTime> = values.iter().filter_map(NormalizedValue::as_time).collect();
                let Some(avg) = circular_mean_time(&times, metrics.evening_start) else {
                    return;
                };
                out.push(Stat {
                    name: format!("avg_{}", id),
                    value: StatValue::Time(avg),
                });
                let expected = spec.and_then(|s| s.expected_time);
                if let Some(offset) = expected
                    .and_then(|e| circular_offset_minutes(&times, e, metrics.evening_start))
                {
                    out.push(Stat {
                        name: format!("avg_offset_{}", id),
                        value: StatValue::Number(offset),
                    });
                }
            }
            kind => {
                let numbers: Vec<f64> = values.iter().filter_map(NormalizedValue::as_f64).collect();
                let Some(avg) = mean(&numbers) else {
                    return;
                };
                // Durations are stored in minutes but reported in hours.
                let avg = if kind == ValueKind::Duration { avg / 60.0 } else { avg };
                out.push(Stat {
                    name: format!("avg_{}", id),
                    value: StatValue::Number(avg),
                });
            }
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
