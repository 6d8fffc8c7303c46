//! The text-log parse pipeline.
//!
//! raw text → [`classify`](crate::classify) → [`WeekSegmenter`] →
//! [`extract_week`] → [`RecordAssembler`] → [`Table`].
//!
//! Parsing is total: every input yields a table, possibly with zero rows.

use std::collections::HashSet;

use sleeplog_core::metrics::MetricTable;
use sleeplog_core::models::{Anomaly, AnomalyKind, Table};
use sleeplog_core::time_utils::DEFAULT_YEAR;
use tracing::debug;

use crate::assemble::RecordAssembler;
use crate::classify::{classify_lines, split_lines, RawLine};
use crate::diagnostics::{report, AnomalySink, NullSink};
use crate::extract::extract_week;
use crate::segment::{Segment, WeekSegmenter};

/// Options that are not part of the metric table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Year the month/day of week headers are resolved in.
    pub year: i32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { year: DEFAULT_YEAR }
    }
}

/// Parser for indentation-structured weekly sleep logs.
#[derive(Debug, Clone, Default)]
pub struct LogParser {
    metrics: MetricTable,
    options: ParseOptions,
}

impl LogParser {
    pub fn new(metrics: MetricTable, options: ParseOptions) -> Self {
        Self { metrics, options }
    }

    pub fn metrics(&self) -> &MetricTable {
        &self.metrics
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    /// Parse raw text, discarding anomalies.
    pub fn parse_text(&self, text: &str) -> Table {
        self.parse_lines(&split_lines(text))
    }

    /// Parse pre-split lines, discarding anomalies.
    pub fn parse_lines(&self, lines: &[RawLine]) -> Table {
        self.parse_with_anomalies(lines, &mut NullSink)
    }

    /// Parse pre-split lines, reporting every absorbed anomaly to `sink`.
    ///
    /// The returned table is the same whatever the sink does.
    pub fn parse_with_anomalies(&self, lines: &[RawLine], sink: &mut dyn AnomalySink) -> Table {
        let classified = classify_lines(lines);
        let mut assembler = RecordAssembler::new(&self.metrics);
        let mut labels: HashSet<String> = HashSet::new();

        for segment in WeekSegmenter::new(&classified, self.options.year) {
            let week = match segment {
                Segment::Week(week) => week,
                Segment::Skipped(anomaly) => {
                    report(sink, anomaly);
                    continue;
                }
            };

            let label = week.label.to_string();
            if !labels.insert(label.clone()) {
                report(
                    sink,
                    Anomaly::new(AnomalyKind::DuplicateWeekLabel)
                        .at_line(week.header_line)
                        .in_week(label.as_str()),
                );
            }
            for anomaly in &week.anomalies {
                report(sink, anomaly.clone());
            }

            let series = extract_week(&week, &self.metrics, sink);
            debug!(
                "Week {} (line {}): {} questions, {} metrics",
                label,
                week.header_line,
                week.questions.len(),
                series.len()
            );
            if week.questions.is_empty() {
                assembler.push_blank_week(label, week.start);
            } else {
                assembler.push_week(label, week.start, series);
            }
        }

        let weeks = assembler.week_count();
        let table = assembler.finish();
        debug!("Parsed {} weeks into {} rows", weeks, table.len());
        table
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
