//! Grouping of classified lines into week blocks.

use chrono::NaiveDate;
use sleeplog_core::models::{Anomaly, AnomalyKind, WeekLabel};

use crate::classify::{ClassifiedLine, LineKind, QuestionLine};

/// A question line inside a week, with its source line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionRef<'a> {
    pub line: usize,
    pub question: &'a QuestionLine,
}

/// The lines between one date-range header and the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekSegment<'a> {
    pub label: WeekLabel,
    /// Date of day-slot 0.
    pub start: NaiveDate,
    pub header_line: usize,
    /// Question lines in source order. Notes, dividers and blanks are gone.
    pub questions: Vec<QuestionRef<'a>>,
    /// Structural anomalies found inside the block.
    pub anomalies: Vec<Anomaly>,
}

/// One step of segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Week(WeekSegment<'a>),
    /// A line outside any usable week that was skipped.
    Skipped(Anomaly),
}

/// Lazy iterator over the week blocks of a classified log.
///
/// Cloning the segmenter, or building a new one over the same lines,
/// restarts segmentation from the top.
#[derive(Debug, Clone)]
pub struct WeekSegmenter<'a> {
    lines: &'a [ClassifiedLine],
    pos: usize,
    year: i32,
}

impl<'a> WeekSegmenter<'a> {
    pub fn new(lines: &'a [ClassifiedLine], year: i32) -> Self {
        Self {
            lines,
            pos: 0,
            year,
        }
    }

    /// Only the week blocks, dropping skipped-line reports.
    pub fn weeks(self) -> impl Iterator<Item = WeekSegment<'a>> {
        self.filter_map(|segment| match segment {
            Segment::Week(week) => Some(week),
            Segment::Skipped(_) => None,
        })
    }

    /// Consume lines up to the next header into a block.
    fn collect_week(&mut self, label: WeekLabel, start: NaiveDate, header_line: usize) -> WeekSegment<'a> {
        let lines = self.lines;
        let mut week = WeekSegment {
            label,
            start,
            header_line,
            questions: Vec::new(),
            anomalies: Vec::new(),
        };

        while let Some(classified) = lines.get(self.pos) {
            match &classified.kind {
                LineKind::WeekHeader(_) => break,
                LineKind::Question(question) => week.questions.push(QuestionRef {
                    line: classified.line.number,
                    question,
                }),
                LineKind::Note if classified.line.depth == 1 => week.anomalies.push(
                    Anomaly::new(AnomalyKind::UnrecognizedHeader)
                        .at_line(classified.line.number)
                        .in_week(label.to_string())
                        .with_token(classified.line.text.clone()),
                ),
                _ => {}
            }
            self.pos += 1;
        }

        week
    }
}

impl<'a> Iterator for WeekSegmenter<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines;
        while let Some(classified) = lines.get(self.pos) {
            self.pos += 1;
            let number = classified.line.number;
            match &classified.kind {
                LineKind::WeekHeader(label) => {
                    return match NaiveDate::from_ymd_opt(self.year, label.start_month, label.start_day) {
                        Some(start) => Some(Segment::Week(self.collect_week(*label, start, number))),
                        // Questions up to the next valid header are orphaned.
                        None => Some(Segment::Skipped(
                            Anomaly::new(AnomalyKind::InvalidHeaderDate)
                                .at_line(number)
                                .with_token(classified.line.text.clone()),
                        )),
                    };
                }
                LineKind::Question(_) => {
                    return Some(Segment::Skipped(
                        Anomaly::new(AnomalyKind::OrphanedQuestion)
                            .at_line(number)
                            .with_token(classified.line.text.clone()),
                    ));
                }
                LineKind::Note if classified.line.depth == 1 => {
                    return Some(Segment::Skipped(
                        Anomaly::new(AnomalyKind::UnrecognizedHeader)
                            .at_line(number)
                            .with_token(classified.line.text.clone()),
                    ));
                }
                _ => {}
            }
        }
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
