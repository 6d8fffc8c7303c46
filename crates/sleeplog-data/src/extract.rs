//! Question/value extraction within one week block.
//!
//! Each question line is matched against the [`MetricTable`], its value
//! tokens are laid out over the seven day-slots, and every slot is
//! normalized. Anything that cannot be read becomes NA and is reported to
//! the anomaly sink.

use std::collections::HashSet;

use sleeplog_core::metrics::{question_slug, MetricTable};
use sleeplog_core::models::{Anomaly, AnomalyKind, NormalizedValue, ValueKind, DAYS_PER_WEEK};
use sleeplog_core::normalize::{is_na_marker, is_plain_number, normalize_token};

use crate::classify::QuestionLine;
use crate::diagnostics::{report, value_anomaly_kind, AnomalySink};
use crate::segment::WeekSegment;

/// A question paired with its seven raw day tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    /// Canonical metric id, or the question slug for opaque columns.
    pub metric: String,
    pub kind: ValueKind,
    pub recognized: bool,
    /// Wording as written in the log.
    pub question: String,
    /// `None` where the line ran out of tokens.
    pub tokens: [Option<String>; DAYS_PER_WEEK],
    /// Tokens past the seventh, which are discarded.
    pub extra_tokens: usize,
}

/// What became of one question line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Record(QuestionRecord),
    /// Unrecognized question whose values are not plain numbers.
    Dropped,
    /// Unrecognized question with no values at all.
    Ignored,
}

/// One metric's normalized values for a week.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub metric: String,
    pub kind: ValueKind,
    pub recognized: bool,
    /// Source wording, when there is any.
    pub question: Option<String>,
    pub values: [NormalizedValue; DAYS_PER_WEEK],
}

/// Match a question line to a metric and spread its tokens over the week.
///
/// Recognized questions always produce a record, even with no tokens.
/// Unrecognized ones survive as opaque decimal columns only when every
/// token is a plain number or NA.
pub fn extract_question(question: &QuestionLine, metrics: &MetricTable) -> Extraction {
    let (metric, kind, recognized) = match metrics.match_question(&question.question) {
        Some(spec) => (spec.id.clone(), spec.kind, true),
        None => {
            if question.tokens.is_empty() {
                return Extraction::Ignored;
            }
            let opaque = question
                .tokens
                .iter()
                .all(|t| is_na_marker(t) || is_plain_number(t));
            if !opaque {
                return Extraction::Dropped;
            }
            (question_slug(&question.question), ValueKind::Decimal, false)
        }
    };

    let tokens: [Option<String>; DAYS_PER_WEEK] =
        std::array::from_fn(|i| question.tokens.get(i).cloned());
    let extra_tokens = question.tokens.len().saturating_sub(DAYS_PER_WEEK);

    Extraction::Record(QuestionRecord {
        metric,
        kind,
        recognized,
        question: question.question.clone(),
        tokens,
        extra_tokens,
    })
}

/// Normalize every slot of a record. Unreadable tokens become NA.
pub fn normalize_record(
    record: &QuestionRecord,
    line: usize,
    week: &str,
    sink: &mut dyn AnomalySink,
) -> MetricSeries {
    let values = std::array::from_fn(|day| {
        let Some(token) = record.tokens[day].as_deref() else {
            return NormalizedValue::Na;
        };
        match normalize_token(token, record.kind) {
            Ok(value) => value,
            Err(issue) => {
                report(
                    sink,
                    Anomaly::new(value_anomaly_kind(issue))
                        .at_line(line)
                        .in_week(week)
                        .for_metric(record.metric.as_str())
                        .on_day(day)
                        .with_token(token),
                );
                NormalizedValue::Na
            }
        }
    });

    MetricSeries {
        metric: record.metric.clone(),
        kind: record.kind,
        recognized: record.recognized,
        question: Some(record.question.clone()).filter(|q| !q.is_empty()),
        values,
    }
}

/// Extract and normalize every question of a week block.
///
/// The first occurrence of a metric within a week wins; later ones are
/// reported and discarded.
pub fn extract_week(
    segment: &WeekSegment<'_>,
    metrics: &MetricTable,
    sink: &mut dyn AnomalySink,
) -> Vec<MetricSeries> {
    let week = segment.label.to_string();
    let mut seen: HashSet<String> = HashSet::new();
    let mut series = Vec::new();

    for q in &segment.questions {
        let record = match extract_question(q.question, metrics) {
            Extraction::Record(record) => record,
            Extraction::Dropped => {
                report(
                    sink,
                    Anomaly::new(AnomalyKind::DroppedQuestion)
                        .at_line(q.line)
                        .in_week(week.as_str())
                        .with_token(q.question.question.as_str()),
                );
                continue;
            }
            Extraction::Ignored => continue,
        };

        if !seen.insert(record.metric.clone()) {
            report(
                sink,
                Anomaly::new(AnomalyKind::DuplicateQuestion)
                    .at_line(q.line)
                    .in_week(week.as_str())
                    .for_metric(record.metric.as_str()),
            );
            continue;
        }

        if record.extra_tokens > 0 {
            let overflow = q.question.tokens[DAYS_PER_WEEK..].join(" ");
            report(
                sink,
                Anomaly::new(AnomalyKind::TooManyTokens)
                    .at_line(q.line)
                    .in_week(week.as_str())
                    .for_metric(record.metric.as_str())
                    .with_token(overflow),
            );
        }

        series.push(normalize_record(&record, q.line, &week, sink));
    }

    series
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify_lines, parse_question_line, split_lines};
    use crate::segment::WeekSegmenter;
    use chrono::NaiveTime;

    fn question(text: &str) -> QuestionLine {
        parse_question_line(text).expect("question line")
    }

    fn t(h: u32, m: u32) -> NormalizedValue {
        NormalizedValue::Time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    // ── extract_question ──────────────────────────────────────────────────────

    #[test]
    fn test_recognized_question_keeps_token_order() {
        let q = question("1b. What time start winding down? 2:20am 2:50am . 2:10am 2:20am 3:20am 3:40am");
        let Extraction::Record(record) = extract_question(&q, &MetricTable::default()) else {
            panic!("expected a record");
        };
        assert_eq!(record.metric, "wind_down_start_time");
        assert!(record.recognized);
        assert_eq!(record.tokens[0].as_deref(), Some("2:20am"));
        assert_eq!(record.tokens[2].as_deref(), Some("."));
        assert_eq!(record.tokens[6].as_deref(), Some("3:40am"));
        assert_eq!(record.extra_tokens, 0);
    }

    #[test]
    fn test_short_line_pads_with_none() {
        let q = question("14. If alcohol, how many standard drinks? 0 1");
        let Extraction::Record(record) = extract_question(&q, &MetricTable::default()) else {
            panic!("expected a record");
        };
        assert_eq!(record.tokens[1].as_deref(), Some("1"));
        assert!(record.tokens[2..].iter().all(Option::is_none));
    }

    #[test]
    fn test_recognized_question_without_tokens_opens_record() {
        let q = question("2. What time did you get into bed?");
        let Extraction::Record(record) = extract_question(&q, &MetricTable::default()) else {
            panic!("expected a record");
        };
        assert_eq!(record.metric, "bed_time");
        assert!(record.tokens.iter().all(Option::is_none));
    }

    #[test]
    fn test_too_many_tokens_truncated() {
        let q = question("11. Sleep quality? 1 2 3 4 5 6 7 8 9");
        let Extraction::Record(record) = extract_question(&q, &MetricTable::default()) else {
            panic!("expected a record");
        };
        assert_eq!(record.tokens[6].as_deref(), Some("7"));
        assert_eq!(record.extra_tokens, 2);
    }

    #[test]
    fn test_unrecognized_numeric_question_is_opaque() {
        let q = question("20. Minutes of reading? 30 . 45 0 10 . 5");
        let Extraction::Record(record) = extract_question(&q, &MetricTable::default()) else {
            panic!("expected a record");
        };
        assert!(!record.recognized);
        assert_eq!(record.kind, ValueKind::Decimal);
        assert_eq!(record.metric, "minutes_of_reading");
    }

    #[test]
    fn test_unrecognized_mixed_question_is_dropped() {
        let q = question("21. What did you read? novel 12:40am|1:18am . . . . .");
        assert_eq!(extract_question(&q, &MetricTable::default()), Extraction::Dropped);
    }

    #[test]
    fn test_unrecognized_empty_question_is_ignored() {
        let q = question("22. Anything else?");
        assert_eq!(extract_question(&q, &MetricTable::default()), Extraction::Ignored);
    }

    // ── normalize_record ──────────────────────────────────────────────────────

    #[test]
    fn test_multi_value_token_is_na_and_reported() {
        let q = question("2. What time did you get into bed? 1am 12:40am|1:18am 2am");
        let Extraction::Record(record) = extract_question(&q, &MetricTable::default()) else {
            panic!("expected a record");
        };
        let mut sink: Vec<Anomaly> = Vec::new();
        let series = normalize_record(&record, 7, "6/19-6/25", &mut sink);
        assert_eq!(series.values[0], t(1, 0));
        assert_eq!(series.values[1], NormalizedValue::Na);
        assert_eq!(series.values[2], t(2, 0));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].kind, AnomalyKind::MultiValue);
        assert_eq!(sink[0].day, Some(1));
        assert_eq!(sink[0].line, Some(7));
    }

    #[test]
    fn test_malformed_token_is_na_and_reported() {
        let q = question("11. Sleep quality? 7 great 6");
        let Extraction::Record(record) = extract_question(&q, &MetricTable::default()) else {
            panic!("expected a record");
        };
        let mut sink: Vec<Anomaly> = Vec::new();
        let series = normalize_record(&record, 1, "6/19-6/25", &mut sink);
        assert_eq!(series.values[1], NormalizedValue::Na);
        assert_eq!(series.values[2], NormalizedValue::DecimalNumber(6.0));
        assert_eq!(sink[0].kind, AnomalyKind::InvalidValue);
        assert_eq!(sink[0].token.as_deref(), Some("great"));
    }

    // ── extract_week ──────────────────────────────────────────────────────────

    fn week_series(text: &str) -> (Vec<MetricSeries>, Vec<Anomaly>) {
        let lines = classify_lines(&split_lines(text));
        let segment = WeekSegmenter::new(&lines, 2025)
            .weeks()
            .next()
            .expect("one week");
        let mut sink: Vec<Anomaly> = Vec::new();
        let series = extract_week(&segment, &MetricTable::default(), &mut sink);
        (series, sink)
    }

    #[test]
    fn test_duplicate_metric_first_wins() {
        let (series, sink) = week_series(
            "    6/19-6/25\n        2. What time did you get into bed? 1am\n        2b. What time did you get into bed? 3am\n",
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].values[0], t(1, 0));
        assert_eq!(sink[0].kind, AnomalyKind::DuplicateQuestion);
        assert_eq!(sink[0].line, Some(3));
    }

    #[test]
    fn test_overflow_reported_once_per_line() {
        let (series, sink) = week_series("    6/19-6/25\n        10. Mood? 1 2 3 4 5 6 7 8\n");
        assert_eq!(series[0].values[6], NormalizedValue::DecimalNumber(7.0));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].kind, AnomalyKind::TooManyTokens);
        assert_eq!(sink[0].token.as_deref(), Some("8"));
    }

    #[test]
    fn test_dropped_question_reported() {
        let (series, sink) = week_series("    6/19-6/25\n        21. Who called? mom . dad\n");
        assert!(series.is_empty());
        assert_eq!(sink[0].kind, AnomalyKind::DroppedQuestion);
    }

    #[test]
    fn test_alcohol_scenario_values() {
        let (series, _) = week_series(
            "    6/19-6/25\n        14. If alcohol, how many standard drinks? 0 1.3 0 2 3 0 0\n",
        );
        assert_eq!(series[0].metric, "alcohol_drinks");
        let sum: f64 = series[0].values.iter().filter_map(|v| v.as_f64()).sum();
        assert!((sum - 6.3).abs() < 1e-9);
    }
}
