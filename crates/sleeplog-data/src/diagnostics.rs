//! Side channel for parse anomalies.
//!
//! The parser absorbs every anomaly into NA or a skipped line. Callers that
//! want to know what was absorbed pass an [`AnomalySink`]; what it collects
//! never changes the returned table.

use sleeplog_core::models::{Anomaly, AnomalyKind};
use sleeplog_core::normalize::ValueIssue;
use tracing::{debug, warn};

/// Receiver for anomalies found while parsing.
pub trait AnomalySink {
    fn record(&mut self, anomaly: Anomaly);
}

impl AnomalySink for Vec<Anomaly> {
    fn record(&mut self, anomaly: Anomaly) {
        self.push(anomaly);
    }
}

/// Discards every anomaly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AnomalySink for NullSink {
    fn record(&mut self, _anomaly: Anomaly) {}
}

/// Mirror an anomaly to the log, then hand it to `sink`.
///
/// Token overflow is a warning; everything else is debug-level noise that
/// ordinary hand-written logs produce constantly.
pub(crate) fn report(sink: &mut dyn AnomalySink, anomaly: Anomaly) {
    match anomaly.kind {
        AnomalyKind::TooManyTokens | AnomalyKind::DuplicateWeekLabel => {
            warn!("{}", anomaly)
        }
        _ => debug!("{}", anomaly),
    }
    sink.record(anomaly);
}

/// Anomaly category for a token the normalizer rejected.
pub(crate) fn value_anomaly_kind(issue: ValueIssue) -> AnomalyKind {
    match issue {
        ValueIssue::MultiValue => AnomalyKind::MultiValue,
        ValueIssue::Malformed | ValueIssue::OutOfRange => AnomalyKind::InvalidValue,
    }
}

/// Count anomalies per kind, in first-seen order.
pub fn summarize(anomalies: &[Anomaly]) -> Vec<(AnomalyKind, usize)> {
    let mut counts: Vec<(AnomalyKind, usize)> = Vec::new();
    for a in anomalies {
        match counts.iter_mut().find(|(k, _)| *k == a.kind) {
            Some((_, n)) => *n += 1,
            None => counts.push((a.kind, 1)),
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<Anomaly> = Vec::new();
        report(&mut sink, Anomaly::new(AnomalyKind::InvalidValue).with_token("x"));
        report(&mut sink, Anomaly::new(AnomalyKind::TooManyTokens));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0].token.as_deref(), Some("x"));
    }

    #[test]
    fn test_null_sink_discards() {
        let mut sink = NullSink;
        report(&mut sink, Anomaly::new(AnomalyKind::InvalidValue));
    }

    #[test]
    fn test_summarize_counts_in_first_seen_order() {
        let anomalies = vec![
            Anomaly::new(AnomalyKind::MultiValue),
            Anomaly::new(AnomalyKind::InvalidValue),
            Anomaly::new(AnomalyKind::MultiValue),
        ];
        assert_eq!(
            summarize(&anomalies),
            vec![(AnomalyKind::MultiValue, 2), (AnomalyKind::InvalidValue, 1)]
        );
    }
}
