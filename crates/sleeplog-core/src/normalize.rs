//! Raw token → [`NormalizedValue`] conversion.
//!
//! Normalization is total: every token yields either a value (possibly
//! [`NormalizedValue::Na`]) or a [`ValueIssue`] that callers turn into `Na`
//! plus a diagnostic.

use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveTime;
use regex::Regex;

use crate::models::{NormalizedValue, ValueKind};

/// Why a token could not be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueIssue {
    /// Token does not have the shape the metric expects.
    Malformed,
    /// Several `|`-joined answers where a single value is expected.
    MultiValue,
    /// Shape is right but a field is out of range (e.g. `13pm`, `7:75`).
    OutOfRange,
}

impl fmt::Display for ValueIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueIssue::Malformed => "malformed",
            ValueIssue::MultiValue => "multiple values",
            ValueIssue::OutOfRange => "out of range",
        };
        f.write_str(s)
    }
}

/// Largest duration accepted, in hours.
const MAX_DURATION_HOURS: i64 = 10_000;

fn meridiem_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(\d{1,2})(?::(\d{2}))?\s?([ap])\.?m\.?$").expect("regex is valid")
    })
}

fn clock_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("regex is valid"))
}

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("regex is valid"))
}

fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?\d+$").expect("regex is valid"))
}

/// Whether `token` is an explicit missing-value marker.
///
/// A lone `.` is the log's own convention; empty cells and `NA` come from
/// spreadsheet exports.
pub fn is_na_marker(token: &str) -> bool {
    let t = token.trim();
    t.is_empty() || t == "." || t.eq_ignore_ascii_case("na") || t.eq_ignore_ascii_case("n/a")
}

/// Whether `token` is a plain decimal number such as `3`, `1.3` or `.5`.
pub fn is_plain_number(token: &str) -> bool {
    decimal_re().is_match(token.trim())
}

/// Normalize one raw token for a metric of kind `kind`.
///
/// NA markers short-circuit before any kind-specific parsing, so `"."` is
/// `Na` for every kind.
pub fn normalize_token(token: &str, kind: ValueKind) -> Result<NormalizedValue, ValueIssue> {
    let token = token.trim();
    if is_na_marker(token) {
        return Ok(NormalizedValue::Na);
    }
    if token.contains('|') {
        return Err(ValueIssue::MultiValue);
    }
    match kind {
        ValueKind::Time => parse_time(token).map(NormalizedValue::Time),
        ValueKind::Duration => parse_duration_minutes(token).map(NormalizedValue::DurationMinutes),
        ValueKind::Decimal => parse_decimal(token).map(NormalizedValue::DecimalNumber),
        ValueKind::Count => {
            if integer_re().is_match(token) {
                token
                    .parse::<i64>()
                    .map(NormalizedValue::Count)
                    .map_err(|_| ValueIssue::OutOfRange)
            } else {
                parse_decimal(token).map(NormalizedValue::DecimalNumber)
            }
        }
    }
}

/// Like [`normalize_token`] but folds every issue into `Na`.
pub fn normalize_or_na(token: &str, kind: ValueKind) -> NormalizedValue {
    normalize_token(token, kind).unwrap_or(NormalizedValue::Na)
}

/// Parse a clock time: `2am`, `2:20am`, `10:30 PM`, or 24-hour `23:15`.
pub fn parse_time(token: &str) -> Result<NaiveTime, ValueIssue> {
    let token = token.trim();
    if let Some(caps) = meridiem_time_re().captures(token) {
        let hour: u32 = caps[1].parse().map_err(|_| ValueIssue::Malformed)?;
        let minute: u32 = match caps.get(2) {
            Some(m) => m.as_str().parse().map_err(|_| ValueIssue::Malformed)?,
            None => 0,
        };
        if !(1..=12).contains(&hour) {
            return Err(ValueIssue::OutOfRange);
        }
        let pm = caps[3].eq_ignore_ascii_case("p");
        let hour24 = match (pm, hour) {
            (false, 12) => 0,
            (false, h) => h,
            (true, 12) => 12,
            (true, h) => h + 12,
        };
        return NaiveTime::from_hms_opt(hour24, minute, 0).ok_or(ValueIssue::OutOfRange);
    }
    if let Some(caps) = clock_time_re().captures(token) {
        let hour: u32 = caps[1].parse().map_err(|_| ValueIssue::Malformed)?;
        let minute: u32 = caps[2].parse().map_err(|_| ValueIssue::Malformed)?;
        return NaiveTime::from_hms_opt(hour, minute, 0).ok_or(ValueIssue::OutOfRange);
    }
    Err(ValueIssue::Malformed)
}

/// Parse a duration as total minutes: `7:31` is hours:minutes, `7.5` is
/// decimal hours.
pub fn parse_duration_minutes(token: &str) -> Result<i64, ValueIssue> {
    let token = token.trim();
    if let Some((h, m)) = token.split_once(':') {
        if h.is_empty()
            || m.len() != 2
            || !h.chars().all(|c| c.is_ascii_digit())
            || !m.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ValueIssue::Malformed);
        }
        let hours: i64 = h.parse().map_err(|_| ValueIssue::OutOfRange)?;
        let minutes: i64 = m.parse().map_err(|_| ValueIssue::Malformed)?;
        if minutes >= 60 || hours > MAX_DURATION_HOURS {
            return Err(ValueIssue::OutOfRange);
        }
        return hours
            .checked_mul(60)
            .and_then(|m| m.checked_add(minutes))
            .ok_or(ValueIssue::OutOfRange);
    }
    let hours = parse_decimal(token)?;
    if !(0.0..=MAX_DURATION_HOURS as f64).contains(&hours) {
        return Err(ValueIssue::OutOfRange);
    }
    Ok((hours * 60.0).round() as i64)
}

fn parse_decimal(token: &str) -> Result<f64, ValueIssue> {
    if !decimal_re().is_match(token) {
        return Err(ValueIssue::Malformed);
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(ValueIssue::Malformed)
}
