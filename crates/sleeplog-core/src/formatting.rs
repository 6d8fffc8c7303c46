use chrono::{NaiveTime, Timelike};

use crate::models::NormalizedValue;

/// Format a number with up to four decimals, trailing zeros trimmed.
///
/// # Examples
///
/// ```
/// use sleeplog_core::formatting::format_decimal;
///
/// assert_eq!(format_decimal(1.3), "1.3");
/// assert_eq!(format_decimal(6.0), "6");
/// assert_eq!(format_decimal(0.33333), "0.3333");
/// assert_eq!(format_decimal(-0.0), "0");
/// ```
pub fn format_decimal(value: f64) -> String {
    let fixed = format!("{:.4}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" || trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format a time of day as 24-hour `HH:MM`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use sleeplog_core::formatting::format_clock;
///
/// assert_eq!(format_clock(NaiveTime::from_hms_opt(2, 5, 0).unwrap()), "02:05");
/// ```
pub fn format_clock(t: NaiveTime) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

/// Format a duration in minutes as `H:MM`, the log's own notation.
///
/// # Examples
///
/// ```
/// use sleeplog_core::formatting::format_duration;
///
/// assert_eq!(format_duration(451), "7:31");
/// assert_eq!(format_duration(45), "0:45");
/// ```
pub fn format_duration(minutes: i64) -> String {
    let sign = if minutes < 0 { "-" } else { "" };
    let abs = minutes.abs();
    format!("{}{}:{:02}", sign, abs / 60, abs % 60)
}

/// Format a span of minutes for humans.
///
/// * `< 60` minutes → `"45m"`
/// * `≥ 60` minutes, no remainder → `"3h"`
/// * `≥ 60` minutes, with remainder → `"3h 45m"`
pub fn format_minutes(minutes: f64) -> String {
    let total_mins = minutes.round() as i64;
    if total_mins < 60 {
        format!("{}m", total_mins)
    } else {
        let hours = total_mins / 60;
        let mins = total_mins % 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

/// Render one table cell for delimited output; NA is the empty string.
pub fn format_value(value: &NormalizedValue) -> String {
    match value {
        NormalizedValue::Time(t) => format_clock(*t),
        NormalizedValue::DurationMinutes(m) => format_duration(*m),
        NormalizedValue::DecimalNumber(v) => format_decimal(*v),
        NormalizedValue::Count(n) => n.to_string(),
        NormalizedValue::Na => String::new(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
