use std::f64::consts::TAU;

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Timelike};

/// Year assumed for week headers, which only carry month and day.
pub const DEFAULT_YEAR: i32 = 2025;

const MINUTES_PER_DAY: f64 = 1440.0;

// ── Calendar helpers ──────────────────────────────────────────────────────────

/// Date of day-slot `index` in a week starting on `start`, with month and
/// year rollover.
pub fn day_slot_date(start: NaiveDate, index: usize) -> Option<NaiveDate> {
    start.checked_add_days(Days::new(index as u64))
}

/// The Sunday–Saturday week containing `date`.
pub fn calendar_week_range(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let back = u64::from(date.weekday().num_days_from_sunday());
    let start = date.checked_sub_days(Days::new(back)).unwrap_or(date);
    let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
    (start, end)
}

/// Range label used in output file names, e.g. `2025--06-19--06-25`.
pub fn format_range(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{:04}--{}--{}",
        start.year(),
        start.format("%m-%d"),
        end.format("%m-%d")
    )
}

/// The night a day-slot belongs to.
///
/// A bed time earlier than `evening_start` means the person went to bed
/// after midnight, so the row counts towards the following date.
pub fn effective_date(
    date: NaiveDate,
    bed_time: Option<NaiveTime>,
    evening_start: NaiveTime,
) -> NaiveDate {
    match bed_time {
        Some(t) if t < evening_start => date.succ_opt().unwrap_or(date),
        _ => date,
    }
}

// ── Circular statistics ───────────────────────────────────────────────────────

fn minutes_of(t: NaiveTime) -> f64 {
    f64::from(t.hour() * 60 + t.minute())
}

fn angle_of(t: NaiveTime, anchor: NaiveTime) -> f64 {
    let shifted = (minutes_of(t) - minutes_of(anchor)).rem_euclid(MINUTES_PER_DAY);
    TAU * shifted / MINUTES_PER_DAY
}

fn time_from_minutes(minutes: f64) -> Option<NaiveTime> {
    let total = minutes.round().rem_euclid(MINUTES_PER_DAY) as u32;
    NaiveTime::from_hms_opt(total / 60, total % 60, 0)
}

/// Circular mean of times of day.
///
/// Times are placed on a 24h circle starting at `anchor`, so `11pm` and
/// `1am` average to midnight rather than noon. Returns `None` for an empty
/// slice or when the times cancel out exactly.
pub fn circular_mean_time(times: &[NaiveTime], anchor: NaiveTime) -> Option<NaiveTime> {
    if times.is_empty() {
        return None;
    }
    let n = times.len() as f64;
    let (sum_x, sum_y) = times.iter().fold((0.0, 0.0), |(x, y), t| {
        let a = angle_of(*t, anchor);
        (x + a.cos(), y + a.sin())
    });
    let (avg_x, avg_y) = (sum_x / n, sum_y / n);
    if avg_x.hypot(avg_y) < 1e-9 {
        return None;
    }
    let mut angle = avg_y.atan2(avg_x);
    if angle < 0.0 {
        angle += TAU;
    }
    time_from_minutes(minutes_of(anchor) + angle / TAU * MINUTES_PER_DAY)
}

/// Mean absolute circular distance, in minutes, between `times` and
/// `expected`.
pub fn circular_offset_minutes(
    times: &[NaiveTime],
    expected: NaiveTime,
    anchor: NaiveTime,
) -> Option<f64> {
    if times.is_empty() {
        return None;
    }
    let expected_angle = angle_of(expected, anchor);
    let total: f64 = times
        .iter()
        .map(|t| {
            let diff = angle_of(*t, anchor) - expected_angle;
            let wrapped = diff.sin().atan2(diff.cos());
            (wrapped / TAU * MINUTES_PER_DAY).abs()
        })
        .sum();
    Some(total / times.len() as f64)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn evening() -> NaiveTime {
        t(17, 0)
    }

    // ── day_slot_date ─────────────────────────────────────────────────────────

    #[test]
    fn test_day_slot_date_month_rollover() {
        assert_eq!(day_slot_date(d(6, 28), 0), Some(d(6, 28)));
        assert_eq!(day_slot_date(d(6, 28), 3), Some(d(7, 1)));
        assert_eq!(day_slot_date(d(2, 26), 6), Some(d(3, 4)));
    }

    #[test]
    fn test_day_slot_date_year_rollover() {
        let start = d(12, 29);
        assert_eq!(
            day_slot_date(start, 5),
            NaiveDate::from_ymd_opt(2026, 1, 3)
        );
    }

    // ── calendar_week_range ───────────────────────────────────────────────────

    #[test]
    fn test_calendar_week_range_sunday_start() {
        // 2025-01-01 is a Wednesday.
        let (start, end) = calendar_week_range(d(1, 1));
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 12, 29).unwrap());
        assert_eq!(end, d(1, 4));
    }

    #[test]
    fn test_calendar_week_range_on_sunday() {
        // 2025-06-22 is a Sunday.
        let (start, end) = calendar_week_range(d(6, 22));
        assert_eq!(start, d(6, 22));
        assert_eq!(end, d(6, 28));
    }

    #[test]
    fn test_format_range() {
        assert_eq!(format_range(d(6, 19), d(6, 25)), "2025--06-19--06-25");
    }

    // ── effective_date ────────────────────────────────────────────────────────

    #[test]
    fn test_effective_date_after_midnight_moves_forward() {
        assert_eq!(effective_date(d(6, 19), Some(t(3, 0)), evening()), d(6, 20));
    }

    #[test]
    fn test_effective_date_evening_stays() {
        assert_eq!(effective_date(d(6, 19), Some(t(23, 0)), evening()), d(6, 19));
        assert_eq!(effective_date(d(6, 19), None, evening()), d(6, 19));
    }

    // ── circular_mean_time ────────────────────────────────────────────────────

    #[test]
    fn test_circular_mean_across_midnight() {
        let mean = circular_mean_time(&[t(23, 0), t(1, 0)], evening()).unwrap();
        assert_eq!(mean, t(0, 0));
    }

    #[test]
    fn test_circular_mean_identical_times() {
        let mean = circular_mean_time(&[t(2, 20), t(2, 20), t(2, 20)], evening()).unwrap();
        assert_eq!(mean, t(2, 20));
    }

    #[test]
    fn test_circular_mean_empty() {
        assert!(circular_mean_time(&[], evening()).is_none());
    }

    #[test]
    fn test_circular_mean_opposite_times_cancel() {
        assert!(circular_mean_time(&[t(0, 0), t(12, 0)], evening()).is_none());
    }

    // ── circular_offset_minutes ───────────────────────────────────────────────

    #[test]
    fn test_circular_offset_wraps_midnight() {
        let off = circular_offset_minutes(&[t(23, 50)], t(0, 10), evening()).unwrap();
        assert!((off - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_circular_offset_mean_of_absolute() {
        let off = circular_offset_minutes(&[t(2, 40), t(3, 0)], t(2, 50), evening()).unwrap();
        assert!((off - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_circular_offset_empty() {
        assert!(circular_offset_minutes(&[], t(2, 50), evening()).is_none());
    }
}
