//! Small date helpers shared by the bond accrual engine and statistic builder.

use chrono::{Datelike, NaiveDate};

/// `full_months(a, b) = 12*(b.year - a.year) + (b.month - a.month)`, ignoring
/// day-of-month (spec §4.2).
pub fn full_months(a: NaiveDate, b: NaiveDate) -> i64 {
    12 * (b.year() as i64 - a.year() as i64) + (b.month() as i64 - a.month() as i64)
}

/// Calendar day count between two dates under a 365-day year convention (no
/// leap adjustment, spec §4.2) — equivalent to the plain Gregorian day
/// difference, since `chrono` already counts actual calendar days.
pub fn calendar_days(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// Adds whole months to a date, clamping the day-of-month down when the
/// target month is shorter (e.g. Jan 31 + 1 month -> Feb 28/29).
pub fn add_months(date: NaiveDate, months: i64) -> NaiveDate {
    let total_months = date.year() as i64 * 12 + (date.month() as i64 - 1) + months;
    let year = total_months.div_euclid(12) as i32;
    let month = (total_months.rem_euclid(12) + 1) as u32;
    let mut day = date.day();
    loop {
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
            return d;
        }
        day -= 1;
    }
}

/// Inclusive list of calendar dates from `start` to `end`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    let n = (end - start).num_days();
    (0..=n).map(|i| start + chrono::Duration::days(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_months_ignores_day_of_month() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(full_months(a, b), 12);
    }

    #[test]
    fn add_months_clamps_short_month() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(add_months(d, 1), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn days_between_is_inclusive() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(days_between(a, b).len(), 3);
    }
}
