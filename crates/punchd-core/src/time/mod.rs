//! Date window helpers for attendance fetches.
//!
//! The portal's `search_read` date filters are half-open: `[from, to)`.
//! The daily window is `[today, tomorrow)` and the monthly window is
//! `[first-of-month, first-of-next-month)`, computed with real calendar
//! arithmetic so variable month lengths and leap years stay correct.

use chrono::{Datelike, Days, Local, NaiveDate};

/// Format a date the way the portal expects it (`YYYY-MM-DD`).
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Today's date in the local timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn date_plus_days(date: NaiveDate, days: u64) -> NaiveDate {
    // Days::new(u64) cannot overflow a NaiveDate for any realistic offset
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}

/// The half-open daily fetch window `[date, date + 1 day)`.
pub fn daily_window(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    (date, date_plus_days(date, 1))
}

/// The half-open monthly fetch window `[first-of-month, first-of-next-month)`.
pub fn month_window(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date
        .with_day(1)
        .expect("day 1 is valid for every month");

    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
    .expect("first day of next month is always valid");

    (first, next_first)
}
