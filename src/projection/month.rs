//! Month arithmetic on "YYYY-MM" strings.
use chrono::{Datelike, NaiveDate};

pub fn parse_month(month: &str) -> Option<NaiveDate> {
    let (year, mon) = month.split_once('-')?;
    if year.len() != 4 || mon.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, mon.parse().ok()?, 1)
}

pub fn format_month(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Inclusive list of months from `start` to `end`. Empty when either bound
/// is malformed or `start` is after `end`.
pub fn get_months(start: &str, end: &str) -> Vec<String> {
    let (Some(mut current), Some(last)) = (parse_month(start), parse_month(end)) else {
        return Vec::new();
    };
    let mut months = Vec::new();
    while current <= last {
        months.push(format_month(current));
        current = match next_month(current) {
            Some(next) => next,
            None => break,
        };
    }
    months
}

/// Number of months from `from` to `to`; negative when `to` is earlier.
/// Malformed input counts as zero.
pub fn month_diff(from: &str, to: &str) -> i32 {
    match (parse_month(from), parse_month(to)) {
        (Some(a), Some(b)) => (b.year() - a.year()) * 12 + b.month() as i32 - a.month() as i32,
        _ => 0,
    }
}

pub fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Number of days in the given month.
pub fn days_in_month(month: &str) -> Option<u32> {
    let first = parse_month(month)?;
    let next = next_month(first)?;
    Some((next - first).num_days() as u32)
}
