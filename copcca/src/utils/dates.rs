//! Date formatting and arithmetic. All values are UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
const FULL_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateStyle {
    /// `Mar 5`
    Short,
    /// `Mar 5, 2025`
    #[default]
    Medium,
    /// `March 5, 2025`
    Long,
}

/// Parse the date formats clients send: RFC 3339 timestamps, `YYYY-MM-DDTHH:MM[:SS]` local
/// times and bare `YYYY-MM-DD` dates (taken as midnight). Zone-less values are read as UTC.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
}

pub fn format_date(date: DateTime<Utc>, style: DateStyle) -> String {
    let month = date.month0() as usize;
    match style {
        DateStyle::Short => format!("{} {}", MONTHS[month], date.day()),
        DateStyle::Medium => format!("{} {}, {}", MONTHS[month], date.day(), date.year()),
        DateStyle::Long => format!("{} {}, {}", FULL_MONTHS[month], date.day(), date.year()),
    }
}

/// 12-hour clock, e.g. `9:05 AM`.
pub fn format_time(date: DateTime<Utc>) -> String {
    let (pm, hour) = date.hour12();
    format!("{}:{:02} {}", hour, date.minute(), if pm { "PM" } else { "AM" })
}

pub fn format_date_time(date: DateTime<Utc>) -> String {
    format!("{} at {}", format_date(date, DateStyle::Medium), format_time(date))
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 { format!("{n} {unit}") } else { format!("{n} {unit}s") }
}

/// Human description of `date` relative to `now`: `just now`, `3 hours ago`, `in 2 weeks`.
pub fn relative_time_from(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_sec = (now - date).num_milliseconds().div_euclid(1000);
    let diff_min = diff_sec.div_euclid(60);
    let diff_hour = diff_min.div_euclid(60);
    let diff_day = diff_hour.div_euclid(24);

    let (n, unit) = if diff_sec.abs() < 60 {
        return "just now".to_string();
    } else if diff_min.abs() < 60 {
        (diff_min, "minute")
    } else if diff_hour.abs() < 24 {
        (diff_hour, "hour")
    } else if diff_day.abs() < 7 {
        (diff_day, "day")
    } else if diff_day.div_euclid(7).abs() < 4 {
        (diff_day.div_euclid(7), "week")
    } else if diff_day.div_euclid(30).abs() < 12 {
        (diff_day.div_euclid(30), "month")
    } else {
        (diff_day.div_euclid(365), "year")
    };

    if n > 0 {
        format!("{} ago", plural(n, unit))
    } else {
        format!("in {}", plural(n.abs(), unit))
    }
}

pub fn relative_time(date: DateTime<Utc>) -> String {
    relative_time_from(date, Utc::now())
}

pub fn is_today(date: DateTime<Utc>) -> bool {
    date.date_naive() == Utc::now().date_naive()
}

pub fn is_past(date: DateTime<Utc>) -> bool {
    date < Utc::now()
}

pub fn is_future(date: DateTime<Utc>) -> bool {
    date > Utc::now()
}

pub fn add_days(date: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    date + Duration::days(days)
}

pub fn start_of_day(date: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.date_naive().and_time(NaiveTime::MIN))
}

/// 23:59:59.999 on the same day.
pub fn end_of_day(date: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(date) + Duration::milliseconds(MS_PER_DAY - 1)
}

/// Whole days between two instants, in either order.
pub fn days_between(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    (b - a).num_milliseconds().abs() / MS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_format_date_styles() {
        let d = at("2025-03-05T14:07:00Z");
        assert_eq!(format_date(d, DateStyle::Short), "Mar 5");
        assert_eq!(format_date(d, DateStyle::Medium), "Mar 5, 2025");
        assert_eq!(format_date(d, DateStyle::Long), "March 5, 2025");
        assert_eq!(format_time(d), "2:07 PM");
        assert_eq!(format_date_time(d), "Mar 5, 2025 at 2:07 PM");
    }

    #[test]
    fn test_midnight_and_noon() {
        assert_eq!(format_time(at("2025-01-01T00:30:00Z")), "12:30 AM");
        assert_eq!(format_time(at("2025-01-01T12:00:00Z")), "12:00 PM");
    }

    #[test]
    fn test_parse_bare_date() {
        assert_eq!(at("2025-06-01"), at("2025-06-01T00:00:00Z"));
        assert_eq!(at("2025-06-01T14:30"), at("2025-06-01T14:30:00Z"));
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn test_relative_time() {
        let now = at("2025-06-15T12:00:00Z");
        assert_eq!(relative_time_from(now - Duration::seconds(30), now), "just now");
        assert_eq!(relative_time_from(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(relative_time_from(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(relative_time_from(now + Duration::hours(2), now), "in 2 hours");
        assert_eq!(relative_time_from(now - Duration::days(3), now), "3 days ago");
        assert_eq!(relative_time_from(now - Duration::days(14), now), "2 weeks ago");
        assert_eq!(relative_time_from(now - Duration::days(65), now), "2 months ago");
        assert_eq!(relative_time_from(now - Duration::days(800), now), "2 years ago");
        assert_eq!(relative_time_from(now + Duration::days(1), now), "in 1 day");
    }

    #[test]
    fn test_days_between_is_symmetric() {
        let a = at("2025-01-01T08:00:00Z");
        let b = at("2025-01-04T07:59:59Z");
        assert_eq!(days_between(a, b), 2);
        assert_eq!(days_between(b, a), 2);
        assert_eq!(days_between(a, a), 0);
        for hours in [1, 23, 24, 25, 1000] {
            let c = a + Duration::hours(hours);
            assert_eq!(days_between(a, c), days_between(c, a));
        }
    }

    #[test]
    fn test_day_bounds() {
        let d = at("2025-03-05T14:07:00Z");
        assert_eq!(start_of_day(d), at("2025-03-05T00:00:00Z"));
        assert_eq!(end_of_day(d), at("2025-03-05T23:59:59.999Z"));
        assert_eq!(add_days(d, -5), at("2025-02-28T14:07:00Z"));
        assert!(is_past(d));
        assert!(is_future(Utc::now() + Duration::hours(1)));
        assert!(is_today(Utc::now()));
    }
}
