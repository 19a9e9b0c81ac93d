//! Named time-period resolution.
//!
//! Every aggregate query is scoped by a period: either one of the named
//! ranges below, resolved against a fixed reference timezone, or an explicit
//! `start,end` pair of Unix timestamps. Weeks start on Monday.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::errors::{CoreError, Result};

/// Period applied when the request carries no `p` parameter.
pub const DEFAULT_PERIOD: &str = "24h";

/// All recognized named period values, in display order.
pub const NAMED_PERIODS: [&str; 13] = [
    "today",
    "yesterday",
    "24h",
    "week",
    "lastweek",
    "7d",
    "month",
    "lastmonth",
    "30d",
    "90d",
    "year",
    "lastyear",
    "alltime",
];

/// A resolved half-open-ish interval in Unix seconds: `start` is always
/// present; `end` is `None` for ranges that extend to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodRange {
    pub start: i64,
    pub end: Option<i64>,
}

/// Parse the configured reference timezone (IANA name).
pub fn parse_timezone(name: &str) -> Result<Tz> {
    Tz::from_str(name).map_err(|_| CoreError::UnknownTimezone(name.to_string()))
}

/// Resolve a period string to a concrete range, relative to `now` in `tz`.
///
/// Unrecognized input falls through to the `start,end` Unix-timestamp form;
/// anything else is an [`CoreError::InvalidPeriod`].
pub fn resolve(input: &str, tz: Tz, now: DateTime<Utc>) -> Result<PeriodRange> {
    let local = now.with_timezone(&tz);

    let range = match input {
        "today" => open(start_of_day(&tz, local.date_naive())),
        "yesterday" => {
            let day = local.date_naive() - Duration::days(1);
            closed(start_of_day(&tz, day), end_of_day(&tz, day))
        }
        "24h" => PeriodRange {
            start: (now - Duration::hours(24)).timestamp(),
            end: None,
        },
        "week" => open(start_of_week(&tz, local.date_naive())),
        "lastweek" => {
            let this_week = start_of_week_date(local.date_naive());
            let last_week = this_week - Duration::days(7);
            closed(
                start_of_day(&tz, last_week),
                start_of_day(&tz, this_week) - Duration::seconds(1),
            )
        }
        "7d" => PeriodRange {
            start: (now - Duration::days(7)).timestamp(),
            end: None,
        },
        "month" => open(start_of_month(&tz, local.date_naive())),
        "lastmonth" => {
            let this_month = first_of_month(local.date_naive());
            let last_month = this_month
                .checked_sub_months(Months::new(1))
                .unwrap_or(this_month);
            closed(
                start_of_day(&tz, last_month),
                start_of_day(&tz, this_month) - Duration::seconds(1),
            )
        }
        "30d" => PeriodRange {
            start: (now - Duration::days(30)).timestamp(),
            end: None,
        },
        "90d" => PeriodRange {
            start: (now - Duration::days(90)).timestamp(),
            end: None,
        },
        "year" => open(start_of_year(&tz, local.date_naive())),
        "lastyear" => {
            let this_year = first_of_year(local.date_naive());
            let last_year = first_of_year(this_year - Duration::days(1));
            closed(
                start_of_day(&tz, last_year),
                start_of_day(&tz, this_year) - Duration::seconds(1),
            )
        }
        "alltime" => PeriodRange { start: 0, end: None },
        custom => return parse_custom(custom),
    };

    Ok(range)
}

fn open(start: DateTime<Tz>) -> PeriodRange {
    PeriodRange {
        start: start.timestamp(),
        end: None,
    }
}

fn closed(start: DateTime<Tz>, end: DateTime<Tz>) -> PeriodRange {
    PeriodRange {
        start: start.timestamp(),
        end: Some(end.timestamp()),
    }
}

/// `start,end` Unix-timestamp fallback for unrecognized period values.
fn parse_custom(input: &str) -> Result<PeriodRange> {
    let invalid = || CoreError::InvalidPeriod(input.to_string());
    let (start, end) = input.split_once(',').ok_or_else(invalid)?;
    let start: i64 = start.trim().parse().map_err(|_| invalid())?;
    let end: i64 = end.trim().parse().map_err(|_| invalid())?;
    Ok(PeriodRange {
        start,
        end: Some(end),
    })
}

/// Local midnight for a calendar date, DST-safe.
fn start_of_day(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// Last second of a calendar date.
fn end_of_day(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    start_of_day(tz, date + Duration::days(1)) - Duration::seconds(1)
}

fn start_of_week_date(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn start_of_week(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    start_of_day(tz, start_of_week_date(date))
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn start_of_month(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    start_of_day(tz, first_of_month(date))
}

fn first_of_year(date: NaiveDate) -> NaiveDate {
    date.with_month(1)
        .and_then(|d| d.with_day(1))
        .unwrap_or(date)
}

fn start_of_year(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    start_of_day(tz, first_of_year(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::UTC;

    /// Wednesday 2024-05-15 12:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
    }

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap().timestamp()
    }

    #[test]
    fn today_starts_at_local_midnight() {
        let r = resolve("today", UTC, fixed_now()).unwrap();
        assert_eq!(r.start, ts(2024, 5, 15, 0, 0, 0));
        assert_eq!(r.end, None);
    }

    #[test]
    fn yesterday_is_a_closed_day() {
        let r = resolve("yesterday", UTC, fixed_now()).unwrap();
        assert_eq!(r.start, ts(2024, 5, 14, 0, 0, 0));
        assert_eq!(r.end, Some(ts(2024, 5, 14, 23, 59, 59)));
    }

    #[test]
    fn last_24_hours() {
        let r = resolve("24h", UTC, fixed_now()).unwrap();
        assert_eq!(r.start, ts(2024, 5, 14, 12, 0, 0));
        assert_eq!(r.end, None);
    }

    #[test]
    fn week_starts_monday() {
        // 2024-05-15 is a Wednesday; the week began Monday the 13th.
        let r = resolve("week", UTC, fixed_now()).unwrap();
        assert_eq!(r.start, ts(2024, 5, 13, 0, 0, 0));
    }

    #[test]
    fn lastweek_is_the_previous_monday_to_sunday() {
        let r = resolve("lastweek", UTC, fixed_now()).unwrap();
        assert_eq!(r.start, ts(2024, 5, 6, 0, 0, 0));
        assert_eq!(r.end, Some(ts(2024, 5, 12, 23, 59, 59)));
    }

    #[test]
    fn month_and_lastmonth() {
        let m = resolve("month", UTC, fixed_now()).unwrap();
        assert_eq!(m.start, ts(2024, 5, 1, 0, 0, 0));

        let lm = resolve("lastmonth", UTC, fixed_now()).unwrap();
        assert_eq!(lm.start, ts(2024, 4, 1, 0, 0, 0));
        assert_eq!(lm.end, Some(ts(2024, 4, 30, 23, 59, 59)));
    }

    #[test]
    fn year_and_lastyear() {
        let y = resolve("year", UTC, fixed_now()).unwrap();
        assert_eq!(y.start, ts(2024, 1, 1, 0, 0, 0));

        let ly = resolve("lastyear", UTC, fixed_now()).unwrap();
        assert_eq!(ly.start, ts(2023, 1, 1, 0, 0, 0));
        assert_eq!(ly.end, Some(ts(2023, 12, 31, 23, 59, 59)));
    }

    #[test]
    fn alltime_starts_at_epoch() {
        let r = resolve("alltime", UTC, fixed_now()).unwrap();
        assert_eq!(r.start, 0);
        assert_eq!(r.end, None);
    }

    #[test]
    fn custom_unix_range() {
        let r = resolve("1700000000,1700003600", UTC, fixed_now()).unwrap();
        assert_eq!(r.start, 1_700_000_000);
        assert_eq!(r.end, Some(1_700_003_600));
    }

    #[test]
    fn garbage_period_is_an_error() {
        assert!(resolve("fortnight", UTC, fixed_now()).is_err());
        assert!(resolve("123,abc", UTC, fixed_now()).is_err());
    }

    #[test]
    fn named_ranges_respect_the_reference_timezone() {
        let sydney = parse_timezone("Australia/Sydney").unwrap();
        let r = resolve("today", sydney, fixed_now()).unwrap();
        // Sydney is UTC+10 in May: local midnight is 14:00 UTC the previous day.
        assert_eq!(r.start, ts(2024, 5, 14, 14, 0, 0));
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
