//! Date and date-range parsing for `show --date`.
//!
//! Accepts `YYYY-MM-DD` or `YYYY-MM-DD:YYYY-MM-DD`; both ends are inclusive.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SlackError};

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

/// Inclusive Unix-second bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub oldest: i64,
    pub latest: i64,
}

/// Parse a `--date` argument. An empty string means no range.
pub fn parse_date_range(input: &str) -> Result<Option<TimeRange>> {
    let raw = input.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let parts: Vec<&str> = raw.split(':').collect();
    let (start, end) = match parts.as_slice() {
        [single] => {
            let date = parse_date(raw, single)?;
            (date, date)
        }
        [start, end] => (parse_date(raw, start)?, parse_date(raw, end)?),
        _ => {
            return Err(invalid(
                raw,
                "use YYYY-MM-DD or YYYY-MM-DD:YYYY-MM-DD",
            ))
        }
    };

    Ok(Some(TimeRange {
        oldest: midnight(start),
        latest: midnight(end + Duration::days(1)) - 1,
    }))
}

fn parse_date(raw: &str, token: &str) -> Result<NaiveDate> {
    let token = token.trim();
    if !DATE_RE.is_match(token) {
        return Err(invalid(raw, &format!("{token:?} is not YYYY-MM-DD")));
    }
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .map_err(|e| invalid(raw, &format!("{token:?}: {e}")))
}

fn midnight(date: NaiveDate) -> i64 {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .timestamp()
}

fn invalid(input: &str, reason: &str) -> SlackError {
    SlackError::InvalidDate {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
