//! Loose time specifications for time-bounded selectors.

use crate::errors::{AscriptError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

static TIME_SPEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^ *(\d+)(?:-(\d+)(?:-(\d+)(?: +(\d+):(\d+)(?::(\d+))?)?)?)? *(?:([+-])(\d{2})(\d{2}))? *$",
    )
    .expect("valid time spec regex")
});

/// Parse `YYYY[-MM[-DD[ HH:MM[:SS]]]] [±ZZZZ]`.
///
/// Missing date parts default to 1, missing time parts to 0, and a missing
/// offset to UTC.
///
/// # Errors
///
/// `InvalidTimeSpec` when the text does not follow the pattern or names a
/// date or time that does not exist.
pub fn parse_time_spec(spec: &str) -> Result<DateTime<FixedOffset>> {
    let invalid = || AscriptError::InvalidTimeSpec {
        spec: spec.to_string(),
    };
    let caps = TIME_SPEC.captures(spec).ok_or_else(invalid)?;
    let number = |i: usize, default: u32| -> Result<u32> {
        caps.get(i)
            .map_or(Ok(default), |m| m.as_str().parse().map_err(|_| invalid()))
    };

    let year: i32 = caps[1].parse().map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(year, number(2, 1)?, number(3, 1)?).ok_or_else(invalid)?;
    let naive = date
        .and_hms_opt(number(4, 0)?, number(5, 0)?, number(6, 0)?)
        .ok_or_else(invalid)?;

    let offset_seconds = match caps.get(7) {
        Some(sign) => {
            let seconds = (number(8, 0)? * 3600 + number(9, 0)? * 60) as i32;
            if sign.as_str() == "-" {
                -seconds
            } else {
                seconds
            }
        }
        None => 0,
    };
    let offset = FixedOffset::east_opt(offset_seconds).ok_or_else(invalid)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_granularities() {
        let year = parse_time_spec("2024").unwrap();
        assert_eq!((year.year(), year.month(), year.day()), (2024, 1, 1));
        assert_eq!(year.offset().local_minus_utc(), 0);

        let month = parse_time_spec("2024-03").unwrap();
        assert_eq!((month.month(), month.day()), (3, 1));

        let minute = parse_time_spec("2024-03-05 14:30").unwrap();
        assert_eq!((minute.hour(), minute.minute(), minute.second()), (14, 30, 0));

        let second = parse_time_spec("2024-03-05 14:30:15+0200").unwrap();
        assert_eq!(second.second(), 15);
        assert_eq!(second.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_offset_shifts_instant() {
        let utc = parse_time_spec("2024-03-05 12:00").unwrap();
        let east = parse_time_spec("2024-03-05 14:00 +0200").unwrap();
        assert_eq!(utc, east);
        assert!(parse_time_spec("2024-03-05 12:00 -0100").unwrap() > utc);
    }

    #[test]
    fn test_invalid_specs() {
        for spec in ["", "yesterday", "2024-13", "2024-02-30", "2024-01-01 25:00", "2024/01/01"] {
            assert!(
                matches!(parse_time_spec(spec), Err(AscriptError::InvalidTimeSpec { .. })),
                "{spec:?} should be rejected"
            );
        }
    }
}
