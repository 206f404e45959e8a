//! Resolves the bare `hhmmss.s` time of a sentence into an absolute UTC
//! instant.
//!
//! The sentence carries no date, so the date is taken from the observer's
//! clock. A sentence stamped shortly before midnight that is read after the
//! clock has already passed midnight belongs to the previous day: when the
//! clock's hour is below `ROLLOVER_NOW_HOUR` and the sentence's hour is above
//! `ROLLOVER_SENTENCE_HOUR`, one day is subtracted. A receiver that was
//! disconnected across several midnights, or a backlog older than about two
//! hours, will still be misdated.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use std::str::FromStr;

use crate::err::ParseError;

const ROLLOVER_NOW_HOUR: u32 = 2;
const ROLLOVER_SENTENCE_HOUR: u32 = 21;

/// Offset of the single fractional digit, after the separator at offset 6.
const FRACTION_OFFSET: usize = 7;
const MICROS_PER_FRACTION_DIGIT: u32 = 10_000;

/// Resolves `field` against the current instant `now`.
///
/// Only one fractional digit is read; any further digits are ignored.
pub fn resolve(field: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ParseError> {
    let hour = digits(field, 0..2)?;
    let minute = digits(field, 2..4)?;
    let second = digits(field, 4..6)?;
    let micro = if field.len() > 6 {
        digits(field, FRACTION_OFFSET..FRACTION_OFFSET + 1)? * MICROS_PER_FRACTION_DIGIT
    } else {
        0
    };

    let date = anchor_date(now, hour).ok_or_else(|| malformed(field))?;
    let naive = date
        .and_hms_micro_opt(hour, minute, second, micro)
        .ok_or_else(|| malformed(field))?;

    Ok(Utc.from_utc_datetime(&naive))
}

fn anchor_date(now: DateTime<Utc>, hour: u32) -> Option<NaiveDate> {
    let today = now.date_naive();
    if now.hour() < ROLLOVER_NOW_HOUR && hour > ROLLOVER_SENTENCE_HOUR {
        today.pred_opt()
    } else {
        Some(today)
    }
}

fn digits(field: &str, range: std::ops::Range<usize>) -> Result<u32, ParseError> {
    let part = field.get(range).ok_or_else(|| malformed(field))?;
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(field));
    }
    u32::from_str(part).map_err(|_| malformed(field))
}

#[inline]
fn malformed(field: &str) -> ParseError {
    ParseError::MalformedTimestamp(field.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn anchors_to_todays_date() {
        let now = at(2024, 1, 2, 10, 5, 0);
        assert_eq!(resolve("100000", now).unwrap(), at(2024, 1, 2, 10, 0, 0));
    }

    #[test]
    fn rolls_back_a_day_just_after_midnight() {
        let now = at(2024, 1, 2, 0, 30, 0);
        assert_eq!(resolve("235959", now).unwrap(), at(2024, 1, 1, 23, 59, 59));
    }

    #[test]
    fn rollover_crosses_month_and_year() {
        let now = at(2024, 1, 1, 1, 59, 0);
        assert_eq!(resolve("220000", now).unwrap(), at(2023, 12, 31, 22, 0, 0));
    }

    #[test]
    fn no_rollover_at_boundaries() {
        // sentence hour 21 is not "late"
        let now = at(2024, 1, 2, 0, 30, 0);
        assert_eq!(resolve("215959", now).unwrap(), at(2024, 1, 2, 21, 59, 59));
        // clock hour 2 is no longer "early"
        let now = at(2024, 1, 2, 2, 0, 0);
        assert_eq!(resolve("235959", now).unwrap(), at(2024, 1, 2, 23, 59, 59));
    }

    #[test]
    fn single_fraction_digit_is_read() {
        let now = at(2024, 1, 2, 12, 0, 0);
        let ts = resolve("123519.5", now).unwrap();
        assert_eq!(ts.nanosecond(), 50_000_000);
        let ts = resolve("123519.75", now).unwrap();
        assert_eq!(ts.nanosecond(), 70_000_000);
        let ts = resolve("123519", now).unwrap();
        assert_eq!(ts.nanosecond(), 0);
    }

    #[test]
    fn malformed_times_fail() {
        let now = at(2024, 1, 2, 12, 0, 0);
        assert_matches!(resolve("", now), Err(ParseError::MalformedTimestamp(_)));
        assert_matches!(resolve("      ", now), Err(ParseError::MalformedTimestamp(_)));
        assert_matches!(resolve("12a519", now), Err(ParseError::MalformedTimestamp(_)));
        assert_matches!(resolve("1235", now), Err(ParseError::MalformedTimestamp(_)));
        assert_matches!(resolve("123519.", now), Err(ParseError::MalformedTimestamp(_)));
        assert_matches!(resolve("-12519", now), Err(ParseError::MalformedTimestamp(_)));
        assert_matches!(resolve("256000", now), Err(ParseError::MalformedTimestamp(_)));
    }
}
