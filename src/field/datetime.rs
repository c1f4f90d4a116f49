//! Date + time fields: ISO-8601 parsing normalized to naive UTC.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use regex::{Captures, Regex};

use crate::encoding::{ascii_repr, decode_escaped};
use crate::error::{FieldError, FieldValueError};
use crate::regexes;
use crate::types::Value;

static ISO_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(regexes::ISO_DATETIME).unwrap_or_else(|e| panic!("bad ISO date regex: {e}"))
});

/// Parse an ISO-8601 date + time and convert it to UTC.
///
/// Accepted date forms: `YYYY-MM-DD`, `YYYY-Www-D` and `YYYY-DDD` (dashes
/// optional). The time needs at least hours and minutes; seconds may carry
/// a fraction, truncated to microseconds. `24:00[:00]` means midnight of the
/// following day. Without an offset the time is taken as UTC.
pub fn parse_iso_datetime_to_utc(s: &str) -> Option<DateTime<Utc>> {
    let caps = ISO_DATETIME.captures(s.trim())?;
    let date = parse_date(&caps)?;

    let hour: u32 = number(&caps, "hour")?;
    let minute: u32 = number(&caps, "minute")?;
    let second: u32 = caps.name("second").map_or(Some(0), |m| m.as_str().parse().ok())?;
    let micro = caps
        .name("secondfraction")
        .map_or(Some(0), |m| fraction_micros(m.as_str()))?;

    let naive = if hour == 24 {
        if minute != 0 || second != 0 || micro != 0 {
            return None;
        }
        date.succ_opt()?.and_time(NaiveTime::MIN)
    } else {
        date.and_time(NaiveTime::from_hms_micro_opt(hour, minute, second, micro)?)
    };

    let offset = parse_offset(&caps)?;
    let utc = naive.checked_sub_signed(offset)?;
    Some(utc.and_utc())
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, name: &str) -> Option<T> {
    caps.name(name)?.as_str().parse().ok()
}

fn parse_date(caps: &Captures<'_>) -> Option<NaiveDate> {
    let year: i32 = number(caps, "year")?;
    if caps.name("month").is_some() {
        NaiveDate::from_ymd_opt(year, number(caps, "month")?, number(caps, "day")?)
    } else if caps.name("isoweek").is_some() {
        let weekday = match number::<u32>(caps, "isoweekday")? {
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            6 => Weekday::Sat,
            7 => Weekday::Sun,
            _ => return None,
        };
        NaiveDate::from_isoywd_opt(year, number(caps, "isoweek")?, weekday)
    } else {
        NaiveDate::from_yo_opt(year, number(caps, "ordinalday")?)
    }
}

/// Fraction digits truncated (or zero-padded) to microseconds.
fn fraction_micros(digits: &str) -> Option<u32> {
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut padded: String = digits.chars().take(6).collect();
    while padded.len() < 6 {
        padded.push('0');
    }
    padded.parse().ok()
}

/// The offset east of UTC; zero when absent or `Z`.
fn parse_offset(caps: &Captures<'_>) -> Option<Duration> {
    let Some(tzhour) = caps.name("tzhour") else {
        return Some(Duration::zero());
    };
    let tzhour = tzhour.as_str();
    let negative = tzhour.starts_with('-');
    let hours: i64 = tzhour[1..].parse().ok()?;
    let minutes: i64 = caps.name("tzminute").map_or(Some(0), |m| m.as_str().parse().ok())?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    let offset = Duration::minutes(hours * 60 + minutes);
    Some(if negative { -offset } else { offset })
}

fn invalid(value: &Value) -> FieldError {
    FieldValueError::new(format!(
        "\"{}\" is not a valid date + time specification",
        ascii_repr(value)
    ))
    .into()
}

fn parse_text(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Str(s) => parse_iso_datetime_to_utc(s),
        Value::Bytes(b) => parse_iso_datetime_to_utc(&decode_escaped(b)),
        _ => None,
    }
}

pub(crate) fn clean_param(value: &Value) -> Result<DateTime<Utc>, FieldError> {
    if !value.is_text() {
        return Err(FieldError::type_error(format!(
            "{} is not a str/unicode instance",
            ascii_repr(value)
        )));
    }
    parse_text(value).ok_or_else(|| invalid(value))
}

pub(crate) fn clean_result(value: &Value) -> Result<DateTime<Utc>, FieldError> {
    match value {
        Value::DateTime(dt) => Ok(*dt),
        Value::ZonedDateTime(dt) => Ok(dt.with_timezone(&Utc)),
        Value::NaiveDateTime(dt) => Ok(naive_as_utc(*dt)),
        Value::Str(_) | Value::Bytes(_) => parse_text(value).ok_or_else(|| invalid(value)),
        other => Err(FieldError::type_error(format!(
            "{} is neither a str/unicode instance nor a datetime",
            ascii_repr(other)
        ))),
    }
}

fn naive_as_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    dt.and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().unwrap()
    }

    #[test]
    fn calendar_dates_with_offsets() {
        assert_eq!(
            parse_iso_datetime_to_utc("2014-04-01 01:07:42+02:00"),
            Some(utc(2014, 3, 31, 23, 7, 42))
        );
        assert_eq!(
            parse_iso_datetime_to_utc("2014-04-01T01:07Z"),
            Some(utc(2014, 4, 1, 1, 7, 0))
        );
        assert_eq!(
            parse_iso_datetime_to_utc("20140401T0107-0130"),
            Some(utc(2014, 4, 1, 2, 37, 0))
        );
    }

    #[test]
    fn week_and_ordinal_dates() {
        // ISO week 18 of 2015 starts on Monday, April 27
        assert_eq!(
            parse_iso_datetime_to_utc("2015-W18-6T12:00Z"),
            Some(utc(2015, 5, 2, 12, 0, 0))
        );
        assert_eq!(
            parse_iso_datetime_to_utc("2015-122T12:00"),
            Some(utc(2015, 5, 2, 12, 0, 0))
        );
    }

    #[test]
    fn hour_24_and_fractions() {
        assert_eq!(
            parse_iso_datetime_to_utc("2015-12-31T24:00:00"),
            Some(utc(2016, 1, 1, 0, 0, 0))
        );
        assert_eq!(parse_iso_datetime_to_utc("2015-12-31T24:00:01"), None);
        let dt = parse_iso_datetime_to_utc("2015-05-02T12:00:00.1234567").unwrap();
        assert_eq!(dt.timestamp_subsec_micros(), 123_456);
    }

    #[test]
    fn invalid_dates() {
        assert_eq!(parse_iso_datetime_to_utc("2015-02-29T12:00"), None);
        assert_eq!(parse_iso_datetime_to_utc("2015-05-02"), None);
        assert_eq!(parse_iso_datetime_to_utc("2015-05-02T12:60"), None);
        assert_eq!(parse_iso_datetime_to_utc("2015-05-02T12:00+24:00"), None);
    }

    #[test]
    fn non_ascii_digits_rejected() {
        // U+0665 and U+0661 are ARABIC-INDIC DIGIT FIVE and ONE
        assert_eq!(parse_iso_datetime_to_utc("2015-05-02T12:00:00.\u{0665}"), None);
        assert_eq!(parse_iso_datetime_to_utc("\u{0662}015-05-02T12:00:00"), None);
        assert_eq!(parse_iso_datetime_to_utc("2015-05-02T12:00:0\u{0661}"), None);
        assert!(clean_param(&Value::from("2015-05-02T12:00:00.\u{0665}")).is_err());
        assert_eq!(fraction_micros("\u{0665}"), None);
        assert_eq!(fraction_micros("5"), Some(500_000));
    }

    #[test]
    fn result_side_accepts_datetimes() {
        let zoned = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2015, 5, 2, 13, 0, 0)
            .single()
            .unwrap();
        assert_eq!(
            clean_result(&Value::ZonedDateTime(zoned)).unwrap(),
            utc(2015, 5, 2, 12, 0, 0)
        );
        let naive = utc(2015, 5, 2, 12, 0, 0).naive_utc();
        assert_eq!(
            clean_result(&Value::NaiveDateTime(naive)).unwrap(),
            utc(2015, 5, 2, 12, 0, 0)
        );
        assert!(matches!(
            clean_result(&Value::Int(5)),
            Err(FieldError::Type { .. })
        ));
    }

    #[test]
    fn param_error_message() {
        assert_eq!(
            clean_param(&Value::from("yesterday")).unwrap_err().to_string(),
            "\"yesterday\" is not a valid date + time specification"
        );
    }
}
