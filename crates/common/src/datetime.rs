//! DateTime utilities.
//!
//! Wire records carry dates as strings. Outbound dates always use the
//! canonical `yyyy-MM-dd'T'HH:mm:ss.SSSZ` form; inbound dates may come from
//! producers in other languages, so parsing walks an ordered list of legacy
//! formats until one matches.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// chrono pattern for the canonical outbound format (`2013-03-08T02:26:05.234+0000`).
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

const ISO_8601_PATTERN: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const RUBY_DASH_PATTERN: &str = "%Y-%m-%d %H:%M:%S %z";
const RUBY_SLASH_PATTERN: &str = "%Y/%m/%d %H:%M:%S %z";

/// Error returned when a date matches none of the accepted formats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable date '{input}', tried formats: {tried}")]
pub struct DateParseError {
    /// The rejected input
    pub input: String,
    /// Comma-separated patterns that were attempted
    pub tried: String,
}

/// A textual date format accepted on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateFormat {
    /// `yyyy-MM-dd'T'HH:mm:ss.SSSZ`, e.g. `2013-03-07T21:26:05.234-0500`
    Iso8601,
    /// PHP `date()` style `EEE MMM dd HH:mm:ss zzz yyyy`, e.g. `Thu March 07 21:26:05 GMT-05:00 2013`
    Php,
    /// Ruby `Time#to_s` style `yyyy-MM-dd HH:mm:ss Z`
    RubyDash,
    /// Ruby style with slashes, `yyyy/MM/dd HH:mm:ss Z`
    RubySlash,
}

impl DateFormat {
    /// Formats tried on decode, in order.
    pub const LEGACY_ORDER: [DateFormat; 4] = [
        DateFormat::Iso8601,
        DateFormat::Php,
        DateFormat::RubyDash,
        DateFormat::RubySlash,
    ];

    /// Human-readable pattern, used in error messages.
    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormat::Iso8601 => "yyyy-MM-dd'T'HH:mm:ss.SSSZ",
            DateFormat::Php => "EEE MMM dd HH:mm:ss zzz yyyy",
            DateFormat::RubyDash => "yyyy-MM-dd HH:mm:ss Z",
            DateFormat::RubySlash => "yyyy/MM/dd HH:mm:ss Z",
        }
    }

    /// Parse `input` with this format only.
    pub fn parse(&self, input: &str) -> Option<DateTime<Utc>> {
        let input = input.trim();
        match self {
            DateFormat::Iso8601 => parse_fixed(input, ISO_8601_PATTERN),
            DateFormat::Php => parse_php(input),
            DateFormat::RubyDash => parse_fixed(input, RUBY_DASH_PATTERN),
            DateFormat::RubySlash => parse_fixed(input, RUBY_SLASH_PATTERN),
        }
    }
}

/// Get the current UTC time.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Format a DateTime in the canonical wire format (always `+0000`).
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use resque_common::datetime::format_datetime;
///
/// let dt = Utc.with_ymd_and_hms(2013, 3, 8, 2, 26, 5).unwrap();
/// assert_eq!(format_datetime(&dt), "2013-03-08T02:26:05.000+0000");
/// ```
pub fn format_datetime(datetime: &DateTime<Utc>) -> String {
    datetime.format(CANONICAL_FORMAT).to_string()
}

/// Parse a wire date, trying every legacy format in [`DateFormat::LEGACY_ORDER`].
///
/// # Examples
///
/// ```
/// use resque_common::datetime::parse_datetime;
///
/// let a = parse_datetime("2013-03-07 21:26:05 -0500").unwrap();
/// let b = parse_datetime("2013/03/08 02:26:05 +0000").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    parse_with(input, &DateFormat::LEGACY_ORDER)
}

/// Parse `input` with the given formats, first match wins.
pub fn parse_with(input: &str, formats: &[DateFormat]) -> Result<DateTime<Utc>, DateParseError> {
    formats
        .iter()
        .find_map(|format| format.parse(input))
        .ok_or_else(|| DateParseError {
            input: input.to_string(),
            tried: formats
                .iter()
                .map(DateFormat::pattern)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Milliseconds since the Unix epoch, the score unit of delayed queues.
pub fn to_epoch_millis(datetime: &DateTime<Utc>) -> i64 {
    datetime.timestamp_millis()
}

fn parse_fixed(input: &str, pattern: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(input, pattern)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `Thu March 07 21:26:05 GMT-05:00 2013`: the weekday is ignored, the month
/// may be short or long and the zone is resolved by [`parse_zone`].
fn parse_php(input: &str) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    let [_weekday, month, day, time, zone, year] = tokens.as_slice() else {
        return None;
    };

    let offset = parse_zone(zone)?;
    let local = NaiveDateTime::parse_from_str(
        &format!("{} {} {} {}", month, day, year, time),
        "%B %d %Y %H:%M:%S",
    )
    .ok()?;

    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Resolve a general time zone token: `GMT`, `UTC`, `GMT-05:00`, `+0530`,
/// or one of a few common abbreviations.
fn parse_zone(zone: &str) -> Option<FixedOffset> {
    let hours = |h: i32| FixedOffset::east_opt(h * 3600);
    match zone {
        "GMT" | "UTC" | "UT" | "Z" => return hours(0),
        "EST" => return hours(-5),
        "EDT" | "AST" => return hours(-4),
        "CST" => return hours(-6),
        "CDT" => return hours(-5),
        "MST" => return hours(-7),
        "MDT" => return hours(-6),
        "PST" => return hours(-8),
        "PDT" => return hours(-7),
        "CET" => return hours(1),
        "CEST" => return hours(2),
        _ => {}
    }

    let numeric = zone
        .strip_prefix("GMT")
        .or_else(|| zone.strip_prefix("UTC"))
        .unwrap_or(zone);
    parse_numeric_offset(numeric)
}

/// `+hh:mm`, `+hhmm` or `+hh`.
fn parse_numeric_offset(offset: &str) -> Option<FixedOffset> {
    let (sign, rest) = match offset.as_bytes().first().copied()? {
        b'+' => (1, &offset[1..]),
        b'-' => (-1, &offset[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (h, m) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if h > 23 || m > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 3, 8, 2, 26, 5).unwrap()
    }

    #[test]
    fn test_iso_with_offset_is_exact_to_the_millisecond() {
        let a = parse_datetime("2013-03-07T21:26:05.234-0500").unwrap();
        let b = parse_datetime("2013-03-08T02:26:05.234+0000").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.timestamp_subsec_millis(), 234);
        assert_eq!(a.with_nanosecond(0).unwrap(), expected());
    }

    #[test]
    fn test_php_format() {
        let dt = parse_datetime("Thu March 07 21:26:05 GMT-05:00 2013").unwrap();
        assert_eq!(dt, expected());

        let dt = parse_datetime("Fri Mar 08 02:26:05 UTC 2013").unwrap();
        assert_eq!(dt, expected());

        let dt = parse_datetime("Thu Mar 07 21:26:05 EST 2013").unwrap();
        assert_eq!(dt, expected());
    }

    #[test]
    fn test_ruby_formats() {
        assert_eq!(parse_datetime("2013-03-07 21:26:05 -0500").unwrap(), expected());
        assert_eq!(parse_datetime("2013/03/08 02:26:05 +0000").unwrap(), expected());
    }

    #[test]
    fn test_unparseable_date_lists_formats() {
        let err = parse_datetime("next tuesday").unwrap_err();
        assert_eq!(err.input, "next tuesday");
        assert!(err.tried.contains("EEE MMM dd HH:mm:ss zzz yyyy"));
    }

    #[test]
    fn test_parse_with_restricted_formats() {
        let result = parse_with("2013-03-07 21:26:05 -0500", &[DateFormat::Iso8601]);
        assert!(result.is_err());
    }

    #[test]
    fn test_format_datetime_is_canonical() {
        let dt = parse_datetime("2013-03-07T21:26:05.234-0500").unwrap();
        assert_eq!(format_datetime(&dt), "2013-03-08T02:26:05.234+0000");
        assert_eq!(parse_datetime(&format_datetime(&dt)).unwrap(), dt);
    }

    #[test]
    fn test_numeric_offsets() {
        assert_eq!(parse_numeric_offset("+05:30"), FixedOffset::east_opt(19800));
        assert_eq!(parse_numeric_offset("-0500"), FixedOffset::east_opt(-18000));
        assert_eq!(parse_numeric_offset("+2"), FixedOffset::east_opt(7200));
        assert_eq!(parse_numeric_offset("0500"), None);
        assert_eq!(parse_numeric_offset("+99:00"), None);
    }

    #[test]
    fn test_epoch_millis() {
        let dt = parse_datetime("2013-03-08T02:26:05.234+0000").unwrap();
        assert_eq!(to_epoch_millis(&dt), 1_362_709_565_234);
    }
}
