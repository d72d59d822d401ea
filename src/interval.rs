//! Interval string parsing
//!
//! Parses relative time offsets like `"1min"`, `"7d"`, `"-30s"` into signed
//! seconds. The sign prefix is optional; when it is missing, `default_sign`
//! decides the direction (`timeShift` defaults shifts into the past,
//! bucketing functions default to positive widths).

use crate::error::ErrorKind;

/// Parse an interval literal into signed seconds.
///
/// `default_sign` must be `-1` or `1` and applies only when the literal has
/// no explicit sign. Unit suffixes are case-insensitive and accept the
/// shortest unambiguous prefix of second, minute, hour, day, week, month
/// (30 days), and year (365 days).
///
/// # Example
///
/// ```rust
/// use graphfn::interval::parse_interval;
///
/// assert_eq!(parse_interval("1min", 1), Ok(60));
/// assert_eq!(parse_interval("1h", -1), Ok(-3600));
/// assert_eq!(parse_interval("+30s", -1), Ok(30));
/// ```
pub fn parse_interval(s: &str, default_sign: i32) -> Result<i32, ErrorKind> {
    let mut sign = default_sign;
    let mut rest = s;

    match s.as_bytes().first() {
        Some(b'-') => {
            sign = -1;
            rest = &s[1..];
        }
        Some(b'+') => {
            sign = 1;
            rest = &s[1..];
        }
        _ => {}
    }

    let digits_end = rest
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, unit) = rest.split_at(digits_end);

    let magnitude: i32 = digits.parse().map_err(|_| ErrorKind::BadType)?;
    let unit_seconds = unit_seconds(unit).ok_or(ErrorKind::BadType)?;

    Ok(sign * magnitude * unit_seconds)
}

fn unit_seconds(unit: &str) -> Option<i32> {
    match unit.to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => Some(1),
        "min" | "mins" | "minute" | "minutes" => Some(60),
        "h" | "hour" | "hours" => Some(3600),
        "d" | "day" | "days" => Some(86400),
        "w" | "week" | "weeks" => Some(7 * 86400),
        "mon" | "month" | "months" => Some(30 * 86400),
        "y" | "year" | "years" => Some(365 * 86400),
        _ => None,
    }
}
