//! WCF (`/Date(ms)/`) timestamp parsing.
//!
//! The trading API serializes dates as `\/Date(1343067900000)\/`, optionally
//! with a `+hhmm`/`-hhmm` suffix. The milliseconds are already UTC; the
//! suffix only records the server's local offset and is ignored.

use chrono::{DateTime, Utc};

/// Parse a WCF date, a bare millisecond count wrapped in `Date(...)`, or a
/// plain epoch-seconds number (the form the REST fixup rewrites dates to).
#[must_use]
pub fn parse_wcf_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');

    if let Some(inner) = extract_date_body(trimmed) {
        let millis = parse_millis(inner)?;
        return DateTime::from_timestamp_millis(millis);
    }

    let seconds: f64 = trimmed.parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let millis = (seconds * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis)
}

/// Returns the text between `Date(` and `)`, accepting escaped slashes.
fn extract_date_body(raw: &str) -> Option<&str> {
    let unescaped = raw
        .strip_prefix("\\/")
        .or_else(|| raw.strip_prefix('/'))
        .unwrap_or(raw);
    let rest = unescaped.strip_prefix("Date(")?;
    let end = rest.find(')')?;
    Some(&rest[..end])
}

fn parse_millis(body: &str) -> Option<i64> {
    // A leading '-' is a pre-epoch timestamp, not an offset.
    let (sign, digits) = body
        .strip_prefix('-')
        .map_or((1, body), |stripped| (-1, stripped));
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let offset = &digits[end..];
    if !offset.is_empty() && !is_offset_suffix(offset) {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|ms| ms * sign)
}

fn is_offset_suffix(suffix: &str) -> bool {
    let mut chars = suffix.chars();
    matches!(chars.next(), Some('+' | '-')) && chars.all(|c| c.is_ascii_digit())
}
