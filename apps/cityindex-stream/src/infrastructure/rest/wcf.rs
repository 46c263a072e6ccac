//! WCF date rewriting.
//!
//! The trading API serializes dates as `"\/Date(1343067900000)\/"`, with an
//! optional `+hhmm`/`-hhmm` suffix. Bodies are rewritten so each such string
//! becomes a bare JSON number of seconds since the epoch (`1343067900.0`)
//! before parsing. The offset is informational and ignored.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

// The pattern is a literal; the tests below compile it.
#[allow(clippy::expect_used)]
static WCF_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']\\/Date\((-?\d+)(?:[+-]\d{4})?\)\\/["']"#).expect("WCF date pattern is valid")
});

/// Replace every quoted WCF date in `body` with epoch seconds.
#[must_use]
pub fn rewrite_wcf_dates(body: &str) -> Cow<'_, str> {
    WCF_DATE.replace_all(body, |caps: &Captures<'_>| {
        caps[1]
            .parse::<i64>()
            .map_or_else(|_| caps[0].to_string(), millis_to_seconds)
    })
}

#[allow(clippy::cast_precision_loss)]
fn millis_to_seconds(millis: i64) -> String {
    format!("{:?}", millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(r#"{"d":"\/Date(1343067900000)\/"}"#, r#"{"d":1343067900.0}"# ; "plain")]
    #[test_case(r#"{"d":"\/Date(1343067900500+0100)\/"}"#, r#"{"d":1343067900.5}"# ; "positive offset")]
    #[test_case(r#"{"d":"\/Date(1343067900000-0500)\/"}"#, r#"{"d":1343067900.0}"# ; "negative offset")]
    #[test_case(r#"{"d":"\/Date(-86400000)\/"}"#, r#"{"d":-86400.0}"# ; "before epoch")]
    fn rewrites_dates(input: &str, expected: &str) {
        assert_eq!(rewrite_wcf_dates(input), expected);
    }

    #[test]
    fn leaves_other_strings_alone() {
        let body = r#"{"Name":"Date(5)","Id":3}"#;
        assert!(matches!(rewrite_wcf_dates(body), Cow::Borrowed(_)));
    }

    #[test]
    fn rewritten_body_parses() {
        let body = r#"[{"TickDate":"\/Date(1000)\/"},{"TickDate":"\/Date(2000)\/"}]"#;
        let parsed: serde_json::Value = serde_json::from_str(&rewrite_wcf_dates(body)).unwrap();
        assert_eq!(parsed[1]["TickDate"], serde_json::json!(2.0));
    }
}
