//! Field Schemas and Row Decoding
//!
//! Push updates arrive as positional rows of optional strings. A
//! [`FieldSchema`] fixes the column order and the type of each column for a
//! category; [`decode_row`] turns a raw row into a named [`Record`].
//!
//! Decoding rules:
//! - an absent column decodes to an absent field, whatever its kind
//! - an empty string is kept for text columns and is malformed for every
//!   other kind
//! - a malformed value fails with [`DecodeError::InvalidValue`] naming the
//!   field and the raw text
//! - a row shorter than the schema fails with [`DecodeError::ShortRow`];
//!   extra trailing columns are ignored

mod wcf;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

pub use wcf::parse_wcf_date;

// =============================================================================
// Errors
// =============================================================================

/// Failure decoding a wire row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Row has fewer columns than the schema.
    #[error("row has {actual} columns, schema expects {expected}")]
    ShortRow {
        /// Columns in the schema.
        expected: usize,
        /// Columns received.
        actual: usize,
    },

    /// A column could not be coerced to its declared kind.
    #[error("field {field}: cannot decode {raw:?} as {kind}")]
    InvalidValue {
        /// Schema field name.
        field: &'static str,
        /// Raw wire text.
        raw: String,
        /// Declared kind.
        kind: FieldKind,
    },
}

// =============================================================================
// Field Kinds
// =============================================================================

/// Wire type of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Signed integer.
    Int,
    /// Floating point.
    Float,
    /// Exact decimal (money amounts and prices).
    Decimal,
    /// Unicode text, passed through unchanged.
    Text,
    /// Boolean (`true`/`false`, `1`/`0`).
    Bool,
    /// WCF date or epoch seconds.
    Timestamp,
}

impl FieldKind {
    /// Label used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Timestamp => "timestamp",
        }
    }

    /// Coerce one non-null raw value. Absence is signalled by a null
    /// column, never by an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidValue`] if the text is malformed for
    /// this kind, including an empty string for any kind but text.
    pub fn decode(self, field: &'static str, raw: &str) -> Result<FieldValue, DecodeError> {
        if self == Self::Text {
            return Ok(FieldValue::Text(raw.to_owned()));
        }

        let text = raw.trim();
        let value = match self {
            Self::Int => text.parse().ok().map(FieldValue::Int),
            Self::Float => text.parse().ok().map(FieldValue::Float),
            Self::Decimal => Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .ok()
                .map(FieldValue::Decimal),
            Self::Bool => parse_bool(text).map(FieldValue::Bool),
            Self::Timestamp => parse_wcf_date(text).map(FieldValue::Timestamp),
            Self::Text => Some(FieldValue::Text(text.to_owned())),
        };

        value.ok_or_else(|| DecodeError::InvalidValue {
            field,
            raw: raw.to_owned(),
            kind: self,
        })
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Some(false)
    } else {
        None
    }
}

// =============================================================================
// Schema
// =============================================================================

/// One schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name as the server names it.
    pub name: &'static str,
    /// Declared kind.
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Create a column spec.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Ordered columns of a category. Order is the wire order.
pub type FieldSchema = [FieldSpec];

/// Field names of a schema, in wire order, as sent in a table request.
#[must_use]
pub fn field_names(schema: &FieldSchema) -> Vec<&'static str> {
    schema.iter().map(|spec| spec.name).collect()
}

// =============================================================================
// Values and Records
// =============================================================================

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Exact decimal.
    Decimal(Decimal),
    /// Text.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
}

/// A decoded row: every schema field, in schema order, possibly absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(&'static str, Option<FieldValue>)>,
}

impl Record {
    /// Look up a field by name. `None` if absent or not in the schema.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| value.as_ref())
    }

    /// True if the schema has the field and it carries a value.
    #[must_use]
    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Integer field.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer field that must be non-negative (identifiers).
    #[must_use]
    pub fn uint(&self, name: &str) -> Option<u64> {
        self.int(name).and_then(|v| u64::try_from(v).ok())
    }

    /// Float field.
    #[must_use]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Decimal field.
    #[must_use]
    pub fn decimal(&self, name: &str) -> Option<Decimal> {
        match self.get(name)? {
            FieldValue::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    /// Text field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean field.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Timestamp field.
    #[must_use]
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.get(name)? {
            FieldValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Iterate `(name, value)` in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&FieldValue>)> {
        self.fields.iter().map(|(name, value)| (*name, value.as_ref()))
    }

    /// Number of schema fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True for a record decoded against an empty schema.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// =============================================================================
// Decoder
// =============================================================================

/// Decode a positional row against a schema.
///
/// # Errors
///
/// Returns [`DecodeError::ShortRow`] if the row has fewer columns than the
/// schema, or [`DecodeError::InvalidValue`] for the first malformed column.
pub fn decode_row(schema: &FieldSchema, row: &[Option<String>]) -> Result<Record, DecodeError> {
    if row.len() < schema.len() {
        return Err(DecodeError::ShortRow {
            expected: schema.len(),
            actual: row.len(),
        });
    }

    let mut fields = Vec::with_capacity(schema.len());
    for (spec, raw) in schema.iter().zip(row) {
        let value = match raw {
            Some(raw) => Some(spec.kind.decode(spec.name, raw)?),
            None => None,
        };
        fields.push((spec.name, value));
    }

    Ok(Record { fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn dec(num: i64, scale: u32) -> Decimal {
        Decimal::new(num, scale)
    }

    const AB: &[FieldSpec] = &[
        FieldSpec::new("A", FieldKind::Float),
        FieldSpec::new("B", FieldKind::Text),
    ];

    fn row(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_owned)).collect()
    }

    #[test]
    fn decodes_float_and_text() {
        let record = decode_row(AB, &row(&[Some("1.5"), Some("x")])).unwrap();
        assert_eq!(record.float("A"), Some(1.5));
        assert_eq!(record.text("B"), Some("x"));
    }

    #[test]
    fn null_column_is_absent() {
        let record = decode_row(AB, &row(&[Some("1.5"), None])).unwrap();
        assert_eq!(record.float("A"), Some(1.5));
        assert_eq!(record.get("B"), None);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn short_row_fails() {
        let err = decode_row(AB, &[]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::ShortRow {
                expected: 2,
                actual: 0
            }
        );
    }

    #[test]
    fn extra_columns_are_ignored() {
        let record = decode_row(AB, &row(&[Some("2"), Some("y"), Some("extra")])).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.float("A"), Some(2.0));
    }

    #[test]
    fn malformed_value_names_field_and_raw_text() {
        let err = decode_row(AB, &row(&[Some("abc"), Some("x")])).unwrap_err();
        match err {
            DecodeError::InvalidValue { field, raw, kind } => {
                assert_eq!(field, "A");
                assert_eq!(raw, "abc");
                assert_eq!(kind, FieldKind::Float);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_numeric_column_fails_the_row() {
        let err = decode_row(AB, &row(&[Some(""), Some("")])).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidValue { field: "A", kind: FieldKind::Float, .. }
        ));
    }

    #[test_case(FieldKind::Int, "42", FieldValue::Int(42) ; "int")]
    #[test_case(FieldKind::Int, " -7 ", FieldValue::Int(-7) ; "int trimmed")]
    #[test_case(FieldKind::Float, "0.25", FieldValue::Float(0.25) ; "float")]
    #[test_case(FieldKind::Decimal, "1.2345", FieldValue::Decimal(dec(12345, 4)) ; "decimal")]
    #[test_case(FieldKind::Decimal, "1.5E-3", FieldValue::Decimal(dec(15, 4)) ; "decimal scientific")]
    #[test_case(FieldKind::Bool, "True", FieldValue::Bool(true) ; "bool word")]
    #[test_case(FieldKind::Bool, "0", FieldValue::Bool(false) ; "bool digit")]
    #[test_case(FieldKind::Text, " padded ", FieldValue::Text(" padded ".to_owned()) ; "text untouched")]
    fn decodes_kind(kind: FieldKind, raw: &str, expected: FieldValue) {
        assert_eq!(kind.decode("F", raw).unwrap(), expected);
    }

    #[test_case(FieldKind::Int ; "int")]
    #[test_case(FieldKind::Float ; "float")]
    #[test_case(FieldKind::Decimal ; "decimal")]
    #[test_case(FieldKind::Bool ; "bool")]
    #[test_case(FieldKind::Timestamp ; "timestamp")]
    fn empty_string_is_malformed(kind: FieldKind) {
        for raw in ["", "  "] {
            match kind.decode("F", raw).unwrap_err() {
                DecodeError::InvalidValue { field, kind: reported, .. } => {
                    assert_eq!(field, "F");
                    assert_eq!(reported, kind);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn empty_text_is_kept() {
        assert_eq!(
            FieldKind::Text.decode("F", "").unwrap(),
            FieldValue::Text(String::new())
        );
    }

    #[test]
    fn timestamp_column() {
        let value = FieldKind::Timestamp
            .decode("TickDate", r"\/Date(1343067900000)\/")
            .unwrap();
        match value {
            FieldValue::Timestamp(ts) => assert_eq!(ts.timestamp(), 1_343_067_900),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn typed_getter_rejects_wrong_kind() {
        let record = decode_row(AB, &row(&[Some("1.5"), Some("x")])).unwrap();
        assert_eq!(record.int("A"), None);
        assert_eq!(record.text("missing"), None);
    }
}
