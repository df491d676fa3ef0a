//! Lenient per-field decoding of edit records
//!
//! Models routinely emit `"line": "12"` or `"reason": 42`. Each JSON value is
//! first classified into a [`Loose`] tag, then decoded into the field's
//! target type, so the coercions stay explicit and anything else becomes a
//! typed error naming the record index and field.

use super::ParseError;
use serde_json::{Map, Number, Value};

/// Shape of a raw field value
#[derive(Debug, Clone, Copy)]
pub(super) enum Loose<'a> {
    Absent,
    Null,
    Bool(bool),
    Number(&'a Number),
    Text(&'a str),
    Composite,
}

impl<'a> Loose<'a> {
    pub(super) fn of(record: &'a Map<String, Value>, field: &str) -> Self {
        match record.get(field) {
            None => Loose::Absent,
            Some(Value::Null) => Loose::Null,
            Some(Value::Bool(b)) => Loose::Bool(*b),
            Some(Value::Number(n)) => Loose::Number(n),
            Some(Value::String(s)) => Loose::Text(s),
            Some(Value::Array(_)) | Some(Value::Object(_)) => Loose::Composite,
        }
    }
}

/// Decodes the fields of one record, attributing errors to its index
pub(super) struct FieldDecoder<'a> {
    record: &'a Map<String, Value>,
    index: usize,
}

impl<'a> FieldDecoder<'a> {
    pub(super) fn new(record: &'a Map<String, Value>, index: usize) -> Self {
        Self { record, index }
    }

    fn invalid(&self, field: &'static str) -> ParseError {
        ParseError::InvalidFieldType {
            index: self.index,
            field,
        }
    }

    /// String field that must be present; scalars are stringified
    pub(super) fn required_string(&self, field: &'static str) -> Result<String, ParseError> {
        self.optional_string(field)?.ok_or(ParseError::MissingField {
            index: self.index,
            field,
        })
    }

    /// String field where null or absence means `None`
    pub(super) fn optional_string(&self, field: &'static str) -> Result<Option<String>, ParseError> {
        match Loose::of(self.record, field) {
            Loose::Absent | Loose::Null => Ok(None),
            Loose::Bool(b) => Ok(Some(b.to_string())),
            Loose::Number(n) => Ok(Some(n.to_string())),
            Loose::Text(s) => Ok(Some(s.to_string())),
            Loose::Composite => Err(self.invalid(field)),
        }
    }

    /// Whole-number field; numeric strings are parsed.
    ///
    /// Range checks (negative or zero lines) are left to the applier so a
    /// single off-by-one coordinate only fails its own change.
    pub(super) fn optional_number(&self, field: &'static str) -> Result<Option<i64>, ParseError> {
        match Loose::of(self.record, field) {
            Loose::Absent | Loose::Null => Ok(None),
            Loose::Number(n) => number_to_coordinate(n)
                .map(Some)
                .ok_or_else(|| self.invalid(field)),
            Loose::Text(s) => text_to_coordinate(s)
                .map(Some)
                .ok_or_else(|| self.invalid(field)),
            Loose::Bool(_) | Loose::Composite => Err(self.invalid(field)),
        }
    }
}

fn number_to_coordinate(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    n.as_f64().and_then(float_to_coordinate)
}

fn text_to_coordinate(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }
    s.parse::<f64>().ok().and_then(float_to_coordinate)
}

fn float_to_coordinate(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f <= i64::MAX as f64;
    if f.is_finite() && f.fract() == 0.0 && in_range {
        Some(f as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_string_coercion() {
        let r = record(json!({ "a": 42, "b": true, "c": null, "d": "x", "e": [1] }));
        let d = FieldDecoder::new(&r, 3);

        assert_eq!(d.required_string("a").unwrap(), "42");
        assert_eq!(d.required_string("b").unwrap(), "true");
        assert_eq!(d.optional_string("c").unwrap(), None);
        assert_eq!(d.optional_string("missing").unwrap(), None);
        assert_eq!(d.required_string("d").unwrap(), "x");
        assert!(matches!(
            d.required_string("c"),
            Err(ParseError::MissingField { index: 3, field: "c" })
        ));
        assert!(matches!(
            d.optional_string("e"),
            Err(ParseError::InvalidFieldType { index: 3, field: "e" })
        ));
    }

    #[test]
    fn test_number_coercion() {
        let r = record(json!({
            "int": 7, "float": 4.0, "text": " 12 ", "frac": 1.5,
            "neg": -1, "word": "ten", "flag": false, "null": null
        }));
        let d = FieldDecoder::new(&r, 0);

        assert_eq!(d.optional_number("int").unwrap(), Some(7));
        assert_eq!(d.optional_number("float").unwrap(), Some(4));
        assert_eq!(d.optional_number("text").unwrap(), Some(12));
        assert_eq!(d.optional_number("neg").unwrap(), Some(-1));
        assert_eq!(d.optional_number("null").unwrap(), None);
        for bad in ["frac", "word", "flag"] {
            assert!(d.optional_number(bad).is_err(), "{}", bad);
        }
    }
}
