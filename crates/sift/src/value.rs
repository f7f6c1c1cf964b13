//! Scalar semantics over JSON values.
//!
//! Records cross the path boundary as [`serde_json::Value`]. This module
//! defines how two such values are compared: strict equality for `EQ`/`NEQ`
//! and bucket keys, a partial ordering for the order operators, and a
//! total ordering for sorting.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::calendar;

/// Returns `true` for values that count as "no value": `null` and `""`.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Short type name, used in error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Returns `true` if the value can be used as a comparison operand.
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Strict equality: no type coercion, no case folding.
///
/// Numbers compare by numeric value, so `2` equals `2.0`. Everything else
/// uses structural equality.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Compares two numbers, handling mixed integer and float representations.
pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return Some(a.cmp(&b));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Native ordering between two scalars.
///
/// - numbers compare numerically
/// - strings compare by instant when both parse as timestamps, otherwise
///   lexicographically
/// - booleans order `false < true`
/// - a number against a date string compares as epoch milliseconds
///
/// Any other pairing is incomparable and returns `None`.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(x), Value::String(y)) => {
            match (calendar::parse_instant(a), calendar::parse_instant(b)) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            let x = calendar::parse_instant(a)?;
            let y = calendar::parse_instant(b)?;
            Some(x.cmp(&y))
        }
        _ => None,
    }
}

/// Total ordering used for sorting.
///
/// Values are ranked by kind first:
///
/// ```text
/// null < boolean < number < date string < other string < list < object
/// ```
///
/// then compared within their kind. Date strings order by instant with
/// their text as tie-break; lists and objects order by their JSON text.
pub fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    let (ka, kb) = (SortKind::of(a), SortKind::of(b));
    ka.rank().cmp(&kb.rank()).then_with(|| match (ka, kb) {
        (SortKind::Bool(x), SortKind::Bool(y)) => x.cmp(&y),
        (SortKind::Number(x), SortKind::Number(y)) => compare_number_keys(x, y),
        (SortKind::Date(x, s), SortKind::Date(y, t)) => x.cmp(&y).then_with(|| s.cmp(t)),
        (SortKind::Text(s), SortKind::Text(t)) => s.cmp(t),
        (SortKind::Null, SortKind::Null) => Ordering::Equal,
        _ => a.to_string().cmp(&b.to_string()),
    })
}

enum SortKind<'a> {
    Null,
    Bool(bool),
    Number(&'a Number),
    Date(chrono::DateTime<chrono::Utc>, &'a str),
    Text(&'a str),
    Composite(u8),
}

impl<'a> SortKind<'a> {
    fn of(value: &'a Value) -> Self {
        match value {
            Value::Null => SortKind::Null,
            Value::Bool(b) => SortKind::Bool(*b),
            Value::Number(n) => SortKind::Number(n),
            Value::String(s) => match calendar::parse_instant(value) {
                Some(instant) => SortKind::Date(instant, s),
                None => SortKind::Text(s),
            },
            Value::Array(_) => SortKind::Composite(5),
            Value::Object(_) => SortKind::Composite(6),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKind::Null => 0,
            SortKind::Bool(_) => 1,
            SortKind::Number(_) => 2,
            SortKind::Date(..) => 3,
            SortKind::Text(_) => 4,
            SortKind::Composite(rank) => *rank,
        }
    }
}

/// Orders numbers by float value, then by exact integer value so that
/// integers beyond float precision stay distinct.
fn compare_number_keys(a: &Number, b: &Number) -> Ordering {
    let (fa, ea) = number_key(a);
    let (fb, eb) = number_key(b);
    fa.total_cmp(&fb).then_with(|| ea.cmp(&eb))
}

fn number_key(n: &Number) -> (f64, i128) {
    let float = n.as_f64().unwrap_or(0.0);
    let exact = n
        .as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
        .unwrap_or(float as i128);
    (float, exact)
}

/// Builds a JSON number from a float, preferring an integer representation
/// when the value is integral.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Canonical text form used to index values by strict equality.
///
/// Integral floats collapse onto their integer form so that `2.0` and `2`
/// land on the same key.
pub fn canonical_key(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => number_value(f).to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
