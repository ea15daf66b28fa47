//! Truthiness, type coercion and comparison semantics

use std::sync::Arc;

use super::data::{Kind, Value};

/// Falsy values: null, false, 0, NaN and the empty string. Containers are
/// always truthy, even when empty.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Boolean(b) => !b,
        Value::Number(n) => *n == 0.0 || n.is_nan(),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Dictionary(_) => false,
    }
}

pub fn is_truthy(value: &Value) -> bool {
    !is_falsy(value)
}

/// Coerce two operands towards a common kind.
///
/// Number/string pairs convert the string to a number; a boolean or null on
/// either side becomes a number and coercion runs again. Containers never
/// convert.
pub fn coerce_types(left: &Value, right: &Value) -> (Value, Value) {
    let (lk, rk) = (left.kind(), right.kind());
    if lk == rk {
        return (left.clone(), right.clone());
    }

    match (lk, rk) {
        (Kind::Number, Kind::String) => (
            left.clone(),
            Value::Number(right.coerce_to_number()),
        ),
        (Kind::String, Kind::Number) => (
            Value::Number(left.coerce_to_number()),
            right.clone(),
        ),
        (Kind::Boolean | Kind::Null, _) => {
            coerce_types(&Value::Number(left.coerce_to_number()), right)
        }
        (_, Kind::Boolean | Kind::Null) => {
            coerce_types(left, &Value::Number(right.coerce_to_number()))
        }
        _ => (left.clone(), right.clone()),
    }
}

/// Loose equality after coercion. Strings compare ignoring case, containers
/// by identity.
pub fn loose_equals(left: &Value, right: &Value) -> bool {
    let (l, r) = coerce_types(left, right);
    match (&l, &r) {
        (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => to_upper_special(a) == to_upper_special(b),
        (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
        (Value::Dictionary(a), Value::Dictionary(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

pub fn greater_than(left: &Value, right: &Value) -> bool {
    let (l, r) = coerce_types(left, right);
    match (&l, &r) {
        (Value::Number(a), Value::Number(b)) => a > b,
        (Value::String(a), Value::String(b)) => to_upper_special(a) > to_upper_special(b),
        (Value::Boolean(a), Value::Boolean(b)) => *a && !*b,
        _ => false,
    }
}

pub fn less_than(left: &Value, right: &Value) -> bool {
    let (l, r) = coerce_types(left, right);
    match (&l, &r) {
        (Value::Number(a), Value::Number(b)) => a < b,
        (Value::String(a), Value::String(b)) => to_upper_special(a) < to_upper_special(b),
        (Value::Boolean(a), Value::Boolean(b)) => !*a && *b,
        _ => false,
    }
}

pub fn greater_than_or_equal(left: &Value, right: &Value) -> bool {
    loose_equals(left, right) || greater_than(left, right)
}

pub fn less_than_or_equal(left: &Value, right: &Value) -> bool {
    loose_equals(left, right) || less_than(left, right)
}

/// Uppercase for comparison purposes. The dotless `ı` (U+0131) is left alone
/// so it never collides with `i`/`I`.
pub fn to_upper_special(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\u{0131}' {
            out.push(c);
        } else {
            out.extend(c.to_uppercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::data::{Array, Dictionary};

    fn samples() -> Vec<Value> {
        vec![
            Value::Null,
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Number(0.0),
            Value::Number(1.0),
            Value::Number(f64::NAN),
            Value::from(""),
            Value::from("1"),
            Value::from("abc"),
            Value::from("ABC"),
            Value::from_array(Array::new()),
            Value::from_dictionary(Dictionary::new()),
        ]
    }

    #[test]
    fn test_falsy() {
        assert!(is_falsy(&Value::Null));
        assert!(is_falsy(&Value::Number(0.0)));
        assert!(is_falsy(&Value::Number(f64::NAN)));
        assert!(is_falsy(&Value::from("")));
        assert!(is_falsy(&Value::Boolean(false)));
        assert!(!is_falsy(&Value::from_array(Array::new())));
        assert!(!is_falsy(&Value::from_dictionary(Dictionary::new())));
        assert!(!is_falsy(&Value::from("false")));
    }

    #[test]
    fn test_equality_is_symmetric() {
        let values = samples();
        for a in &values {
            for b in &values {
                assert_eq!(
                    loose_equals(a, b),
                    loose_equals(b, a),
                    "asymmetric for {:?} and {:?}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_coercion() {
        assert!(loose_equals(&Value::Number(1.0), &Value::from("1")));
        assert!(loose_equals(&Value::Boolean(true), &Value::from("1")));
        assert!(loose_equals(&Value::Null, &Value::Number(0.0)));
        assert!(loose_equals(&Value::Null, &Value::from("")));
        assert!(!loose_equals(&Value::Null, &Value::from("abc")));
        assert!(loose_equals(&Value::from("abc"), &Value::from("ABC")));
        assert!(!loose_equals(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
    }

    #[test]
    fn test_containers_compare_by_identity() {
        let a = Value::from_array(Array::new());
        let b = Value::from_array(Array::new());
        assert!(loose_equals(&a, &a.clone()));
        assert!(!loose_equals(&a, &b));
        assert!(!loose_equals(&a, &Value::from("Array")));
    }

    #[test]
    fn test_ordering() {
        assert!(greater_than(&Value::Number(2.0), &Value::from("1")));
        assert!(less_than(&Value::from("a"), &Value::from("B")));
        assert!(greater_than_or_equal(&Value::from("abc"), &Value::from("ABC")));
        assert!(less_than_or_equal(&Value::Null, &Value::Boolean(false)));
        assert!(!greater_than(&Value::from("abc"), &Value::Number(1.0)));
        assert!(!less_than(&Value::from("abc"), &Value::Number(1.0)));
    }

    #[test]
    fn test_to_upper_special() {
        assert_eq!(to_upper_special("\u{0131}"), "\u{0131}");
        assert_eq!(to_upper_special("i\u{0131}"), "I\u{0131}");
        assert_eq!(to_upper_special("abc"), "ABC");
    }

    #[test]
    fn test_dotless_i_does_not_equal_capital_i() {
        assert!(!loose_equals(&Value::from("\u{0131}"), &Value::from("I")));
        assert!(loose_equals(&Value::from("i"), &Value::from("I")));
    }
}
