//! Expression data model
//!
//! A closed set of dynamically typed values. Arrays and dictionaries are built
//! up front and then shared behind an [`Arc`]; once wrapped in a [`Value`] they
//! are never mutated again, so evaluations can share them freely.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The kind tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Dictionary,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Null => "Null",
            Kind::Boolean => "Boolean",
            Kind::Number => "Number",
            Kind::String => "String",
            Kind::Array => "Array",
            Kind::Dictionary => "Object",
        };
        f.write_str(name)
    }
}

/// A dynamically typed expression value
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Arc<Array>),
    Dictionary(Arc<Dictionary>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Boolean(_) => Kind::Boolean,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Dictionary(_) => Kind::Dictionary,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Dictionary(_))
    }

    pub fn coerce_to_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
            Value::Array(_) => "Array".to_string(),
            Value::Dictionary(_) => "Object".to_string(),
        }
    }

    /// Numeric value, NaN when the value has no numeric interpretation.
    pub fn coerce_to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    parse_number(trimmed)
                }
            }
            Value::Array(_) | Value::Dictionary(_) => f64::NAN,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn from_array(array: Array) -> Self {
        Value::Array(Arc::new(array))
    }

    pub fn from_dictionary(dictionary: Dictionary) -> Self {
        Value::Dictionary(Arc::new(dictionary))
    }

    /// Structural comparison, used where reference identity is too strict
    /// (tests and round-trips). Numbers compare with NaN equal to NaN.
    pub fn structurally_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.structurally_equals(y))
            }
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                a.len() == b.len()
                    && a.pairs().zip(b.pairs()).all(|((ka, va), (kb, vb))| {
                        ka == kb && va.structurally_equals(vb)
                    })
            }
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.structurally_equals(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::from_array(a)
    }
}

impl From<Dictionary> for Value {
    fn from(d: Dictionary) -> Self {
        Value::from_dictionary(d)
    }
}

/// Ordered list of values
#[derive(Debug, Clone, Default)]
pub struct Array {
    items: Vec<Value>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct DictionaryEntry {
    key: String,
    value: Value,
    description: Option<String>,
}

/// Ordered key/value pairs with case-insensitively unique keys.
///
/// Lookups with [`Dictionary::get`] are exact; [`Dictionary::get_case_insensitive`]
/// is available for callers such as completion that want loose matching.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: Vec<DictionaryEntry>,
    index: HashMap<String, usize>,
    incomplete: bool,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair. A key equal to an existing one ignoring case replaces
    /// that entry's value in place, keeping the first insertion's position.
    pub fn add(&mut self, key: impl Into<String>, value: Value) {
        self.add_with_description(key, value, None);
    }

    pub fn add_with_description(
        &mut self,
        key: impl Into<String>,
        value: Value,
        description: Option<String>,
    ) {
        let key = key.into();
        let folded = key.to_lowercase();
        match self.index.get(&folded) {
            Some(&i) => {
                self.entries[i].value = value;
                if description.is_some() {
                    self.entries[i].description = description;
                }
            }
            None => {
                self.index.insert(folded, self.entries.len());
                self.entries.push(DictionaryEntry {
                    key,
                    value,
                    description,
                });
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.value)
    }

    pub fn get_case_insensitive(&self, key: &str) -> Option<&Value> {
        self.index
            .get(&key.to_lowercase())
            .map(|&i| &self.entries[i].value)
    }

    pub fn description(&self, key: &str) -> Option<&str> {
        self.index
            .get(&key.to_lowercase())
            .and_then(|&i| self.entries[i].description.as_deref())
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|e| (e.key.as_str(), &e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|e| &e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark the dictionary as possibly missing entries the provider could not
    /// resolve (permissions, availability). Lookups still behave normally.
    pub fn set_incomplete(&mut self, incomplete: bool) {
        self.incomplete = incomplete;
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }
}

/// Parse a number the way the expression language reads numeric text:
/// decimal with optional exponent, `0x` hex and `0o` octal. NaN on failure.
pub fn parse_number(text: &str) -> f64 {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).map(|v| v as f64).ok()
    } else if let Some(oct) = digits
        .strip_prefix("0o")
        .or_else(|| digits.strip_prefix("0O"))
    {
        u64::from_str_radix(oct, 8).map(|v| v as f64).ok()
    } else if digits == "Infinity" {
        Some(f64::INFINITY)
    } else if digits.is_empty()
        || !digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        // Rejects "inf", "nan" and friends that str::parse would accept
        None
    } else {
        digits.parse::<f64>().ok()
    };

    match parsed {
        Some(v) if negative => -v,
        Some(v) => v,
        None => f64::NAN,
    }
}

/// Render a number the way the expression language prints it: integers without
/// a fractional part, exponent notation for very large or very small magnitudes.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let magnitude = n.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => formatted,
        };
    }

    format!("{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_primitive() {
        assert!(Value::Null.is_primitive());
        assert!(Value::from("x").is_primitive());
        assert!(!Value::from_array(Array::new()).is_primitive());
        assert_eq!(Value::from(1.0).kind(), Kind::Number);
    }

    #[test]
    fn test_coerce_to_string() {
        assert_eq!(Value::Null.coerce_to_string(), "");
        assert_eq!(Value::Boolean(true).coerce_to_string(), "true");
        assert_eq!(Value::Number(1.0).coerce_to_string(), "1");
        assert_eq!(Value::Number(1.5).coerce_to_string(), "1.5");
        assert_eq!(Value::Number(-0.0).coerce_to_string(), "0");
        assert_eq!(Value::Number(1e21).coerce_to_string(), "1e+21");
        assert_eq!(Value::Number(f64::NAN).coerce_to_string(), "NaN");
        assert_eq!(Value::from_array(Array::new()).coerce_to_string(), "Array");
        assert_eq!(
            Value::from_dictionary(Dictionary::new()).coerce_to_string(),
            "Object"
        );
    }

    #[test]
    fn test_coerce_to_number() {
        assert_eq!(Value::Null.coerce_to_number(), 0.0);
        assert_eq!(Value::Boolean(true).coerce_to_number(), 1.0);
        assert_eq!(Value::from(" 42 ").coerce_to_number(), 42.0);
        assert_eq!(Value::from("").coerce_to_number(), 0.0);
        assert_eq!(Value::from("0x10").coerce_to_number(), 16.0);
        assert!(Value::from("abc").coerce_to_number().is_nan());
        assert!(Value::from("inf").coerce_to_number().is_nan());
        assert!(Value::from_array(Array::new()).coerce_to_number().is_nan());
    }

    #[test]
    fn test_dictionary_keys_unique_ignoring_case() {
        let mut d = Dictionary::new();
        d.add("Foo", Value::from(1.0));
        d.add("bar", Value::from(2.0));
        d.add("FOO", Value::from(3.0));

        assert_eq!(d.len(), 2);
        assert_eq!(d.keys().collect::<Vec<_>>(), vec!["Foo", "bar"]);
        assert_eq!(d.get("Foo"), Some(&Value::Number(3.0)));
        assert_eq!(d.get("foo"), None);
        assert_eq!(d.get_case_insensitive("foo"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_dictionary_description_and_incomplete() {
        let mut d = Dictionary::new();
        d.add_with_description("token", Value::from("x"), Some("A secret".into()));
        assert_eq!(d.description("TOKEN"), Some("A secret"));
        assert!(!d.is_incomplete());
        d.set_incomplete(true);
        assert!(d.is_incomplete());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1e3"), 1000.0);
        assert_eq!(parse_number("-.5"), -0.5);
        assert_eq!(parse_number("0o17"), 15.0);
        assert!(parse_number("1abc").is_nan());
        assert!(parse_number("nan").is_nan());
    }
}
