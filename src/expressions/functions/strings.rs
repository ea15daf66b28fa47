//! contains, startsWith, endsWith, join and format

use crate::expressions::compare::{loose_equals, to_upper_special};
use crate::expressions::data::Value;
use crate::expressions::evaluator::EvaluationError;

pub fn contains(args: &[Value]) -> Result<Value, EvaluationError> {
    let (search, item) = two(args);
    let found = match search {
        s if s.is_primitive() => {
            let haystack = to_upper_special(&s.coerce_to_string());
            let needle = to_upper_special(&item.coerce_to_string());
            haystack.contains(&needle)
        }
        Value::Array(items) => items.iter().any(|v| loose_equals(v, item)),
        _ => false,
    };
    Ok(Value::Boolean(found))
}

pub fn starts_with(args: &[Value]) -> Result<Value, EvaluationError> {
    let (left, right) = two(args);
    if !left.is_primitive() || !right.is_primitive() {
        return Ok(Value::Boolean(false));
    }
    let left = to_upper_special(&left.coerce_to_string());
    let right = to_upper_special(&right.coerce_to_string());
    Ok(Value::Boolean(left.starts_with(&right)))
}

pub fn ends_with(args: &[Value]) -> Result<Value, EvaluationError> {
    let (left, right) = two(args);
    if !left.is_primitive() || !right.is_primitive() {
        return Ok(Value::Boolean(false));
    }
    let left = to_upper_special(&left.coerce_to_string());
    let right = to_upper_special(&right.coerce_to_string());
    Ok(Value::Boolean(left.ends_with(&right)))
}

pub fn join(args: &[Value]) -> Result<Value, EvaluationError> {
    let separator = match args.get(1) {
        Some(sep) if sep.is_primitive() => sep.coerce_to_string(),
        _ => ",".to_string(),
    };

    let joined = match args.first() {
        Some(Value::Array(items)) => items
            .iter()
            .map(Value::coerce_to_string)
            .collect::<Vec<_>>()
            .join(&separator),
        Some(v) if v.is_primitive() => v.coerce_to_string(),
        _ => String::new(),
    };
    Ok(Value::String(joined))
}

/// `format('{0} and {1}', a, b)`; `{{` and `}}` produce literal braces.
pub fn format(args: &[Value]) -> Result<Value, EvaluationError> {
    let template = args
        .first()
        .map(Value::coerce_to_string)
        .unwrap_or_default();
    let values = &args[args.len().min(1)..];

    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' => {
                if chars.get(i + 1) == Some(&'{') {
                    out.push('{');
                    i += 2;
                    continue;
                }

                let digits_start = i + 1;
                let mut end = digits_start;
                while end < chars.len() && chars[end].is_ascii_digit() {
                    end += 1;
                }
                if end == digits_start || chars.get(end) != Some(&'}') {
                    return Err(EvaluationError::InvalidFormatString(template));
                }

                let index: usize = chars[digits_start..end]
                    .iter()
                    .collect::<String>()
                    .parse()
                    .map_err(|_| EvaluationError::InvalidFormatString(template.clone()))?;
                match values.get(index) {
                    Some(v) => out.push_str(&v.coerce_to_string()),
                    None => return Err(EvaluationError::FormatArgumentOutOfRange(template)),
                }
                i = end + 1;
            }
            '}' => {
                if chars.get(i + 1) == Some(&'}') {
                    out.push('}');
                    i += 2;
                } else {
                    return Err(EvaluationError::InvalidFormatString(template));
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(Value::String(out))
}

fn two(args: &[Value]) -> (&Value, &Value) {
    const NULL: &Value = &Value::Null;
    (args.first().unwrap_or(NULL), args.get(1).unwrap_or(NULL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::data::{Array, Dictionary};
    use assert_matches::assert_matches;

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn test_contains_string() {
        assert_eq!(contains(&[s("Hello World"), s("world")]).unwrap(), Value::Boolean(true));
        assert_eq!(contains(&[s("Hello"), s("x")]).unwrap(), Value::Boolean(false));
        assert_eq!(
            contains(&[Value::Number(123.0), s("2")]).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_contains_array() {
        let array: Array = vec![s("push"), Value::Number(1.0)].into_iter().collect();
        let array = Value::from(array);
        assert_eq!(contains(&[array.clone(), s("PUSH")]).unwrap(), Value::Boolean(true));
        assert_eq!(contains(&[array.clone(), s("1")]).unwrap(), Value::Boolean(true));
        assert_eq!(contains(&[array, s("pull")]).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_contains_dictionary_is_false() {
        let dict = Value::from(Dictionary::new());
        assert_eq!(contains(&[dict, s("a")]).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_starts_and_ends_with() {
        assert_eq!(starts_with(&[s("refs/heads/main"), s("REFS/")]).unwrap(), Value::Boolean(true));
        assert_eq!(ends_with(&[s("refs/heads/main"), s("MAIN")]).unwrap(), Value::Boolean(true));
        assert_eq!(
            starts_with(&[Value::from(Array::new()), s("")]).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            ends_with(&[s("abc\u{0131}"), s("I")]).unwrap(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_join() {
        let array: Array = vec![s("a"), Value::Number(1.0), Value::Boolean(true)]
            .into_iter()
            .collect();
        let array = Value::from(array);
        assert_eq!(join(&[array.clone()]).unwrap(), s("a,1,true"));
        assert_eq!(join(&[array, s(" | ")]).unwrap(), s("a | 1 | true"));
        assert_eq!(join(&[s("single")]).unwrap(), s("single"));
    }

    #[test]
    fn test_format() {
        assert_eq!(
            format(&[s("Hello {0}, {1}!"), s("Mona"), Value::Number(3.0)]).unwrap(),
            s("Hello Mona, 3!")
        );
        assert_eq!(format(&[s("{{0}} {0}"), s("x")]).unwrap(), s("{0} x"));
        assert_eq!(format(&[s("{0}{0}"), s("ab")]).unwrap(), s("abab"));
    }

    #[test]
    fn test_format_errors() {
        assert_matches!(
            format(&[s("{1}"), s("a")]),
            Err(EvaluationError::FormatArgumentOutOfRange(_))
        );
        assert_matches!(format(&[s("{a}")]), Err(EvaluationError::InvalidFormatString(_)));
        assert_matches!(format(&[s("{0")]), Err(EvaluationError::InvalidFormatString(_)));
        assert_matches!(format(&[s("}")]), Err(EvaluationError::InvalidFormatString(_)));
    }
}
