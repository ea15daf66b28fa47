//! toJSON and fromJSON

use serde_json::{Map, Number};

use crate::expressions::data::{Array, Dictionary, Value};
use crate::expressions::evaluator::EvaluationError;

/// Largest integer a double represents exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub fn to_json(args: &[Value]) -> Result<Value, EvaluationError> {
    let value = args.first().unwrap_or(&Value::Null);
    let json = to_serde(value);
    serde_json::to_string_pretty(&json)
        .map(Value::String)
        .map_err(|e| EvaluationError::Function {
            name: "toJSON".to_string(),
            message: e.to_string(),
        })
}

pub fn from_json(args: &[Value]) -> Result<Value, EvaluationError> {
    let text = args
        .first()
        .map(Value::coerce_to_string)
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(EvaluationError::InvalidJson {
            reason: "Unexpected end of JSON input".to_string(),
        });
    }

    let parsed: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| EvaluationError::InvalidJson {
            reason: e.to_string(),
        })?;
    Ok(from_serde(&parsed))
}

/// Convert an expression value into a JSON document.
pub fn to_serde(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_serde(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_serde).collect()),
        Value::Dictionary(dict) => {
            let mut map = Map::new();
            for (key, value) in dict.pairs() {
                map.insert(key.to_string(), to_serde(value));
            }
            serde_json::Value::Object(map)
        }
    }
}

/// Convert a JSON document into an expression value, keeping key order.
pub fn from_serde(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            Value::from(items.iter().map(from_serde).collect::<Array>())
        }
        serde_json::Value::Object(map) => {
            let mut dict = Dictionary::new();
            for (key, value) in map {
                dict.add(key.clone(), from_serde(value));
            }
            Value::from(dict)
        }
    }
}

fn number_to_serde(n: f64) -> serde_json::Value {
    // Integral values print without a trailing ".0"
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}
