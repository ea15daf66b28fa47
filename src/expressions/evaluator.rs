//! Tree-walking expression evaluator

use thiserror::Error;
use tracing::trace;

use super::ast::{BinaryOp, Expr, Index, LogicalOp, UnaryOp};
use super::compare::{
    greater_than, greater_than_or_equal, is_falsy, is_truthy, less_than, less_than_or_equal,
    loose_equals,
};
use super::data::{Array, Dictionary, Value};
use super::functions::{self, FunctionRegistry};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Unknown function: '{0}'")]
    UnknownFunction(String),

    #[error("The following format string is invalid: {0}")]
    InvalidFormatString(String),

    #[error("The following format string references more arguments than were supplied: {0}")]
    FormatArgumentOutOfRange(String),

    #[error("Error parsing fromJSON: {reason}")]
    InvalidJson { reason: String },

    #[error("Error calling {name}: {message}")]
    Function { name: String, message: String },
}

/// Intermediate result: a plain value, or the projection produced by `*`.
#[derive(Debug, Clone)]
enum Evaluated {
    Value(Value),
    Filtered(Vec<Value>),
}

impl Evaluated {
    fn into_value(self) -> Value {
        match self {
            Evaluated::Value(v) => v,
            Evaluated::Filtered(items) => Value::from(items.into_iter().collect::<Array>()),
        }
    }
}

pub struct Evaluator<'a> {
    expr: &'a Expr,
    context: &'a Dictionary,
    functions: Option<&'a FunctionRegistry>,
}

impl<'a> Evaluator<'a> {
    pub fn new(expr: &'a Expr, context: &'a Dictionary) -> Self {
        Self {
            expr,
            context,
            functions: None,
        }
    }

    /// Make extension functions (registered by the embedding layer) callable.
    pub fn with_functions(mut self, functions: &'a FunctionRegistry) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn evaluate(&self) -> Result<Value, EvaluationError> {
        trace!(expression = %self.expr, "evaluating expression");
        self.eval(self.expr).map(Evaluated::into_value)
    }

    fn eval(&self, expr: &Expr) -> Result<Evaluated, EvaluationError> {
        let value = match expr {
            Expr::Literal(value) => value.clone(),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => Value::Boolean(is_falsy(&self.eval_value(operand)?)),
            Expr::Binary { op, left, right } => {
                let left = self.eval_value(left)?;
                let right = self.eval_value(right)?;
                Value::Boolean(match op {
                    BinaryOp::Equal => loose_equals(&left, &right),
                    BinaryOp::NotEqual => !loose_equals(&left, &right),
                    BinaryOp::Greater => greater_than(&left, &right),
                    BinaryOp::GreaterEqual => greater_than_or_equal(&left, &right),
                    BinaryOp::Less => less_than(&left, &right),
                    BinaryOp::LessEqual => less_than_or_equal(&left, &right),
                })
            }
            Expr::Logical { op, args } => self.eval_logical(*op, args)?,
            Expr::Grouping(inner) => return self.eval(inner),
            Expr::ContextAccess(name) => self
                .context
                .get(name)
                .or_else(|| self.context.get_case_insensitive(name))
                .cloned()
                .unwrap_or(Value::Null),
            Expr::IndexAccess { base, index } => return self.eval_index(base, index),
            Expr::FunctionCall { name, args } => self.eval_call(name, args)?,
        };
        Ok(Evaluated::Value(value))
    }

    fn eval_value(&self, expr: &Expr) -> Result<Value, EvaluationError> {
        self.eval(expr).map(Evaluated::into_value)
    }

    fn eval_logical(&self, op: LogicalOp, args: &[Expr]) -> Result<Value, EvaluationError> {
        let mut last = Value::Null;
        for arg in args {
            last = self.eval_value(arg)?;
            let stop = match op {
                LogicalOp::And => is_falsy(&last),
                LogicalOp::Or => is_truthy(&last),
            };
            if stop {
                break;
            }
        }
        Ok(last)
    }

    fn eval_index(&self, base: &Expr, index: &Index) -> Result<Evaluated, EvaluationError> {
        let base = self.eval(base)?;
        match index {
            Index::Star => Ok(Evaluated::Filtered(match base {
                Evaluated::Value(v) => container_items(&v),
                Evaluated::Filtered(items) => items.iter().flat_map(container_items).collect(),
            })),
            Index::Expr(index) => {
                let key = self.eval_value(index)?;
                Ok(match base {
                    Evaluated::Value(v) => Evaluated::Value(index_value(&v, &key)),
                    Evaluated::Filtered(items) => Evaluated::Filtered(
                        items
                            .iter()
                            .map(|item| index_value(item, &key))
                            .filter(|v| !matches!(v, Value::Null))
                            .collect(),
                    ),
                })
            }
        }
    }

    fn eval_call(&self, name: &str, args: &[Expr]) -> Result<Value, EvaluationError> {
        let values = args
            .iter()
            .map(|arg| self.eval_value(arg))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(function) = functions::lookup(name) {
            return (function.call)(&values);
        }
        if let Some(function) = self.functions.and_then(|r| r.get(name)) {
            return function(&values);
        }
        Err(EvaluationError::UnknownFunction(name.to_string()))
    }
}

/// Elements of an array or values of a dictionary, nothing for scalars.
fn container_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.iter().cloned().collect(),
        Value::Dictionary(dict) => dict.values().cloned().collect(),
        _ => Vec::new(),
    }
}

fn index_value(base: &Value, key: &Value) -> Value {
    match base {
        Value::Array(items) => {
            if !key.is_primitive() {
                return Value::Null;
            }
            let n = key.coerce_to_number();
            if n.is_nan() || n < 0.0 {
                return Value::Null;
            }
            items.get(n.floor() as usize).cloned().unwrap_or(Value::Null)
        }
        Value::Dictionary(dict) => {
            if !key.is_primitive() {
                return Value::Null;
            }
            dict.get(&key.coerce_to_string())
                .cloned()
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::lexer::lex;
    use crate::expressions::parser::{FunctionInfo, Parser};
    use assert_matches::assert_matches;

    fn parse(text: &str, contexts: &[&str], extensions: &[FunctionInfo]) -> Expr {
        let tokens = lex(text).expect("lex").tokens;
        Parser::new(tokens, contexts, extensions)
            .parse()
            .expect("parse")
    }

    fn eval(text: &str, context: &Dictionary) -> Result<Value, EvaluationError> {
        let names: Vec<&str> = context.keys().collect();
        let expr = parse(text, &names, &[]);
        Evaluator::new(&expr, context).evaluate()
    }

    fn dict(pairs: Vec<(&str, Value)>) -> Dictionary {
        let mut d = Dictionary::new();
        for (k, v) in pairs {
            d.add(k, v);
        }
        d
    }

    #[test]
    fn test_deep_operator_chains() {
        let context = Dictionary::new();
        let deepest = format!("1{}", " == 1".repeat(50));
        assert_eq!(eval(&deepest, &context).unwrap(), Value::Boolean(true));

        // rejected before it reaches the evaluator
        let tokens = lex(&format!("1{}", " == 1".repeat(3000))).unwrap().tokens;
        assert!(Parser::new(tokens, &[] as &[&str], &[]).parse().is_err());
    }

    #[test]
    fn test_empty_key_lookup_is_null() {
        let context = dict(vec![(
            "foo",
            Value::from(dict(vec![("bar", Value::Number(42.0))])),
        )]);
        assert_eq!(eval("foo['']", &context).unwrap(), Value::Null);
        assert_eq!(eval("foo.bar", &context).unwrap(), Value::Number(42.0));
        assert_eq!(eval("foo.BAR", &context).unwrap(), Value::Null);
    }

    #[test]
    fn test_from_json_failure_surfaces_reason() {
        let err = eval("fromJSON('test') == 123", &Dictionary::new()).unwrap_err();
        assert_matches!(err, EvaluationError::InvalidJson { .. });
        assert!(err.to_string().starts_with("Error parsing fromJSON:"));
    }

    #[test]
    fn test_logical_operators_return_raw_operand() {
        let context = Dictionary::new();
        assert_eq!(eval("'a' && 'b' && 'c'", &context).unwrap(), Value::from("c"));
        assert_eq!(eval("'a' && '' && 'c'", &context).unwrap(), Value::from(""));
        assert_eq!(eval("0 || null || 'x'", &context).unwrap(), Value::from("x"));
        assert_eq!(eval("0 || null", &context).unwrap(), Value::Null);
    }

    #[test]
    fn test_logical_short_circuit_skips_failing_call() {
        let context = Dictionary::new();
        assert_eq!(
            eval("false && fromJSON('bad')", &context).unwrap(),
            Value::Boolean(false)
        );
        assert!(eval("true && fromJSON('bad')", &context).is_err());
    }

    #[test]
    fn test_not_and_comparisons() {
        let context = Dictionary::new();
        assert_eq!(eval("!0", &context).unwrap(), Value::Boolean(true));
        assert_eq!(eval("!'x'", &context).unwrap(), Value::Boolean(false));
        assert_eq!(eval("'ABC' == 'abc'", &context).unwrap(), Value::Boolean(true));
        assert_eq!(eval("'1' == 1", &context).unwrap(), Value::Boolean(true));
        assert_eq!(eval("null == 0", &context).unwrap(), Value::Boolean(true));
        assert_eq!(eval("2 >= 2", &context).unwrap(), Value::Boolean(true));
        assert_eq!(eval("'b' > 'A'", &context).unwrap(), Value::Boolean(true));
        assert_eq!(eval("'abc' < 1", &context).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_star_projection() {
        let context = dict(vec![(
            "jobs",
            Value::from(dict(vec![
                ("a", Value::from(dict(vec![("x", Value::Number(1.0))]))),
                ("b", Value::from(dict(vec![("x", Value::Number(2.0))]))),
                ("c", Value::from(dict(vec![("y", Value::Number(3.0))]))),
            ])),
        )]);

        let result = eval("jobs.*.x", &context).unwrap();
        let expected: Array = vec![Value::Number(1.0), Value::Number(2.0)]
            .into_iter()
            .collect();
        assert!(result.structurally_equals(&Value::from(expected)));
    }

    #[test]
    fn test_nested_star_flattens() {
        let inner = |n: f64| {
            let items: Array = vec![Value::Number(n), Value::Number(n + 1.0)]
                .into_iter()
                .collect();
            Value::from(dict(vec![("list", Value::from(items))]))
        };
        let context = dict(vec![("m", Value::from(dict(vec![("a", inner(1.0)), ("b", inner(10.0))])))]);

        let result = eval("m.*.list.*", &context).unwrap();
        let array = result.as_array().expect("array result");
        let numbers: Vec<f64> = array.iter().map(Value::coerce_to_number).collect();
        assert_eq!(numbers, vec![1.0, 2.0, 10.0, 11.0]);
    }

    #[test]
    fn test_star_on_scalar_is_empty() {
        let context = dict(vec![("s", Value::from("text"))]);
        let result = eval("s.*", &context).unwrap();
        assert_eq!(result.as_array().map(Array::len), Some(0));
    }

    #[test]
    fn test_array_index() {
        let items: Array = vec![Value::from("a"), Value::from("b")].into_iter().collect();
        let context = dict(vec![("list", Value::from(items))]);
        assert_eq!(eval("list[1]", &context).unwrap(), Value::from("b"));
        assert_eq!(eval("list[1.7]", &context).unwrap(), Value::from("b"));
        assert_eq!(eval("list[5]", &context).unwrap(), Value::Null);
        assert_eq!(eval("list['x']", &context).unwrap(), Value::Null);
        assert_eq!(eval("list[-1]", &context).unwrap(), Value::Null);
    }

    #[test]
    fn test_context_access_falls_back_to_case_insensitive() {
        let context = dict(vec![("github", Value::from(dict(vec![("sha", Value::from("abc"))])))]);
        let expr = parse("GITHUB.sha", &["github"], &[]);
        assert_eq!(
            Evaluator::new(&expr, &context).evaluate().unwrap(),
            Value::from("abc")
        );
    }

    #[test]
    fn test_unknown_context_is_null() {
        let expr = parse("secrets.token", &["secrets"], &[]);
        assert_eq!(
            Evaluator::new(&expr, &Dictionary::new()).evaluate().unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_missing_function_fails_loudly() {
        let extensions = [FunctionInfo::new("success", 0, 0)];
        let expr = parse("success()", &[], &extensions);
        assert_matches!(
            Evaluator::new(&expr, &Dictionary::new()).evaluate(),
            Err(EvaluationError::UnknownFunction(name)) if name == "success"
        );
    }

    #[test]
    fn test_extension_function_dispatch() {
        let mut registry = FunctionRegistry::new();
        registry.register(FunctionInfo::new("success", 0, 0), |_| Ok(Value::Boolean(true)));
        let infos = registry.infos();
        let expr = parse("success() && 'done'", &[], &infos);

        let result = Evaluator::new(&expr, &Dictionary::new())
            .with_functions(&registry)
            .evaluate()
            .unwrap();
        assert_eq!(result, Value::from("done"));
    }

    #[test]
    fn test_function_arguments_and_format() {
        let context = dict(vec![("env", Value::from(dict(vec![("NAME", Value::from("mona"))])))]);
        assert_eq!(
            eval("format('hi {0}, {1}', env.NAME, startsWith('Hello', 'he'))", &context).unwrap(),
            Value::from("hi mona, true")
        );
    }
}
