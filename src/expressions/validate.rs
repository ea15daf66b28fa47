//! Static checking of property paths against a known context

use std::fmt;

use super::ast::{Expr, Index};
use super::data::{Dictionary, Value};

/// A literal property path that does not resolve in the supplied context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextAccessWarning {
    pub path: String,
}

impl fmt::Display for ContextAccessWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context access might be invalid: {}", self.path)
    }
}

enum Segment<'a> {
    Key(&'a str),
    Star,
    Other,
}

/// Check every literal path such as `github.event.ref` or `env['NAME']`.
///
/// Lookups are case-insensitive, the way the runner resolves them. A path
/// that crosses a dictionary flagged incomplete, a star projection, an array
/// or a null placeholder is assumed valid.
pub fn check_context_access(expr: &Expr, context: &Dictionary) -> Vec<ContextAccessWarning> {
    let mut warnings = Vec::new();
    visit(expr, context, &mut warnings);
    warnings
}

fn visit(expr: &Expr, context: &Dictionary, warnings: &mut Vec<ContextAccessWarning>) {
    if let Some((root, segments)) = literal_path(expr) {
        if !path_resolves(context, root, &segments) {
            warnings.push(ContextAccessWarning {
                path: expr.to_string(),
            });
        }
        return;
    }

    match expr {
        Expr::Literal(_) | Expr::ContextAccess(_) => {}
        Expr::Unary { operand, .. } => visit(operand, context, warnings),
        Expr::Binary { left, right, .. } => {
            visit(left, context, warnings);
            visit(right, context, warnings);
        }
        Expr::Logical { args, .. } | Expr::FunctionCall { args, .. } => {
            for arg in args {
                visit(arg, context, warnings);
            }
        }
        Expr::Grouping(inner) => visit(inner, context, warnings),
        Expr::IndexAccess { base, index } => {
            visit(base, context, warnings);
            if let Index::Expr(index) = index {
                visit(index, context, warnings);
            }
        }
    }
}

/// Split `a.b['c'].*` into its root name and segments. None when any index
/// is computed rather than literal.
fn literal_path(expr: &Expr) -> Option<(&str, Vec<Segment<'_>>)> {
    match expr {
        Expr::ContextAccess(name) => Some((name.as_str(), Vec::new())),
        Expr::IndexAccess { base, index } => {
            let (root, mut segments) = literal_path(base)?;
            segments.push(match index {
                Index::Star => Segment::Star,
                Index::Expr(e) => match e.as_ref() {
                    Expr::Literal(Value::String(key)) => Segment::Key(key.as_str()),
                    Expr::Literal(Value::Number(_)) => Segment::Other,
                    _ => return None,
                },
            });
            Some((root, segments))
        }
        _ => None,
    }
}

fn path_resolves(context: &Dictionary, root: &str, segments: &[Segment<'_>]) -> bool {
    let mut current = match context.get_case_insensitive(root) {
        Some(value) => value,
        None => return context.is_incomplete(),
    };

    for segment in segments {
        let dict = match current {
            Value::Dictionary(dict) => dict,
            _ => return true,
        };
        if dict.is_incomplete() {
            return true;
        }
        current = match segment {
            Segment::Key(key) => match dict.get_case_insensitive(key) {
                Some(value) => value,
                None => return false,
            },
            Segment::Star | Segment::Other => return true,
        };
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::lexer::lex;
    use crate::expressions::parser::Parser;

    fn check(text: &str, context: &Dictionary) -> Vec<String> {
        let tokens = lex(text).unwrap().tokens;
        let names: Vec<&str> = context.keys().collect();
        let expr = Parser::new(tokens, &names, &[]).parse().unwrap();
        check_context_access(&expr, context)
            .into_iter()
            .map(|w| w.to_string())
            .collect()
    }

    fn context(incomplete_secrets: bool) -> Dictionary {
        let mut env = Dictionary::new();
        env.add("NAME", Value::from("x"));

        let mut secrets = Dictionary::new();
        secrets.add("TOKEN", Value::from("***"));
        secrets.set_incomplete(incomplete_secrets);

        let mut root = Dictionary::new();
        root.add("env", Value::from(env));
        root.add("secrets", Value::from(secrets));
        root.add("matrix", Value::Null);
        root
    }

    #[test]
    fn test_known_paths_pass() {
        let ctx = context(false);
        assert!(check("env.NAME == secrets.token", &ctx).is_empty());
        assert!(check("env['name']", &ctx).is_empty());
        assert!(check("matrix.os", &ctx).is_empty());
        assert!(check("env.*", &ctx).is_empty());
    }

    #[test]
    fn test_unknown_path_warns() {
        let ctx = context(false);
        assert_eq!(
            check("format('{0}', secrets.MISSING)", &ctx),
            vec!["Context access might be invalid: secrets.MISSING".to_string()]
        );
    }

    #[test]
    fn test_incomplete_dictionary_suppresses_warning() {
        let ctx = context(true);
        assert!(check("secrets.MISSING", &ctx).is_empty());
    }

    #[test]
    fn test_computed_index_checks_parts() {
        let ctx = context(false);
        assert_eq!(
            check("env[env.OTHER]", &ctx),
            vec!["Context access might be invalid: env.OTHER".to_string()]
        );
    }
}
