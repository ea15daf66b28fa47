use crate::expressions::{lex, Expr, Parser};
use crate::templates::context::TemplateContext;
use crate::templates::tokens::{TemplateToken, TokenValue};

const STATUS_FUNCTIONS: &[&str] = &["success", "failure", "cancelled", "always"];

const DEFAULT_CONDITION: &str = "success()";

/// The implicit `if` of a job or step without one
pub fn default_if_condition(file: Option<usize>) -> TemplateToken {
    TemplateToken::expression(file, None, DEFAULT_CONDITION)
}

/// Normalize a job or step `if` into an expression token. Conditions that do
/// not call a status function are wrapped as `success() && (<condition>)`.
pub fn convert_if_condition(context: &mut TemplateContext, token: &TemplateToken) -> TemplateToken {
    let text = match &token.value {
        TokenValue::BasicExpression { expression, .. } => expression.clone(),
        TokenValue::Null => String::new(),
        _ if token.is_literal() => token.to_display_string(),
        _ => {
            context.error(token, format!("Unexpected value '{}'", token));
            return default_if_condition(token.file);
        }
    };

    let condition = text.trim();
    let expression = if condition.is_empty() {
        DEFAULT_CONDITION.to_string()
    } else {
        match parse(condition) {
            Ok(expr) if calls_status_function(&expr) => condition.to_string(),
            Ok(_) => format!("{} && ({})", DEFAULT_CONDITION, condition),
            Err(message) => {
                // already reported while reading
                if !token.is_expression() {
                    context.error(token, format!("{}: {}", message, condition));
                }
                condition.to_string()
            }
        }
    };

    let mut converted = TemplateToken::expression(token.file, token.range, expression);
    converted.definition = token.definition.clone();
    converted
}

/// Syntax only, named-values and functions were checked by the reader
fn parse(condition: &str) -> Result<Expr, String> {
    let tokens = lex(condition).map_err(|e| e.to_string())?.tokens;
    Parser::new(tokens, &[] as &[&str], &[])
        .allow_unknown_keywords(true)
        .parse()
        .map_err(|e| e.to_string())
}

fn calls_status_function(expr: &Expr) -> bool {
    let mut found = false;
    expr.walk(&mut |node| {
        if let Expr::FunctionCall { name, .. } = node {
            if STATUS_FUNCTIONS
                .iter()
                .any(|status| status.eq_ignore_ascii_case(name))
            {
                found = true;
            }
        }
    });
    found
}
