use crate::templates::context::TemplateContext;
use crate::templates::tokens::{TemplateToken, TokenValue};

/// Check a `concurrency` value: a group name, or `{group, cancel-in-progress}`.
/// Expressions are left for evaluation at run time.
pub fn convert_concurrency(context: &mut TemplateContext, token: &TemplateToken) {
    match &token.value {
        TokenValue::String { .. } | TokenValue::BasicExpression { .. } => {}
        TokenValue::Mapping(pairs) => {
            for pair in pairs {
                let key = match pair.key.assert_string("concurrency key") {
                    Ok(key) => key,
                    Err(err) => {
                        context.error(&pair.key, err.to_string());
                        continue;
                    }
                };

                match key {
                    "group" => {
                        if !pair.value.is_expression() {
                            if let Err(err) = pair.value.assert_string("concurrency group") {
                                context.error(&pair.value, err.to_string());
                            }
                        }
                    }
                    "cancel-in-progress" => {
                        if !pair.value.is_expression() {
                            if let Err(err) = pair.value.assert_boolean("cancel-in-progress") {
                                context.error(&pair.value, err.to_string());
                            }
                        }
                    }
                    _ => context.error(&pair.key, format!("Invalid property name: {}", key)),
                }
            }
        }
        _ => {
            if let Err(err) = token.assert_string("concurrency") {
                context.error(token, err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::tokens::MappingPair;
    use crate::templates::{TemplateContext, TemplateLimits, TemplateSchema};
    use std::sync::Arc;

    fn context() -> TemplateContext {
        TemplateContext::new(Arc::new(TemplateSchema::new()), TemplateLimits::default())
    }

    fn mapping(pairs: Vec<(&str, TemplateToken)>) -> TemplateToken {
        let mut token = TemplateToken::mapping(None, None);
        token.value = TokenValue::Mapping(
            pairs
                .into_iter()
                .map(|(key, value)| MappingPair {
                    key: TemplateToken::string(None, None, key),
                    value,
                })
                .collect(),
        );
        token
    }

    #[test]
    fn test_valid_forms() {
        let mut ctx = context();
        convert_concurrency(&mut ctx, &TemplateToken::string(None, None, "deploy"));
        convert_concurrency(&mut ctx, &TemplateToken::expression(None, None, "github.ref"));
        convert_concurrency(
            &mut ctx,
            &mapping(vec![
                ("group", TemplateToken::expression(None, None, "github.workflow")),
                ("cancel-in-progress", TemplateToken::boolean(None, None, true)),
            ]),
        );
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn test_invalid_forms() {
        let mut ctx = context();
        convert_concurrency(
            &mut ctx,
            &mapping(vec![
                ("group", TemplateToken::string(None, None, "deploy")),
                ("cancel-in-progress", TemplateToken::string(None, None, "yes")),
                ("queue", TemplateToken::number(None, None, 1.0)),
            ]),
        );
        convert_concurrency(&mut ctx, &TemplateToken::number(None, None, 3.0));

        let messages: Vec<String> = ctx.errors.iter().map(|e| e.message.clone()).collect();
        assert_eq!(
            messages,
            vec![
                "Unexpected type 'StringToken' encountered while reading 'cancel-in-progress'. The type 'BooleanToken' was expected.",
                "Invalid property name: queue",
                "Unexpected type 'NumberToken' encountered while reading 'concurrency'. The type 'StringToken' was expected.",
            ]
        );
    }
}
