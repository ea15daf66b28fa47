use crate::templates::context::TemplateContext;
use crate::templates::tokens::{TemplateToken, TokenValue};

const CONTAINER_KEYS: &[&str] = &["image", "options", "env", "ports", "volumes", "credentials"];

/// Check a `container` value: an image name or a mapping with a non-empty
/// `image`. Expressions are not checked.
pub fn convert_container(context: &mut TemplateContext, token: &TemplateToken) {
    match &token.value {
        TokenValue::BasicExpression { .. } => {}
        TokenValue::String { value, .. } => {
            if value.is_empty() {
                context.error(token, "Container image cannot be empty");
            }
        }
        TokenValue::Mapping(pairs) => {
            let mut image = None;
            for pair in pairs {
                let Ok(key) = pair.key.assert_string("container item key") else {
                    continue;
                };
                if !CONTAINER_KEYS.contains(&key) {
                    context.error(&pair.key, format!("Unexpected container item key: {}", key));
                } else if key == "image" {
                    image = Some(&pair.value);
                }
            }

            match image {
                Some(image) if image.is_expression() => {}
                Some(image) if !matches!(image.assert_string("container image"), Ok("")) => {}
                Some(image) => context.error(image, "Container image cannot be empty"),
                None => context.error(token, "Container image cannot be empty"),
            }
        }
        _ => context.error(token, format!("Unexpected value '{}'", token)),
    }
}

/// Check each container under `services`.
pub fn convert_services(context: &mut TemplateContext, token: &TemplateToken) {
    match &token.value {
        TokenValue::BasicExpression { .. } => {}
        TokenValue::Mapping(pairs) => {
            for pair in pairs {
                convert_container(context, &pair.value);
            }
        }
        _ => context.error(token, format!("Unexpected value '{}'", token)),
    }
}
