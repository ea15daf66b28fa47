//! A definition together with the expression context allowed where it is used

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use super::schema::{Definition, SchemaError, TemplateSchema};
use crate::expressions::FunctionInfo;

lazy_static! {
    static ref FUNCTION_RE: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\((\d+),(\d+|MAX)\)$").unwrap();
}

#[derive(Debug, Clone)]
pub struct DefinitionInfo {
    pub definition: Arc<Definition>,
    /// Accumulated from the root definition down to this one
    pub allowed_context: Vec<String>,
    named_contexts: Vec<String>,
    functions: Vec<FunctionInfo>,
}

impl DefinitionInfo {
    pub fn root(schema: &TemplateSchema, name: &str) -> Result<Self, SchemaError> {
        let definition = Arc::clone(schema.get_definition(name)?);
        let allowed_context = definition.context.clone();
        Ok(Self::build(definition, allowed_context))
    }

    /// Info for a nested definition, inheriting this definition's context.
    pub fn child(&self, schema: &TemplateSchema, name: &str) -> Result<Self, SchemaError> {
        let definition = Arc::clone(schema.get_definition(name)?);
        let mut allowed_context = self.allowed_context.clone();
        for item in &definition.context {
            if !allowed_context
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(item))
            {
                allowed_context.push(item.clone());
            }
        }
        Ok(Self::build(definition, allowed_context))
    }

    fn build(definition: Arc<Definition>, allowed_context: Vec<String>) -> Self {
        let mut named_contexts = Vec::new();
        let mut functions = Vec::new();
        for item in &allowed_context {
            match parse_function(item) {
                Some(function) => functions.push(function),
                None => named_contexts.push(item.clone()),
            }
        }

        Self {
            definition,
            allowed_context,
            named_contexts,
            functions,
        }
    }

    pub fn is_expression_allowed(&self) -> bool {
        !self.allowed_context.is_empty()
    }

    pub fn named_contexts(&self) -> &[String] {
        &self.named_contexts
    }

    pub fn functions(&self) -> &[FunctionInfo] {
        &self.functions
    }
}

/// Parse a context entry of the form `name(min,max)`.
fn parse_function(item: &str) -> Option<FunctionInfo> {
    let caps = FUNCTION_RE.captures(item)?;
    let name = caps.get(1)?.as_str();
    let min_args = caps.get(2)?.as_str().parse().ok()?;
    let max_args = match caps.get(3)?.as_str() {
        "MAX" => usize::MAX,
        n => n.parse().ok()?,
    };
    Some(FunctionInfo::new(name, min_args, max_args))
}
