//! Token tree to workflow model conversion
//!
//! Conversion is best effort: problems are recorded on the context at the
//! token responsible and the rest of the document is still converted.

mod concurrency;
mod container;
pub mod cron;
mod events;
pub mod id_builder;
mod if_condition;
mod jobs;
mod reusable;
mod runs_on;
mod steps;

use thiserror::Error;
use tracing::{debug, warn};

use super::file_provider::FileProvider;
use super::types::WorkflowTemplate;
use crate::templates::context::TemplateContext;
use crate::templates::tokens::{TemplateToken, TokenTypeError, TokenValue};

pub use concurrency::convert_concurrency;
pub use container::{convert_container, convert_services};
pub use events::convert_on;
pub use if_condition::convert_if_condition;
pub use jobs::convert_jobs;
pub use runs_on::convert_runs_on;
pub use steps::convert_steps;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error(transparent)]
    TokenType(#[from] TokenTypeError),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Skip conversion when reading already reported errors
    #[default]
    ReturnErrorsOnly,
    TryConversion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Called workflows are fetched while their nesting depth is below this
    pub fetch_reusable_workflow_depth: usize,
    pub max_reusable_workflow_depth: usize,
    pub error_policy: ErrorPolicy,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            fetch_reusable_workflow_depth: 0,
            max_reusable_workflow_depth: 4,
            error_policy: ErrorPolicy::default(),
        }
    }
}

/// Convert a workflow token tree. Errors found while converting are added to
/// the context and copied into the result.
pub async fn convert_workflow_template(
    context: &mut TemplateContext,
    root: &TemplateToken,
    file_provider: Option<&dyn FileProvider>,
    options: &ConvertOptions,
) -> WorkflowTemplate {
    let mut result = WorkflowTemplate::default();

    if options.error_policy == ErrorPolicy::ReturnErrorsOnly && !context.errors.is_empty() {
        debug!(
            errors = context.errors.len(),
            "skipping conversion of a workflow with read errors"
        );
        result.errors = context.errors.iter().cloned().collect();
        return result;
    }

    match root.assert_mapping("root") {
        Ok(pairs) => {
            for pair in pairs {
                let Ok(key) = pair.key.assert_string("root key") else {
                    continue;
                };
                match key {
                    "on" => result.events = convert_on(context, &pair.value),
                    "jobs" => result.jobs = convert_jobs(context, &pair.value),
                    "concurrency" => {
                        convert_concurrency(context, &pair.value);
                        result.concurrency = Some(pair.value.clone());
                    }
                    "env" => result.env = Some(pair.value.clone()),
                    _ => {}
                }
            }
        }
        Err(err) => context.error(root, err.to_string()),
    }

    if let Some(jobs) = result.jobs.as_mut() {
        reusable::load_reusable_workflows(context, jobs, file_provider, options, 0).await;
    }

    result.errors = context.errors.iter().cloned().collect();
    if !result.errors.is_empty() {
        warn!(errors = result.errors.len(), "workflow converted with errors");
    }
    result
}

/// Record a failed conversion on `token` and carry on.
pub(crate) fn report<T>(
    context: &mut TemplateContext,
    token: &TemplateToken,
    result: Result<T, ConvertError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            context.error(token, err.to_string());
            None
        }
    }
}

/// A string, or a sequence of strings. Expressions yield `None`.
pub(crate) fn string_list(token: &TemplateToken, what: &str) -> Result<Option<Vec<String>>, ConvertError> {
    match &token.value {
        TokenValue::String { value, .. } => Ok(Some(vec![value.clone()])),
        TokenValue::Sequence(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                if item.is_expression() {
                    return Ok(None);
                }
                values.push(item.assert_string(what)?.to_string());
            }
            Ok(Some(values))
        }
        TokenValue::BasicExpression { .. } | TokenValue::InsertExpression => Ok(None),
        _ => Err(TokenTypeError {
            actual: token.type_name(),
            what: what.to_string(),
            expected: "SequenceToken",
        }
        .into()),
    }
}

/// A literal boolean, or `None` for expressions.
pub(crate) fn optional_boolean(token: &TemplateToken, what: &str) -> Result<Option<bool>, ConvertError> {
    if token.is_expression() {
        return Ok(None);
    }
    Ok(Some(token.assert_boolean(what)?))
}
