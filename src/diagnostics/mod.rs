//! Diagnostics for workflow documents
//!
//! Runs the whole pipeline (YAML, template reader, model converter) and
//! reports the accumulated errors.

mod collector;

pub use collector::{DiagnosticCollector, DIAGNOSTIC_SOURCE};

use tower_lsp::lsp_types::Diagnostic;
use tracing::{debug, error};

use crate::model::{convert_workflow_template, ConvertOptions, FileProvider, WorkflowTemplate};
use crate::templates::context::TemplateLimits;
use crate::workflows::{parse_workflow, File};

/// Read and convert a workflow. Returns `None` for documents with no content.
pub async fn analyze_workflow(
    file: &File,
    file_provider: Option<&dyn FileProvider>,
    options: &ConvertOptions,
) -> Result<Option<WorkflowTemplate>, crate::templates::SchemaError> {
    let result = parse_workflow(file, TemplateLimits::default())?;
    let mut context = result.context;

    let Some(root) = result.value else {
        debug!(file = %file.name, "nothing to convert");
        return Ok(if context.errors.is_empty() {
            None
        } else {
            Some(WorkflowTemplate {
                errors: context.errors.iter().cloned().collect(),
                ..Default::default()
            })
        });
    };

    let template = convert_workflow_template(&mut context, &root, file_provider, options).await;
    Ok(Some(template))
}

/// Diagnostics for a workflow document
pub async fn workflow_diagnostics(
    file: &File,
    file_provider: Option<&dyn FileProvider>,
    options: &ConvertOptions,
) -> Vec<Diagnostic> {
    let mut collector = DiagnosticCollector::new();
    match analyze_workflow(file, file_provider, options).await {
        Ok(Some(template)) => collector.add_validation_errors(&template.errors, &file.name),
        Ok(None) => {}
        Err(err) => {
            error!(error = %err, "workflow schema could not be loaded");
            collector.add_error(err.to_string(), None);
        }
    }
    collector.into_diagnostics()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Position;

    #[tokio::test]
    async fn test_valid_workflow_has_no_diagnostics() {
        let file = File::new(
            "ci.yml",
            "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: actions/checkout@v4\n",
        );
        let diagnostics = workflow_diagnostics(&file, None, &ConvertOptions::default()).await;
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[tokio::test]
    async fn test_conversion_errors_are_reported() {
        let file = File::new(
            "ci.yml",
            "on: push\njobs:\n  a:\n    needs: b\n    runs-on: x\n  b:\n    needs: a\n    runs-on: x\n",
        );
        let diagnostics = workflow_diagnostics(&file, None, &ConvertOptions::default()).await;
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(
            diagnostics[1].message,
            "Job 'a' depends on job 'b' which creates a cycle in the dependency graph."
        );
        assert_eq!(diagnostics[1].range.start, Position::new(3, 11));
    }

    #[tokio::test]
    async fn test_empty_document() {
        let file = File::new("ci.yml", "");
        let template = analyze_workflow(&file, None, &ConvertOptions::default()).await.unwrap();
        assert!(template.is_none());
        assert!(workflow_diagnostics(&file, None, &ConvertOptions::default()).await.is_empty());
    }
}
