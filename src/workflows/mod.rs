//! Workflow documents
//!
//! Reads workflow YAML against the embedded workflow schema.

pub mod cache;
pub mod file_reference;
pub mod schema;
pub mod yaml_reader;

use tracing::debug;

pub use cache::WorkflowTemplateCache;
pub use file_reference::{FileReference, FileReferenceError};
pub use schema::{workflow_schema, WORKFLOW_ROOT};
pub use yaml_reader::{YamlObjectReader, YamlSyntaxError};

use crate::templates::context::{TemplateContext, TemplateLimits};
use crate::templates::reader::read_template;
use crate::templates::schema::SchemaError;
use crate::templates::tokens::TemplateToken;

/// A named document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub name: String,
    pub content: String,
}

impl File {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParseWorkflowResult {
    pub context: TemplateContext,
    /// `None` for empty documents and documents that could not be read
    pub value: Option<TemplateToken>,
}

/// Parse a workflow file into a token tree. Problems in the document are
/// collected in the returned context.
pub fn parse_workflow(file: &File, limits: TemplateLimits) -> Result<ParseWorkflowResult, SchemaError> {
    let mut context = TemplateContext::new(workflow_schema()?, limits);
    let value = parse_workflow_into(&mut context, file);
    Ok(ParseWorkflowResult { context, value })
}

/// Parse a workflow file using an existing context, so that errors and file
/// names are shared with the caller (used for called workflows).
pub fn parse_workflow_into(context: &mut TemplateContext, file: &File) -> Option<TemplateToken> {
    let file_id = context.get_file_id(&file.name);

    let mut reader = match YamlObjectReader::new(Some(file_id), &file.content) {
        Ok(reader) => reader,
        Err(err) => {
            debug!(file = %file.name, error = %err, "workflow YAML is invalid");
            context.error_at(Some(file_id), Some(err.range()), err.message);
            return None;
        }
    };
    if reader.is_empty() {
        return None;
    }

    read_template(context, WORKFLOW_ROOT, &mut reader, Some(file_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> (Option<TemplateToken>, Vec<String>) {
        let result = parse_workflow(&File::new("ci.yml", content), TemplateLimits::default()).unwrap();
        let errors = result.context.errors.iter().map(|e| e.to_string()).collect();
        (result.value, errors)
    }

    #[test]
    fn test_parse_valid_workflow() {
        let (value, errors) = parse(
            "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: actions/checkout@v4\n      - run: echo ${{ github.ref }}\n",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        let value = value.unwrap();
        let steps = value.get("jobs").unwrap().get("build").unwrap().get("steps").unwrap();
        let run = steps.assert_sequence("steps").unwrap()[1].get("run").unwrap();
        assert_eq!(run.expression_text(), Some("format('echo {0}', github.ref)"));
    }

    #[test]
    fn test_errors_are_located() {
        let (_, errors) = parse("on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    stpes: []\n");
        assert_eq!(errors, vec!["ci.yml (Line: 5, Col: 5): Unexpected value 'stpes'".to_string()]);
    }

    #[test]
    fn test_duplicate_key_does_not_hide_other_errors() {
        let (value, errors) = parse(
            "on: push\njobs:\n  a:\n    runs-on: ubuntu-latest\n    runs-on: windows-latest\n  b:\n    runs-on: ubuntu-latest\n    bogus: true\n",
        );
        assert_eq!(
            errors,
            vec![
                "ci.yml (Line: 5, Col: 5): 'runs-on' is already defined".to_string(),
                "ci.yml (Line: 8, Col: 5): Unexpected value 'bogus'".to_string(),
            ]
        );
        let value = value.unwrap();
        let a = value.get("jobs").unwrap().get("a").unwrap();
        assert_eq!(a.get("runs-on").unwrap().assert_string("runs-on").unwrap(), "ubuntu-latest");
    }

    #[test]
    fn test_expression_errors_in_quoted_scalars_use_scalar_range() {
        let (_, errors) = parse(
            "on: push\nenv:\n  A: x ${{ github.ref == }}\n  B: \"x ${{ github.ref == }}\"\njobs:\n  build:\n    runs-on: ubuntu-latest\n",
        );
        assert_eq!(errors.len(), 2, "{:?}", errors);
        assert!(errors[0].starts_with("ci.yml (Line: 3, Col: 8): "), "{}", errors[0]);
        assert!(errors[1].starts_with("ci.yml (Line: 4, Col: 6): "), "{}", errors[1]);
    }

    #[test]
    fn test_missing_required_properties() {
        let (_, errors) = parse("name: test\n");
        assert_eq!(
            errors,
            vec![
                "ci.yml (Line: 1, Col: 1): Required property is missing: on".to_string(),
                "ci.yml (Line: 1, Col: 1): Required property is missing: jobs".to_string(),
            ]
        );
    }

    #[test]
    fn test_context_not_available() {
        let (_, errors) = parse(
            "on: push\nenv:\n  A: ${{ steps.x.outputs.y }}\njobs:\n  build:\n    runs-on: ubuntu-latest\n",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Unrecognized named-value: 'steps'"), "{}", errors[0]);
    }

    #[test]
    fn test_yaml_syntax_error() {
        let (value, errors) = parse("on: push\n  jobs: [\n");
        assert!(value.is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("ci.yml (Line: "));
    }

    #[test]
    fn test_empty_document() {
        let (value, errors) = parse("# nothing yet\n");
        assert!(value.is_none());
        assert!(errors.is_empty());
    }
}
