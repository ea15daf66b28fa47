//! actions-workflow-lsp: language tooling for GitHub Actions workflow files
//!
//! This library provides:
//! - The `${{ }}` expression language: lexer, parser, evaluator and built-in functions
//! - A schema-driven template reader that turns YAML into a typed token tree
//! - The workflow model converter (jobs, steps, triggers, called workflows)
//! - Diagnostics for the language server
//!
//! # Example
//!
//! ```
//! use actions_workflow_lsp::templates::TemplateLimits;
//! use actions_workflow_lsp::workflows::{parse_workflow, File};
//!
//! let file = File::new("ci.yml", "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n");
//! let result = parse_workflow(&file, TemplateLimits::default()).unwrap();
//! assert!(result.context.errors.is_empty());
//! ```

pub mod diagnostics;
pub mod document;
pub mod expressions;
pub mod model;
pub mod templates;
pub mod workflows;

mod backend;

pub use backend::{Backend, ServerSettings};
