//! Workflow errors as LSP diagnostics

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use crate::templates::context::TemplateValidationError;
use crate::templates::tokens::TokenRange;

pub const DIAGNOSTIC_SOURCE: &str = "actions-workflow-lsp";

/// Collects diagnostics for one document
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error at a one-based token range. Errors without a range are
    /// placed at the start of the document.
    pub fn add_error(&mut self, message: String, range: Option<TokenRange>) {
        self.diagnostics.push(Diagnostic {
            range: range.map(to_lsp_range).unwrap_or_default(),
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message,
            ..Default::default()
        });
    }

    /// Add the errors of a read or conversion. Errors that belong to other
    /// files (called workflows) keep their file prefix and are placed at the
    /// start of the document.
    pub fn add_validation_errors<'a>(
        &mut self,
        errors: impl IntoIterator<Item = &'a TemplateValidationError>,
        file_name: &str,
    ) {
        for error in errors {
            match error.file.as_deref() {
                None => self.add_error(error.message.clone(), error.range),
                Some(name) if name == file_name => self.add_error(error.message.clone(), error.range),
                Some(_) => self.add_error(error.to_string(), None),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

fn to_lsp_range(range: TokenRange) -> Range {
    let position = |line: u32, column: u32| Position {
        line: line.saturating_sub(1),
        character: column.saturating_sub(1),
    };
    let start = position(range.start.line, range.start.column);
    let end = position(range.end.line, range.end.column);
    Range {
        start,
        end: if end < start { start } else { end },
    }
}
