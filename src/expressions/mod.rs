//! The `${{ }}` expression language: lexer, parser, values, evaluator and
//! built-in functions.

pub mod ast;
pub mod compare;
pub mod data;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod validate;

use thiserror::Error;

pub use ast::Expr;
pub use data::{Array, Dictionary, Kind, Value};
pub use evaluator::{EvaluationError, Evaluator};
pub use lexer::{lex, LexError, Position};
pub use parser::{ExpressionError, FunctionInfo, Parser};

/// Either stage of turning expression text into an AST
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ExpressionError),
}

impl SyntaxError {
    pub fn position(&self) -> Option<Position> {
        match self {
            SyntaxError::Lex(e) => e.position(),
            SyntaxError::Parse(e) => Some(e.position()),
        }
    }
}

/// Lex and parse `text` against the given named-values and extension functions.
pub fn parse_expression<S: AsRef<str>>(
    text: &str,
    context_names: &[S],
    extension_functions: &[FunctionInfo],
) -> Result<Expr, SyntaxError> {
    let tokens = lex(text)?.tokens;
    Ok(Parser::new(tokens, context_names, extension_functions).parse()?)
}
