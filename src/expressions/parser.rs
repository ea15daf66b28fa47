//! Recursive-descent expression parser
//!
//! Precedence, lowest first: `||`, `&&`, equality, relational, unary `!`,
//! postfix (`.name`, `[expr]`, `[*]`), primary. Function names and bare
//! identifiers are validated against the registries supplied by the caller.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use super::ast::{BinaryOp, Expr, Index, LogicalOp, UnaryOp};
use super::data::Value;
use super::functions;
use super::lexer::{Position, Token, TokenKind};

/// Maximum nesting of groupings, calls, index brackets, negations and
/// chained operators or property accesses.
pub const MAX_PARSER_DEPTH: usize = 50;

/// Signature of a callable function, used for validation only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub min_args: usize,
    pub max_args: usize,
}

impl FunctionInfo {
    pub fn new(name: impl Into<String>, min_args: usize, max_args: usize) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ExceededMaxDepth,
    UnexpectedEndOfExpression,
    UnexpectedSymbol,
    UnrecognizedContext,
    UnrecognizedFunction,
    TooFewParameters,
    TooManyParameters,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ExceededMaxDepth => {
                write!(f, "Exceeded max expression depth {}", MAX_PARSER_DEPTH)
            }
            ErrorKind::UnexpectedEndOfExpression => f.write_str("Unexpected end of expression"),
            ErrorKind::UnexpectedSymbol => f.write_str("Unexpected symbol"),
            ErrorKind::UnrecognizedContext => f.write_str("Unrecognized named-value"),
            ErrorKind::UnrecognizedFunction => f.write_str("Unrecognized function"),
            ErrorKind::TooFewParameters => f.write_str("Too few parameters supplied"),
            ErrorKind::TooManyParameters => f.write_str("Too many parameters supplied"),
        }
    }
}

/// A parse failure pinned to the offending token
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: '{}'. Located at position {} within expression", .token.lexeme, .token.position.column + 1)]
pub struct ExpressionError {
    pub kind: ErrorKind,
    pub token: Token,
}

impl ExpressionError {
    pub fn position(&self) -> Position {
        self.token.position
    }
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
    context_names: HashSet<String>,
    extension_functions: &'a [FunctionInfo],
    allow_unknown_keywords: bool,
}

impl<'a> Parser<'a> {
    /// Create a parser over a lexed token stream.
    ///
    /// `context_names` lists the named values (e.g. `github`, `env`) that bare
    /// identifiers may refer to; `extension_functions` adds to the built-in
    /// function library.
    pub fn new<S: AsRef<str>>(
        tokens: Vec<Token>,
        context_names: &[S],
        extension_functions: &'a [FunctionInfo],
    ) -> Self {
        Self {
            tokens,
            current: 0,
            depth: 0,
            context_names: context_names
                .iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
            extension_functions,
            allow_unknown_keywords: false,
        }
    }

    /// Accept unknown functions and named-values. Used for partial input while
    /// typing, where the registries may not be complete yet.
    pub fn allow_unknown_keywords(mut self, allow: bool) -> Self {
        self.allow_unknown_keywords = allow;
        self
    }

    pub fn parse(mut self) -> Result<Expr, ExpressionError> {
        if self.at_end() {
            return Err(self.error(ErrorKind::UnexpectedEndOfExpression));
        }

        let expr = self.expression()?;
        if !self.at_end() {
            return Err(self.error(ErrorKind::UnexpectedSymbol));
        }
        Ok(expr)
    }

    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        self.logical_or()
    }

    fn logical_or(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.logical_and()?;
        if !self.check(TokenKind::Or) {
            return Ok(first);
        }

        let mut args = vec![first];
        while self.matches(TokenKind::Or) {
            args.push(self.logical_and()?);
        }
        Ok(Expr::Logical {
            op: LogicalOp::Or,
            args,
        })
    }

    fn logical_and(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.equality()?;
        if !self.check(TokenKind::And) {
            return Ok(first);
        }

        let mut args = vec![first];
        while self.matches(TokenKind::And) {
            args.push(self.equality()?);
        }
        Ok(Expr::Logical {
            op: LogicalOp::And,
            args,
        })
    }

    fn equality(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.comparison()?;
        let mut nested = 0;
        loop {
            let op = if self.matches(TokenKind::EqualEqual) {
                BinaryOp::Equal
            } else if self.matches(TokenKind::BangEqual) {
                BinaryOp::NotEqual
            } else {
                break;
            };
            // each operator nests the tree built so far one level deeper
            self.enter()?;
            nested += 1;
            let right = self.comparison()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        self.leave_n(nested);
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.unary()?;
        let mut nested = 0;
        loop {
            let op = if self.matches(TokenKind::Greater) {
                BinaryOp::Greater
            } else if self.matches(TokenKind::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else if self.matches(TokenKind::Less) {
                BinaryOp::Less
            } else if self.matches(TokenKind::LessEqual) {
                BinaryOp::LessEqual
            } else {
                break;
            };
            self.enter()?;
            nested += 1;
            let right = self.unary()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        self.leave_n(nested);
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.matches(TokenKind::Bang) {
            self.enter()?;
            let operand = self.unary()?;
            self.leave();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.call()?;
        let mut nested = 0;
        loop {
            if self.matches(TokenKind::LeftBracket) {
                self.enter()?;
                nested += 1;
                self.enter()?;
                let index = if self.matches(TokenKind::Star) {
                    Index::Star
                } else {
                    Index::Expr(Box::new(self.expression()?))
                };
                self.consume(TokenKind::RightBracket)?;
                self.leave();
                expr = Expr::IndexAccess {
                    base: Box::new(expr),
                    index,
                };
            } else if self.matches(TokenKind::Dot) {
                self.enter()?;
                nested += 1;
                let index = if self.matches(TokenKind::Star) {
                    Index::Star
                } else if self.matches_any(&[
                    TokenKind::Identifier,
                    TokenKind::True,
                    TokenKind::False,
                    TokenKind::Null,
                ]) {
                    let name = self.previous().lexeme.clone();
                    Index::Expr(Box::new(Expr::Literal(Value::String(name))))
                } else {
                    return Err(self.error_at_current());
                };
                expr = Expr::IndexAccess {
                    base: Box::new(expr),
                    index,
                };
            } else {
                break;
            }
        }
        self.leave_n(nested);
        Ok(expr)
    }

    fn call(&mut self) -> Result<Expr, ExpressionError> {
        if self.check(TokenKind::Identifier) && self.check_next(TokenKind::LeftParen) {
            let name_token = self.advance().clone();
            self.advance();
            self.enter()?;

            let mut args = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    args.push(self.expression()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen)?;
            self.leave();

            self.validate_function(&name_token, args.len())?;
            return Ok(Expr::FunctionCall {
                name: name_token.lexeme,
                args,
            });
        }

        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        if self.matches_any(&[
            TokenKind::True,
            TokenKind::False,
            TokenKind::Null,
            TokenKind::Number,
            TokenKind::String,
        ]) {
            let value = self.previous().value.clone().unwrap_or(Value::Null);
            return Ok(Expr::Literal(value));
        }

        if self.matches(TokenKind::Identifier) {
            let token = self.previous().clone();
            if !self.allow_unknown_keywords
                && !self.context_names.contains(&token.lexeme.to_lowercase())
            {
                return Err(ExpressionError {
                    kind: ErrorKind::UnrecognizedContext,
                    token,
                });
            }
            return Ok(Expr::ContextAccess(token.lexeme));
        }

        if self.matches(TokenKind::LeftParen) {
            self.enter()?;
            let inner = self.expression()?;
            self.consume(TokenKind::RightParen)?;
            self.leave();
            return Ok(Expr::Grouping(Box::new(inner)));
        }

        Err(self.error_at_current())
    }

    fn validate_function(&self, token: &Token, arg_count: usize) -> Result<(), ExpressionError> {
        let (min_args, max_args) = match functions::lookup(&token.lexeme) {
            Some(f) => (f.min_args, f.max_args),
            None => match self
                .extension_functions
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(&token.lexeme))
            {
                Some(f) => (f.min_args, f.max_args),
                None if self.allow_unknown_keywords => return Ok(()),
                None => {
                    return Err(ExpressionError {
                        kind: ErrorKind::UnrecognizedFunction,
                        token: token.clone(),
                    })
                }
            },
        };

        if arg_count < min_args {
            return Err(ExpressionError {
                kind: ErrorKind::TooFewParameters,
                token: token.clone(),
            });
        }
        if arg_count > max_args {
            return Err(ExpressionError {
                kind: ErrorKind::TooManyParameters,
                token: token.clone(),
            });
        }
        Ok(())
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_PARSER_DEPTH {
            return Err(ExpressionError {
                kind: ErrorKind::ExceededMaxDepth,
                token: self.previous().clone(),
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn leave_n(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn consume(&mut self, kind: TokenKind) -> Result<&Token, ExpressionError> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        Err(self.error_at_current())
    }

    fn error_at_current(&self) -> ExpressionError {
        if self.at_end() {
            self.error(ErrorKind::UnexpectedEndOfExpression)
        } else {
            self.error(ErrorKind::UnexpectedSymbol)
        }
    }

    fn error(&self, kind: ErrorKind) -> ExpressionError {
        ExpressionError {
            kind,
            token: self.peek().clone(),
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_any(&mut self, kinds: &[TokenKind]) -> bool {
        kinds.iter().any(|&k| self.matches(k))
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_next(&self, kind: TokenKind) -> bool {
        self.tokens
            .get(self.current + 1)
            .is_some_and(|t| t.kind == kind)
    }

    fn advance(&mut self) -> &Token {
        if !self.at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        // The lexer guarantees a trailing Eof token
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
}
