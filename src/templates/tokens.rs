//! Template token tree
//!
//! The typed tree produced by reading a document against a schema. Every node
//! remembers where it came from and, once read, the definition it matched.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::definition_info::DefinitionInfo;
use crate::expressions::data::number_to_string;

/// One-based line and column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenPosition {
    pub line: u32,
    pub column: u32,
}

impl TokenPosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenRange {
    pub start: TokenPosition,
    pub end: TokenPosition,
}

impl TokenRange {
    pub fn new(start: TokenPosition, end: TokenPosition) -> Self {
        Self { start, end }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unexpected type '{actual}' encountered while reading '{what}'. The type '{expected}' was expected.")]
pub struct TokenTypeError {
    pub actual: &'static str,
    pub what: String,
    pub expected: &'static str,
}

#[derive(Debug, Clone)]
pub struct TemplateToken {
    /// Index into the owning context's file table
    pub file: Option<usize>,
    pub range: Option<TokenRange>,
    pub definition: Option<Arc<DefinitionInfo>>,
    pub description: Option<String>,
    pub value: TokenValue,
}

#[derive(Debug, Clone)]
pub enum TokenValue {
    Null,
    Boolean(bool),
    Number(f64),
    String {
        value: String,
        /// Raw text the string was read from, when it differs from `value`
        source: Option<String>,
    },
    BasicExpression {
        expression: String,
        /// The individual `${{ }}` spans an implicit `format()` was built from
        original_expressions: Vec<TemplateToken>,
        source: Option<String>,
    },
    /// `${{ insert }}`
    InsertExpression,
    Sequence(Vec<TemplateToken>),
    Mapping(Vec<MappingPair>),
}

#[derive(Debug, Clone)]
pub struct MappingPair {
    pub key: TemplateToken,
    pub value: TemplateToken,
}

impl TemplateToken {
    pub fn new(file: Option<usize>, range: Option<TokenRange>, value: TokenValue) -> Self {
        Self {
            file,
            range,
            definition: None,
            description: None,
            value,
        }
    }

    pub fn null(file: Option<usize>, range: Option<TokenRange>) -> Self {
        Self::new(file, range, TokenValue::Null)
    }

    pub fn boolean(file: Option<usize>, range: Option<TokenRange>, value: bool) -> Self {
        Self::new(file, range, TokenValue::Boolean(value))
    }

    pub fn number(file: Option<usize>, range: Option<TokenRange>, value: f64) -> Self {
        Self::new(file, range, TokenValue::Number(value))
    }

    pub fn string(file: Option<usize>, range: Option<TokenRange>, value: impl Into<String>) -> Self {
        Self::new(
            file,
            range,
            TokenValue::String {
                value: value.into(),
                source: None,
            },
        )
    }

    pub fn expression(
        file: Option<usize>,
        range: Option<TokenRange>,
        expression: impl Into<String>,
    ) -> Self {
        Self::new(
            file,
            range,
            TokenValue::BasicExpression {
                expression: expression.into(),
                original_expressions: Vec::new(),
                source: None,
            },
        )
    }

    pub fn sequence(file: Option<usize>, range: Option<TokenRange>) -> Self {
        Self::new(file, range, TokenValue::Sequence(Vec::new()))
    }

    pub fn mapping(file: Option<usize>, range: Option<TokenRange>) -> Self {
        Self::new(file, range, TokenValue::Mapping(Vec::new()))
    }

    pub fn type_name(&self) -> &'static str {
        match self.value {
            TokenValue::Null => "NullToken",
            TokenValue::Boolean(_) => "BooleanToken",
            TokenValue::Number(_) => "NumberToken",
            TokenValue::String { .. } => "StringToken",
            TokenValue::BasicExpression { .. } => "BasicExpressionToken",
            TokenValue::InsertExpression => "InsertExpressionToken",
            TokenValue::Sequence(_) => "SequenceToken",
            TokenValue::Mapping(_) => "MappingToken",
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.value,
            TokenValue::Null
                | TokenValue::Boolean(_)
                | TokenValue::Number(_)
                | TokenValue::String { .. }
        )
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self.value,
            TokenValue::BasicExpression { .. } | TokenValue::InsertExpression
        )
    }

    pub fn is_scalar(&self) -> bool {
        self.is_literal() || self.is_expression()
    }

    fn type_error(&self, what: &str, expected: &'static str) -> TokenTypeError {
        TokenTypeError {
            actual: self.type_name(),
            what: what.to_string(),
            expected,
        }
    }

    pub fn assert_null(&self, what: &str) -> Result<(), TokenTypeError> {
        match self.value {
            TokenValue::Null => Ok(()),
            _ => Err(self.type_error(what, "NullToken")),
        }
    }

    pub fn assert_boolean(&self, what: &str) -> Result<bool, TokenTypeError> {
        match self.value {
            TokenValue::Boolean(b) => Ok(b),
            _ => Err(self.type_error(what, "BooleanToken")),
        }
    }

    pub fn assert_number(&self, what: &str) -> Result<f64, TokenTypeError> {
        match self.value {
            TokenValue::Number(n) => Ok(n),
            _ => Err(self.type_error(what, "NumberToken")),
        }
    }

    pub fn assert_string(&self, what: &str) -> Result<&str, TokenTypeError> {
        match &self.value {
            TokenValue::String { value, .. } => Ok(value),
            _ => Err(self.type_error(what, "StringToken")),
        }
    }

    pub fn assert_sequence(&self, what: &str) -> Result<&[TemplateToken], TokenTypeError> {
        match &self.value {
            TokenValue::Sequence(items) => Ok(items),
            _ => Err(self.type_error(what, "SequenceToken")),
        }
    }

    pub fn assert_mapping(&self, what: &str) -> Result<&[MappingPair], TokenTypeError> {
        match &self.value {
            TokenValue::Mapping(pairs) => Ok(pairs),
            _ => Err(self.type_error(what, "MappingToken")),
        }
    }

    pub fn assert_literal(&self, what: &str) -> Result<&TemplateToken, TokenTypeError> {
        if self.is_literal() {
            Ok(self)
        } else {
            Err(self.type_error(what, "LiteralToken"))
        }
    }

    pub fn assert_scalar(&self, what: &str) -> Result<&TemplateToken, TokenTypeError> {
        if self.is_scalar() {
            Ok(self)
        } else {
            Err(self.type_error(what, "ScalarToken"))
        }
    }

    /// The expression text of a `BasicExpression`, if this is one.
    pub fn expression_text(&self) -> Option<&str> {
        match &self.value {
            TokenValue::BasicExpression { expression, .. } => Some(expression),
            _ => None,
        }
    }

    /// Look up a mapping value by exact string key.
    pub fn get(&self, key: &str) -> Option<&TemplateToken> {
        match &self.value {
            TokenValue::Mapping(pairs) => pairs
                .iter()
                .find(|p| matches!(&p.key.value, TokenValue::String { value, .. } if value == key))
                .map(|p| &p.value),
            _ => None,
        }
    }

    /// A literal re-typed as a string, keeping its location and definition.
    pub fn to_string_token(&self) -> TemplateToken {
        TemplateToken {
            file: self.file,
            range: self.range,
            definition: self.definition.clone(),
            description: self.description.clone(),
            value: TokenValue::String {
                value: self.to_display_string(),
                source: None,
            },
        }
    }

    /// Text of the token as written by the author: literals print their
    /// value, expressions print with `${{ }}` delimiters.
    pub fn to_display_string(&self) -> String {
        match &self.value {
            TokenValue::Null => String::new(),
            TokenValue::Boolean(b) => b.to_string(),
            TokenValue::Number(n) => number_to_string(*n),
            TokenValue::String { value, .. } => value.clone(),
            TokenValue::BasicExpression {
                expression, source, ..
            } => source
                .clone()
                .unwrap_or_else(|| format!("${{{{ {} }}}}", expression)),
            TokenValue::InsertExpression => "${{ insert }}".to_string(),
            TokenValue::Sequence(_) => "Sequence".to_string(),
            TokenValue::Mapping(_) => "Mapping".to_string(),
        }
    }

    /// Depth-first, pre-order walk over this token and its descendants.
    pub fn traverse(&self) -> Traverse<'_> {
        Traverse {
            stack: vec![TraversalItem {
                parent: None,
                token: self,
                key: None,
            }],
        }
    }
}

impl fmt::Display for TemplateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

/// A node visited by [`TemplateToken::traverse`]
#[derive(Debug, Clone, Copy)]
pub struct TraversalItem<'a> {
    pub parent: Option<&'a TemplateToken>,
    pub token: &'a TemplateToken,
    /// The key this token is the value of, when its parent is a mapping
    pub key: Option<&'a TemplateToken>,
}

pub struct Traverse<'a> {
    stack: Vec<TraversalItem<'a>>,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = TraversalItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.stack.pop()?;
        let parent = Some(item.token);
        match &item.token.value {
            TokenValue::Sequence(items) => {
                for child in items.iter().rev() {
                    self.stack.push(TraversalItem {
                        parent,
                        token: child,
                        key: None,
                    });
                }
            }
            TokenValue::Mapping(pairs) => {
                for pair in pairs.iter().rev() {
                    self.stack.push(TraversalItem {
                        parent,
                        token: &pair.value,
                        key: Some(&pair.key),
                    });
                    self.stack.push(TraversalItem {
                        parent,
                        token: &pair.key,
                        key: None,
                    });
                }
            }
            _ => {}
        }
        Some(item)
    }
}
